//! The maestro (spec.md §4.6, component C6): owns every [`Actor`] record and
//! drives their fibers to their next suspension point.
//!
//! Grounded on `dslab-core::state::SimulationState::{spawn, drain_ready_tasks}`
//! for the "channel-as-ready-queue" shape: a spawned or woken actor's
//! [`Task`] re-enqueues itself on the same `mpsc` channel the teacher uses,
//! so draining the channel (`while executor.process_task() {}`) already
//! implements spec.md §4.7 step 2 ("while ready queue non-empty: pop actor,
//! resume its fiber until it yields") without any extra bookkeeping — by the
//! time the drain loop returns, the channel (the ready queue) is empty by
//! construction.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc;

use rustc_hash::FxHashMap;

use sg_engine::async_core::executor::Executor;
use sg_engine::async_core::task::Task;
use sg_kernel::{ActivityId, Kernel};
use sg_mailbox::MailboxRegistry;
use sg_platform::HostId;

use crate::actor::{Actor, ActorId, ActorState, Entry};
use crate::context::ActorContext;

/// Owns every actor and the channel their fibers reschedule themselves on.
pub struct Scheduler {
    kernel: Rc<RefCell<Kernel>>,
    mailboxes: Rc<RefCell<MailboxRegistry>>,
    clock: Rc<Cell<f64>>,
    actors: FxHashMap<ActorId, Actor>,
    daemons: std::collections::HashSet<ActorId>,
    next_pid: ActorId,
    sender: mpsc::Sender<Rc<Task>>,
    executor: Executor,
}

impl Scheduler {
    /// A scheduler with no actors, sharing `kernel`/`mailboxes`/`clock` with
    /// the rest of the engine (`clock` is the same cell `sg`'s `Engine`
    /// advances every round, so `ActorContext::time()` always reads the
    /// authoritative value without this crate depending on `sg`).
    pub fn new(kernel: Rc<RefCell<Kernel>>, mailboxes: Rc<RefCell<MailboxRegistry>>, clock: Rc<Cell<f64>>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            kernel,
            mailboxes,
            clock,
            actors: FxHashMap::default(),
            daemons: std::collections::HashSet::new(),
            next_pid: 0,
            sender,
            executor: Executor::new(receiver),
        }
    }

    /// Shared activity kernel.
    pub fn kernel(&self) -> Rc<RefCell<Kernel>> {
        self.kernel.clone()
    }

    /// Shared mailbox registry.
    pub fn mailboxes(&self) -> Rc<RefCell<MailboxRegistry>> {
        self.mailboxes.clone()
    }

    /// Current virtual clock reading.
    pub fn time(&self) -> f64 {
        self.clock.get()
    }

    /// Spawns a new actor (spec.md §4.6 `create`): allocates a PID, builds
    /// its fiber, and schedules it — `Task::spawn` both constructs the task
    /// and sends it to the channel in one call, matching "allocates,
    /// schedules the fiber, enqueues in ready set" exactly.
    pub fn spawn(self_rc: &Rc<RefCell<Self>>, name: impl Into<String>, host: HostId, entry: Entry, parent: Option<ActorId>) -> ActorId {
        let id = {
            let mut this = self_rc.borrow_mut();
            let id = this.next_pid;
            this.next_pid += 1;
            this.actors.insert(id, Actor::new(id, name.into(), host, entry.clone(), parent));
            id
        };
        Self::run_fiber(self_rc, id);
        id
    }

    fn run_fiber(self_rc: &Rc<RefCell<Self>>, id: ActorId) {
        let (entry, sender) = {
            let this = self_rc.borrow();
            let actor = this.actors.get(&id).expect("actor must exist right after spawn");
            (actor.entry.clone(), this.sender.clone())
        };
        let ctx = ActorContext::new(id, self_rc.clone());
        let scheduler = self_rc.clone();
        Task::spawn(
            async move {
                let result = entry(ctx).await;
                scheduler.borrow_mut().terminate(id, result.is_err());
            },
            sender,
        );
    }

    /// Drains every currently-ready actor (spec.md §4.7 step 2). Returns once
    /// the channel holds no more tasks — i.e. once every actor has run to its
    /// next suspension point.
    pub fn drain_ready(&self) {
        while self.executor.process_task() {}
    }

    /// Borrows an actor record.
    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub(crate) fn actors_mut(&mut self) -> &mut FxHashMap<ActorId, Actor> {
        &mut self.actors
    }

    /// Iterates every live actor (including terminated ones still kept for
    /// `join`/restart bookkeeping).
    pub fn iter(&self) -> impl Iterator<Item = (&ActorId, &Actor)> {
        self.actors.iter()
    }

    /// Whether every non-daemon actor has reached `terminated` (spec.md §4.6
    /// "the simulation ends when the ready queue is empty and every
    /// non-daemon actor is in terminal state"). The ready-queue-empty half of
    /// that condition is the caller's responsibility: call this only after
    /// [`Scheduler::drain_ready`] returns.
    pub fn all_non_daemons_terminated(&self) -> bool {
        self.actors.values().all(|a| a.daemon || a.state == ActorState::Terminated)
    }

    /// Actors still blocked on an activity, for deadlock reporting (spec.md
    /// §8 scenario 5).
    pub fn blocked(&self) -> impl Iterator<Item = (&ActorId, &Actor)> {
        self.actors.iter().filter(|(_, a)| a.state == ActorState::Blocked)
    }

    pub(crate) fn set_state(&mut self, id: ActorId, state: ActorState) {
        if let Some(a) = self.actors.get_mut(&id) {
            a.state = state;
        }
    }

    pub(crate) fn set_waiting_on(&mut self, id: ActorId, activity: Option<ActivityId>) {
        if let Some(a) = self.actors.get_mut(&id) {
            a.waiting_on = activity;
        }
    }

    pub(crate) fn is_killed(&self, id: ActorId) -> bool {
        self.actors.get(&id).map(|a| a.killed).unwrap_or(true)
    }

    pub(crate) fn is_suspended(&self, id: ActorId) -> bool {
        self.actors.get(&id).map(|a| a.suspended).unwrap_or(false)
    }

    /// Marks `id` for termination (spec.md §4.6 `kill`): sets the kill flag
    /// and, if the actor is currently blocked, cancels the activity it is
    /// waiting on so its suspension point wakes and observes the flag.
    pub fn kill(&mut self, id: ActorId, time: f64) {
        let waiting_on = match self.actors.get_mut(&id) {
            Some(a) if a.state != ActorState::Terminated => {
                log::debug!("actor {} ({}) killed at t={}", id, a.name(), time);
                a.killed = true;
                a.kill_time.get_or_insert(time);
                a.waiting_on
            }
            _ => return,
        };
        if let Some(activity) = waiting_on {
            self.kernel.borrow_mut().cancel(activity, time);
        }
    }

    /// Kills every actor except `caller` (spec.md §4.6 `kill_all`).
    pub fn kill_all(&mut self, caller: ActorId, time: f64) {
        let ids: Vec<ActorId> = self.actors.keys().copied().filter(|&id| id != caller).collect();
        for id in ids {
            self.kill(id, time);
        }
    }

    /// Sets the daemon bit (spec.md §4.6 `daemonize`).
    pub fn daemonize(&mut self, id: ActorId) {
        if let Some(a) = self.actors.get_mut(&id) {
            a.daemon = true;
        }
        self.daemons.insert(id);
    }

    /// Sets the auto-restart bit (spec.md §4.6 `auto_restart`).
    pub fn set_auto_restart(&mut self, id: ActorId) {
        if let Some(a) = self.actors.get_mut(&id) {
            a.auto_restart = true;
        }
    }

    /// Migrates `id` to `host` (spec.md §4.6 `set_host`). Re-binding a
    /// currently running Exec to the new host's CPU is the engine's job
    /// (`sg`'s engine loop owns the solver expansion), not the scheduler's.
    pub fn set_host(&mut self, id: ActorId, host: HostId) {
        if let Some(a) = self.actors.get_mut(&id) {
            a.host = host;
        }
    }

    /// Explicit suspend (spec.md supplemental "suspend/resume independent of
    /// any activity"): a suspended actor stays out of the ready queue even
    /// if woken, until resumed.
    pub fn suspend(&mut self, id: ActorId) {
        if let Some(a) = self.actors.get_mut(&id) {
            a.suspended = true;
        }
    }

    /// Clears the explicit suspend flag.
    pub fn resume(&mut self, id: ActorId) {
        if let Some(a) = self.actors.get_mut(&id) {
            a.suspended = false;
        }
    }

    /// Every actor currently bound to `host`, for the host-off cascade
    /// (spec.md §5 "turning a host off ... kills [actors] currently on it").
    pub fn actors_on_host(&self, host: HostId) -> Vec<ActorId> {
        self.actors.values().filter(|a| a.host == host && a.state != ActorState::Terminated).map(|a| a.id).collect()
    }

    /// Records that `id`'s user entry function returned (normally or via
    /// `Killed`), runs its on-exit callbacks in LIFO order, and marks it
    /// terminated. Auto-restart, if set, is the engine's job: it holds the
    /// entry/host/name needed to `spawn` a replacement once the host comes
    /// back on.
    fn terminate(&mut self, id: ActorId, _killed: bool) {
        let callbacks = match self.actors.get_mut(&id) {
            Some(a) => {
                log::debug!("actor {} ({}) exiting", id, a.name());
                a.state = ActorState::Exiting;
                std::mem::take(&mut a.on_exit)
            }
            None => return,
        };
        for callback in callbacks.into_iter().rev() {
            callback();
        }
        if let Some(a) = self.actors.get_mut(&id) {
            a.state = ActorState::Terminated;
        }
        self.daemons.remove(&id);
    }

    /// Re-creates a terminated actor from its original entry function and
    /// host (spec.md §4.6 `auto_restart`: "re-created with the original
    /// entry function"). Assigns a fresh PID, consistent with the ordinary
    /// `create` lifecycle rather than reviving the old one.
    pub fn restart(self_rc: &Rc<RefCell<Self>>, id: ActorId) -> Option<ActorId> {
        let (name, host, entry, parent) = {
            let this = self_rc.borrow();
            let a = this.actors.get(&id)?;
            (a.name.clone(), a.host, a.entry.clone(), a.parent)
        };
        log::info!("restarting actor {} as a fresh pid (auto_restart)", name);
        Some(Self::spawn(self_rc, name, host, entry, parent))
    }

    /// Registers an on-exit callback (LIFO at termination time).
    pub fn on_exit(&mut self, id: ActorId, callback: impl FnOnce() + 'static) {
        if let Some(a) = self.actors.get_mut(&id) {
            a.on_exit.push(Box::new(callback));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    use sg_mailbox::MailboxRegistry;
    use sg_platform::{PlatformGraph, RoutingMethod};

    use crate::builder::ActorBuilder;
    use crate::error::Killed;

    fn new_scheduler() -> (Rc<RefCell<Scheduler>>, HostId) {
        let kernel = Rc::new(RefCell::new(Kernel::new()));
        let mailboxes = Rc::new(RefCell::new(MailboxRegistry::new(kernel.clone())));
        let clock = Rc::new(Cell::new(0.0));
        let mut graph = PlatformGraph::new("root", RoutingMethod::Full);
        let root = graph.root();
        let host = graph.add_host("h", root, 1e9, 1).unwrap();
        (Rc::new(RefCell::new(Scheduler::new(kernel, mailboxes, clock))), host)
    }

    #[test]
    fn kill_cancels_a_blocked_actors_activity() {
        let (scheduler, host) = new_scheduler();
        let observed_killed = Rc::new(StdCell::new(false));
        let observed_killed_clone = observed_killed.clone();

        let id = ActorBuilder::new("victim", host).spawn(&scheduler, move |ctx| {
            let observed_killed = observed_killed_clone.clone();
            async move {
                let result = ctx.sleep_for(100.0).await;
                observed_killed.set(result.is_err());
                result
            }
        });
        scheduler.borrow().drain_ready();
        assert_eq!(scheduler.borrow().get(id).unwrap().state(), ActorState::Blocked);

        scheduler.borrow_mut().kill(id, 0.0);
        scheduler.borrow().drain_ready();

        assert_eq!(scheduler.borrow().get(id).unwrap().state(), ActorState::Terminated);
        assert!(observed_killed.get());
    }

    #[test]
    fn on_exit_callbacks_run_in_lifo_order_at_termination() {
        let (scheduler, host) = new_scheduler();
        let order = Rc::new(RefCell::new(Vec::new()));

        let order_a = order.clone();
        let order_b = order.clone();
        let _id = ActorBuilder::new("a", host).spawn(&scheduler, move |ctx| {
            let order_a = order_a.clone();
            let order_b = order_b.clone();
            async move {
                let o1 = order_a.clone();
                ctx.on_exit(move || o1.borrow_mut().push(1));
                let o2 = order_b.clone();
                ctx.on_exit(move || o2.borrow_mut().push(2));
                Ok::<(), Killed>(())
            }
        });
        scheduler.borrow().drain_ready();

        assert_eq!(*order.borrow(), vec![2, 1]);
    }

    #[test]
    fn daemon_actors_do_not_block_all_non_daemons_terminated() {
        let (scheduler, host) = new_scheduler();
        let daemon_id = ActorBuilder::new("d", host).daemon(true).spawn(&scheduler, |ctx| async move { ctx.sleep_for(1_000.0).await });
        let worker_id = ActorBuilder::new("w", host).spawn(&scheduler, |_ctx| async move { Ok::<(), Killed>(()) });
        scheduler.borrow().drain_ready();

        assert_eq!(scheduler.borrow().get(worker_id).unwrap().state(), ActorState::Terminated);
        assert_eq!(scheduler.borrow().get(daemon_id).unwrap().state(), ActorState::Blocked);
        assert!(scheduler.borrow().all_non_daemons_terminated());
    }

    #[test]
    fn restart_assigns_a_fresh_pid_with_the_same_entry() {
        let (scheduler, host) = new_scheduler();
        let runs = Rc::new(StdCell::new(0u32));
        let runs_clone = runs.clone();
        let id = ActorBuilder::new("r", host).spawn(&scheduler, move |_ctx| {
            let runs = runs_clone.clone();
            async move {
                runs.set(runs.get() + 1);
                Ok::<(), Killed>(())
            }
        });
        scheduler.borrow().drain_ready();
        assert_eq!(runs.get(), 1);

        let restarted = Scheduler::restart(&scheduler, id).unwrap();
        scheduler.borrow().drain_ready();

        assert_ne!(restarted, id);
        assert_eq!(runs.get(), 2);
        assert_eq!(scheduler.borrow().get(restarted).unwrap().name(), "r");
    }
}
