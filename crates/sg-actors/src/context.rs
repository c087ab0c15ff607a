//! Per-actor facade (spec.md §4.6, component C6): the handle user code gets
//! to suspend itself, touch activities, and talk to mailboxes.
//!
//! Grounded on `dslab-core::context::SimulationContext` (a small `Clone`
//! facade wrapping `Rc<RefCell<SimulationState>>`), generalized from
//! "per-component event access" to "per-actor suspension points", each one
//! returning `Result<_, Killed>` so user code short-circuits with `?`
//! (spec.md §9 design note on modeling kill without stack unwinding).

use std::any::Any;
use std::rc::Rc;
use std::cell::RefCell;

use sg_kernel::activity::ActivityKind;
use sg_kernel::exec::ExecData;
use sg_kernel::future::ActivityFuture;
use sg_kernel::io::{IoData, IoOp};
use sg_kernel::sleep::SleepData;
use sg_kernel::{ActivityId, ActivitySet, Kernel, Outcome};
use sg_platform::{DiskId, HostId};

use crate::actor::{ActorId, ActorState};
use crate::error::Killed;
use crate::scheduler::Scheduler;

/// A yield-only future used by [`ActorContext::yield_now`]: pending on its
/// first poll (so the task reschedules itself at the tail of the ready
/// channel), ready on the second.
struct YieldNow(bool);

impl std::future::Future for YieldNow {
    type Output = ();
    fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<()> {
        if self.0 {
            std::task::Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            std::task::Poll::Pending
        }
    }
}

/// The handle passed to every actor's entry function (spec.md §3 `Actor`
/// operations, generalized as free methods on a per-actor facade).
#[derive(Clone)]
pub struct ActorContext {
    id: ActorId,
    scheduler: Rc<RefCell<Scheduler>>,
}

impl ActorContext {
    pub(crate) fn new(id: ActorId, scheduler: Rc<RefCell<Scheduler>>) -> Self {
        Self { id, scheduler }
    }

    /// This actor's PID.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Host this actor currently runs on.
    pub fn host(&self) -> HostId {
        self.scheduler.borrow().get(self.id).expect("actor must exist while its own context is live").host()
    }

    /// Current virtual clock reading (spec.md §4.7 "`simgrid_get_clock()`").
    pub fn time(&self) -> f64 {
        self.scheduler.borrow().time()
    }

    /// Reads a pinned property on this actor (supplemental feature; see
    /// SPEC_FULL.md).
    pub fn property(&self, key: &str) -> Option<String> {
        self.scheduler.borrow().get(self.id).and_then(|a| a.property(key)).map(str::to_owned)
    }

    fn kernel(&self) -> Rc<RefCell<Kernel>> {
        self.scheduler.borrow().kernel()
    }

    fn is_killed(&self) -> bool {
        self.scheduler.borrow().is_killed(self.id)
    }

    /// Parks this actor (via repeated `yield`s, without advancing the clock)
    /// for as long as [`ActorContext::suspend`] has been applied to it. Every
    /// suspension point calls this right after waking, so a suspended actor
    /// never returns control to its body until resumed.
    async fn wait_while_suspended(&self) {
        while self.scheduler.borrow().is_suspended(self.id) {
            YieldNow(false).await;
        }
    }

    /// Runs an [`ActivityFuture`] to completion, bracketing it with the
    /// `Blocked`/`Ready` state transitions every suspension point shares, and
    /// checking the kill flag both before posting the activity and again
    /// after it wakes (spec.md §9: "the kill is observed ... from the next
    /// blocking call").
    async fn block_on(&self, id: ActivityId) -> Result<Outcome, Killed> {
        if self.is_killed() {
            return Err(Killed);
        }
        self.scheduler.borrow_mut().set_waiting_on(self.id, Some(id));
        self.scheduler.borrow_mut().set_state(self.id, ActorState::Blocked);
        let outcome = ActivityFuture::new(self.kernel(), id).await;
        self.scheduler.borrow_mut().set_waiting_on(self.id, None);
        self.scheduler.borrow_mut().set_state(self.id, ActorState::Ready);
        self.wait_while_suspended().await;
        if self.is_killed() {
            return Err(Killed);
        }
        Ok(outcome)
    }

    /// Blocks until `duration` virtual seconds elapse (spec.md §4.6
    /// `sleep_for`). The Sleep activity's rate and constraint-free bound are
    /// handled entirely by the engine loop; this just posts it and waits.
    pub async fn sleep_for(&self, duration: f64) -> Result<(), Killed> {
        if self.is_killed() {
            return Err(Killed);
        }
        let id = self.kernel().borrow_mut().create(ActivityKind::Sleep(SleepData::new(duration)));
        self.kernel().borrow_mut().begin_starting(id);
        self.block_on(id).await?;
        Ok(())
    }

    /// Re-inserts this actor at the tail of the ready queue without
    /// advancing the clock (spec.md §4.6 `yield()`).
    pub async fn yield_now(&self) -> Result<(), Killed> {
        if self.is_killed() {
            return Err(Killed);
        }
        YieldNow(false).await;
        self.wait_while_suspended().await;
        if self.is_killed() {
            return Err(Killed);
        }
        Ok(())
    }

    /// Computes `cost` FLOPs on this actor's current host and waits for it
    /// to finish (spec.md §3 `Exec`, single-host case). `bound` caps the
    /// rate; `None` means uncapped.
    pub async fn execute(&self, cost: f64, bound: Option<f64>, priority: f64) -> Result<Outcome, Killed> {
        if self.is_killed() {
            return Err(Killed);
        }
        let host = self.host();
        let mut exec = ExecData::single(host, cost);
        exec.bound = bound.unwrap_or(f64::INFINITY);
        exec.priority = priority;
        let id = self.kernel().borrow_mut().create(ActivityKind::Exec(exec));
        self.kernel().borrow_mut().begin_starting(id);
        self.block_on(id).await
    }

    /// Starts an Exec without waiting for it, returning its handle so the
    /// caller can `wait`/`cancel` it independently (spec.md §8 scenario 4,
    /// "exec cancellation").
    pub fn execute_async(&self, cost: f64, bound: Option<f64>, priority: f64) -> ActivityId {
        let host = self.host();
        let mut exec = ExecData::single(host, cost);
        exec.bound = bound.unwrap_or(f64::INFINITY);
        exec.priority = priority;
        let id = self.kernel().borrow_mut().create(ActivityKind::Exec(exec));
        self.kernel().borrow_mut().begin_starting(id);
        id
    }

    /// Starts a parallel Exec spanning `hosts`, each with its own FLOP
    /// entry and an optional inter-host byte matrix, and waits for every
    /// entry to reach zero (spec.md §4.4 "Parallel Exec").
    pub async fn execute_parallel(&self, hosts: Vec<HostId>, flops: Vec<f64>, comm_matrix: Option<Vec<Vec<f64>>>) -> Result<Outcome, Killed> {
        if self.is_killed() {
            return Err(Killed);
        }
        let exec = ExecData::parallel(hosts, flops, comm_matrix);
        let id = self.kernel().borrow_mut().create(ActivityKind::Exec(exec));
        self.kernel().borrow_mut().begin_starting(id);
        self.block_on(id).await
    }

    /// Waits for any activity handle to reach a terminal state (spec.md §3
    /// Activity `wait`).
    pub async fn wait(&self, id: ActivityId) -> Result<Outcome, Killed> {
        self.block_on(id).await
    }

    /// Non-blocking: `Some(outcome)` if `id` has already reached a terminal
    /// state, `None` otherwise (spec.md §4.4 `test`).
    pub fn test(&self, id: ActivityId) -> Option<Outcome> {
        self.kernel().borrow().get(id).and_then(|a| a.outcome())
    }

    /// Waits for `id` to reach a terminal state, or gives up after `timeout`
    /// virtual seconds (spec.md §4.4 `wait_for`). Returns `None` on timeout,
    /// in which case `id` itself is left running unless the caller
    /// explicitly cancels it (spec.md §5: "timing out does not cancel the
    /// underlying activity").
    ///
    /// Implemented by racing `id` against a private Sleep activity through
    /// an [`ActivitySet`] rather than a bespoke timer future, so the race
    /// reuses the exact FIFO/fairness the engine already gives `wait_any`.
    pub async fn wait_for(&self, id: ActivityId, timeout: f64) -> Result<Option<Outcome>, Killed> {
        if self.is_killed() {
            return Err(Killed);
        }
        let sleep_id = self.kernel().borrow_mut().create(ActivityKind::Sleep(SleepData::new(timeout)));
        self.kernel().borrow_mut().begin_starting(sleep_id);
        let (winner, outcome) = self.block_on_any(&[id, sleep_id]).await?;
        if winner == id {
            self.kernel().borrow_mut().cancel(sleep_id, self.time());
            Ok(Some(outcome))
        } else {
            Ok(None)
        }
    }

    async fn block_on_any(&self, ids: &[ActivityId]) -> Result<(ActivityId, Outcome), Killed> {
        if self.is_killed() {
            return Err(Killed);
        }
        self.scheduler.borrow_mut().set_waiting_on(self.id, ids.first().copied());
        self.scheduler.borrow_mut().set_state(self.id, ActorState::Blocked);
        let mut set = self.activity_set();
        for &id in ids {
            set.push(id);
        }
        let result = set.wait_any().await.expect("ids is non-empty, so the set can never be empty here");
        self.scheduler.borrow_mut().set_waiting_on(self.id, None);
        self.scheduler.borrow_mut().set_state(self.id, ActorState::Ready);
        self.wait_while_suspended().await;
        if self.is_killed() {
            return Err(Killed);
        }
        Ok(result)
    }

    /// Cancels an activity (spec.md §5 cancellation semantics).
    pub fn cancel(&self, id: ActivityId) {
        self.kernel().borrow_mut().cancel(id, self.time());
    }

    /// A fresh, empty [`ActivitySet`] sharing this context's kernel.
    pub fn activity_set(&self) -> ActivitySet {
        ActivitySet::new(self.kernel())
    }

    /// Reads `size` bytes from `disk` and waits for completion (spec.md §3
    /// `Io`).
    pub async fn read(&self, disk: DiskId, size: f64) -> Result<Outcome, Killed> {
        self.io(disk, IoOp::Read, size).await
    }

    /// Writes `size` bytes to `disk` and waits for completion.
    pub async fn write(&self, disk: DiskId, size: f64) -> Result<Outcome, Killed> {
        self.io(disk, IoOp::Write, size).await
    }

    async fn io(&self, disk: DiskId, op: IoOp, size: f64) -> Result<Outcome, Killed> {
        if self.is_killed() {
            return Err(Killed);
        }
        let id = self.kernel().borrow_mut().create(ActivityKind::Io(IoData::new(disk, op, size)));
        self.kernel().borrow_mut().begin_starting(id);
        self.block_on(id).await
    }

    /// Sends `payload` of `size` bytes to mailbox `name` and waits for
    /// completion (spec.md §4.5 synchronous `put`).
    pub async fn put(&self, name: &str, size: f64, payload: Box<dyn Any>) -> Result<Outcome, Killed> {
        if self.is_killed() {
            return Err(Killed);
        }
        let host = self.host();
        let mailboxes = self.scheduler.borrow().mailboxes();
        let mbox_id = mailboxes.borrow_mut().get_or_create(name);
        let id = mailboxes.borrow_mut().get_mut(mbox_id).put_async(host, size, payload, self.time());
        self.block_on(id).await
    }

    /// Posts a receive on mailbox `name` and waits for a matching sender,
    /// returning the transferred payload on success (spec.md §4.5
    /// synchronous `get`).
    pub async fn get(&self, name: &str) -> Result<(Outcome, Option<Box<dyn Any>>), Killed> {
        if self.is_killed() {
            return Err(Killed);
        }
        let host = self.host();
        let mailboxes = self.scheduler.borrow().mailboxes();
        let mbox_id = mailboxes.borrow_mut().get_or_create(name);
        let id = mailboxes.borrow_mut().get_mut(mbox_id).get_async(host, self.time());
        let outcome = self.block_on(id).await?;
        let payload = match self.kernel().borrow_mut().get_mut(id).map(|a| a.kind_mut()) {
            Some(ActivityKind::Comm(c)) => c.payload.take(),
            _ => None,
        };
        Ok((outcome, payload))
    }

    /// Posts `payload` to mailbox `name` without waiting (spec.md §4.5 op
    /// 1, `put_async`). The caller gets the Comm's handle back to `wait`,
    /// `cancel`, or `detach` independently.
    pub fn put_async(&self, name: &str, size: f64, payload: Box<dyn Any>) -> ActivityId {
        let host = self.host();
        let mailboxes = self.scheduler.borrow().mailboxes();
        let mbox_id = mailboxes.borrow_mut().get_or_create(name);
        mailboxes.borrow_mut().get_mut(mbox_id).put_async(host, size, payload, self.time())
    }

    /// Posts a receive on mailbox `name` without waiting (spec.md §4.5 op
    /// 2, `get_async`).
    pub fn get_async(&self, name: &str) -> ActivityId {
        let host = self.host();
        let mailboxes = self.scheduler.borrow().mailboxes();
        let mbox_id = mailboxes.borrow_mut().get_or_create(name);
        mailboxes.borrow_mut().get_mut(mbox_id).get_async(host, self.time())
    }

    /// Claims mailbox `name` as this actor's permanent receiver (spec.md
    /// §4.5 mode 4): sends already queued are routed to it immediately, and
    /// every later `put_async`/`put` on `name` lands in its eager-receive
    /// side queue instead of `send_queue`, for this actor's `get`/`get_async`
    /// to drain without a round-trip.
    pub fn claim_mailbox(&self, name: &str) {
        let host = self.host();
        let time = self.time();
        let mailboxes = self.scheduler.borrow().mailboxes();
        let mbox_id = mailboxes.borrow_mut().get_or_create(name);
        mailboxes.borrow_mut().get_mut(mbox_id).claim_permanent_receiver(host, time);
    }

    /// Detaches a fire-and-forget Comm: if `id` is ever canceled instead of
    /// finishing, `cleanup` runs with its payload (spec.md §4.5 "payload
    /// ownership"). `name` must be the mailbox `id` was posted to.
    pub fn detach(&self, name: &str, id: ActivityId, cleanup: impl FnOnce(Box<dyn Any>) + 'static) {
        let mailboxes = self.scheduler.borrow().mailboxes();
        let mbox_id = mailboxes.borrow_mut().get_or_create(name);
        mailboxes.borrow_mut().get_mut(mbox_id).detach(id, cleanup);
    }

    /// Reads the payload `id` (a completed `get_async`/`get`) delivered, if
    /// any. Consumes it: a second call returns `None`.
    pub fn take_payload(&self, id: ActivityId) -> Option<Box<dyn Any>> {
        match self.kernel().borrow_mut().get_mut(id).map(|a| a.kind_mut()) {
            Some(ActivityKind::Comm(c)) => c.payload.take(),
            _ => None,
        }
    }

    /// Blocks until `other` terminates or `timeout` seconds elapse (spec.md
    /// §4.6 `join`). Implemented by polling rather than a kernel activity,
    /// since a terminated actor has no activity handle of its own.
    pub async fn join(&self, other: ActorId, timeout: Option<f64>) -> Result<(), Killed> {
        let deadline = timeout.map(|t| self.time() + t);
        loop {
            if self.is_killed() {
                return Err(Killed);
            }
            let terminated = matches!(self.scheduler.borrow().get(other).map(|a| a.state()), Some(ActorState::Terminated) | None);
            if terminated {
                return Ok(());
            }
            if let Some(deadline) = deadline {
                if self.time() >= deadline {
                    return Ok(());
                }
            }
            self.yield_now().await?;
        }
    }

    /// Kills another actor (spec.md §4.6 `kill`).
    pub fn kill(&self, other: ActorId) {
        self.scheduler.borrow_mut().kill(other, self.time());
    }

    /// Kills every other live actor (spec.md §4.6 `kill_all`).
    pub fn kill_all(&self) {
        let time = self.time();
        self.scheduler.borrow_mut().kill_all(self.id, time);
    }

    /// Sets the daemon bit on `other` (spec.md §4.6 `daemonize`).
    pub fn daemonize(&self, other: ActorId) {
        self.scheduler.borrow_mut().daemonize(other);
    }

    /// Sets the auto-restart bit on `other` (spec.md §4.6 `auto_restart`).
    pub fn auto_restart(&self, other: ActorId) {
        self.scheduler.borrow_mut().set_auto_restart(other);
    }

    /// Migrates this actor to `host` (spec.md §4.6 `set_host`).
    pub fn set_host(&self, host: HostId) {
        self.scheduler.borrow_mut().set_host(self.id, host);
    }

    /// Explicitly suspends `other`, independent of any activity wait (spec.md
    /// supplemental feature).
    pub fn suspend(&self, other: ActorId) {
        self.scheduler.borrow_mut().suspend(other);
    }

    /// Clears an explicit suspend.
    pub fn resume(&self, other: ActorId) {
        self.scheduler.borrow_mut().resume(other);
    }

    /// Registers an on-exit callback, fired in LIFO order at termination
    /// (spec.md §3 "on-exit callbacks (LIFO)").
    pub fn on_exit(&self, callback: impl FnOnce() + 'static) {
        let id = self.id;
        self.scheduler.borrow_mut().on_exit(id, callback);
    }
}
