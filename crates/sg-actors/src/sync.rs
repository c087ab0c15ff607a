//! Simulation-level synchronization primitives (spec.md §3 `Synchro`):
//! mutex, semaphore, barrier, condition variable.
//!
//! Each waiter is backed by a `Synchro` kernel activity carrying no solver
//! variable, only a wake-up predicate (spec.md §3): the primitive itself
//! decides when a waiter's turn comes and calls `Kernel::finish` on its
//! activity directly, which wakes the `.wait()` future the same way a
//! solver-driven Exec/Comm completion would. No OS thread primitive is
//! involved anywhere (spec.md §9 "simulation-level objects with their own
//! wait queues, never OS primitives").

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use sg_kernel::activity::ActivityKind;
use sg_kernel::synchro::{SynchroData, SynchroKind};
use sg_kernel::{ActivityId, Kernel};

use crate::context::ActorContext;
use crate::error::Killed;

fn queue_wait(kernel: &Rc<RefCell<Kernel>>, kind: SynchroKind, time: f64) -> ActivityId {
    let id = kernel.borrow_mut().create(ActivityKind::Synchro(SynchroData::new(kind)));
    kernel.borrow_mut().begin_starting(id);
    kernel.borrow_mut().mark_started(id, time);
    id
}

/// A simulation-level mutual-exclusion lock. Uncontended `lock` succeeds
/// without creating a kernel activity at all; a contended caller queues
/// behind whoever holds it and is woken in FIFO order on `unlock`.
pub struct Mutex {
    kernel: Rc<RefCell<Kernel>>,
    locked: bool,
    queue: VecDeque<ActivityId>,
}

impl Mutex {
    /// A new, unlocked mutex sharing `kernel` with the rest of the engine.
    pub fn new(kernel: Rc<RefCell<Kernel>>) -> Self {
        Self { kernel, locked: false, queue: VecDeque::new() }
    }

    /// Whether the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Acquires the lock, blocking the caller if it is already held
    /// (spec.md §3 Synchro, §9 "mutex/semaphore/barrier acquire" as a
    /// cooperative suspension point).
    pub async fn lock(&mut self, ctx: &ActorContext) -> Result<(), Killed> {
        if !self.locked {
            self.locked = true;
            return Ok(());
        }
        let id = queue_wait(&self.kernel, SynchroKind::Mutex, ctx.time());
        self.queue.push_back(id);
        ctx.wait(id).await?;
        self.locked = true;
        Ok(())
    }

    /// Releases the lock. Hands it straight to the next queued waiter, if
    /// any, rather than going back through the free-list.
    pub fn unlock(&mut self, time: f64) {
        match self.queue.pop_front() {
            Some(next) => self.kernel.borrow_mut().finish(next, time),
            None => self.locked = false,
        }
    }
}

/// A simulation-level counting semaphore.
pub struct Semaphore {
    kernel: Rc<RefCell<Kernel>>,
    permits: usize,
    queue: VecDeque<ActivityId>,
}

impl Semaphore {
    /// A semaphore starting with `permits` available.
    pub fn new(kernel: Rc<RefCell<Kernel>>, permits: usize) -> Self {
        Self { kernel, permits, queue: VecDeque::new() }
    }

    /// Available permits right now.
    pub fn available(&self) -> usize {
        self.permits
    }

    /// Acquires one permit, blocking if none are free.
    pub async fn acquire(&mut self, ctx: &ActorContext) -> Result<(), Killed> {
        if self.permits > 0 {
            self.permits -= 1;
            return Ok(());
        }
        let id = queue_wait(&self.kernel, SynchroKind::Semaphore, ctx.time());
        self.queue.push_back(id);
        ctx.wait(id).await
    }

    /// Releases one permit, handing it directly to the next queued waiter.
    pub fn release(&mut self, time: f64) {
        match self.queue.pop_front() {
            Some(next) => self.kernel.borrow_mut().finish(next, time),
            None => self.permits += 1,
        }
    }
}

/// A simulation-level cyclic barrier: releases every waiter once `parties`
/// of them have called `wait`.
pub struct Barrier {
    kernel: Rc<RefCell<Kernel>>,
    parties: usize,
    waiting: VecDeque<ActivityId>,
}

impl Barrier {
    /// A barrier that releases once `parties` actors are waiting.
    pub fn new(kernel: Rc<RefCell<Kernel>>, parties: usize) -> Self {
        assert!(parties > 0, "a barrier needs at least one party");
        Self { kernel, parties, waiting: VecDeque::new() }
    }

    /// Blocks until `parties` actors have all called `wait`, then releases
    /// them together.
    pub async fn wait(&mut self, ctx: &ActorContext) -> Result<(), Killed> {
        let id = queue_wait(&self.kernel, SynchroKind::Barrier, ctx.time());
        self.waiting.push_back(id);
        if self.waiting.len() >= self.parties {
            let time = ctx.time();
            for waiter in std::mem::take(&mut self.waiting) {
                self.kernel.borrow_mut().finish(waiter, time);
            }
        }
        ctx.wait(id).await?;
        Ok(())
    }
}

/// A simulation-level condition variable. Unlike `std::sync::Condvar` this
/// does not couple to a specific mutex: spec.md §3 describes Synchro's
/// condition wait without requiring an atomic unlock-then-wait pairing, so
/// callers that need that invariant compose it themselves with `Mutex`.
pub struct Condvar {
    kernel: Rc<RefCell<Kernel>>,
    waiting: VecDeque<ActivityId>,
}

impl Condvar {
    /// A new condition variable with no waiters.
    pub fn new(kernel: Rc<RefCell<Kernel>>) -> Self {
        Self { kernel, waiting: VecDeque::new() }
    }

    /// Blocks until `notify_one` or `notify_all` wakes this waiter.
    pub async fn wait(&mut self, ctx: &ActorContext) -> Result<(), Killed> {
        let id = queue_wait(&self.kernel, SynchroKind::Condition, ctx.time());
        self.waiting.push_back(id);
        ctx.wait(id).await?;
        Ok(())
    }

    /// Wakes the longest-waiting actor, if any.
    pub fn notify_one(&mut self, time: f64) {
        if let Some(next) = self.waiting.pop_front() {
            self.kernel.borrow_mut().finish(next, time);
        }
    }

    /// Wakes every waiting actor.
    pub fn notify_all(&mut self, time: f64) {
        for waiter in std::mem::take(&mut self.waiting) {
            self.kernel.borrow_mut().finish(waiter, time);
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
    use crate::scheduler::Scheduler;

    fn new_scheduler() -> (Rc<RefCell<Scheduler>>, Rc<RefCell<Kernel>>, sg_platform::HostId) {
        let kernel = Rc::new(RefCell::new(Kernel::new()));
        let mailboxes = Rc::new(RefCell::new(MailboxRegistry::new(kernel.clone())));
        let clock = Rc::new(StdCell::new(0.0));
        let mut graph = PlatformGraph::new("root", RoutingMethod::Full);
        let root = graph.root();
        let host = graph.add_host("h", root, 1e9, 1).unwrap();
        (Rc::new(RefCell::new(Scheduler::new(kernel.clone(), mailboxes, clock))), kernel, host)
    }

    #[test]
    fn contended_mutex_wakes_waiter_in_fifo_order_on_unlock() {
        let (scheduler, kernel, host) = new_scheduler();
        let mutex = Rc::new(RefCell::new(Mutex::new(kernel)));
        let order = Rc::new(RefCell::new(Vec::new()));

        let mutex_a = mutex.clone();
        let order_a = order.clone();
        ActorBuilder::new("a", host).spawn(&scheduler, move |ctx| {
            let mutex = mutex_a.clone();
            let order = order_a.clone();
            async move {
                mutex.borrow_mut().lock(&ctx).await?;
                order.borrow_mut().push('a');
                Ok(())
            }
        });
        scheduler.borrow().drain_ready();
        assert!(mutex.borrow().is_locked());

        let mutex_b = mutex.clone();
        let order_b = order.clone();
        ActorBuilder::new("b", host).spawn(&scheduler, move |ctx| {
            let mutex = mutex_b.clone();
            let order = order_b.clone();
            async move {
                mutex.borrow_mut().lock(&ctx).await?;
                order.borrow_mut().push('b');
                Ok(())
            }
        });
        scheduler.borrow().drain_ready();
        assert_eq!(*order.borrow(), vec!['a']);

        mutex.borrow_mut().unlock(0.0);
        scheduler.borrow().drain_ready();
        assert_eq!(*order.borrow(), vec!['a', 'b']);
    }

    #[test]
    fn barrier_releases_all_parties_once_full() {
        let (scheduler, kernel, host) = new_scheduler();
        let barrier = Rc::new(RefCell::new(Barrier::new(kernel, 2)));
        let arrived = Rc::new(StdCell::new(0u32));

        for name in ["a", "b"] {
            let barrier = barrier.clone();
            let arrived = arrived.clone();
            ActorBuilder::new(name, host).spawn(&scheduler, move |ctx| {
                let barrier = barrier.clone();
                let arrived = arrived.clone();
                async move {
                    barrier.borrow_mut().wait(&ctx).await?;
                    arrived.set(arrived.get() + 1);
                    Ok(())
                }
            });
        }
        scheduler.borrow().drain_ready();

        assert_eq!(arrived.get(), 2);
    }
}
