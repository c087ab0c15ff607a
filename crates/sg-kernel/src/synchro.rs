//! Synchro activities: mutex/semaphore/barrier/condition waits (spec.md §3
//! `Synchro`). A Synchro carries no solver variable; it is woken directly
//! by whichever primitive (`sg-actors::sync`) it is queued on, rather than
//! by the per-round solver/clock machinery the other variants use.

/// Which family of primitive this Synchro is waiting on. Carried only for
/// diagnostics and `ActivitySet`/observer bookkeeping; the actual wait
/// queue lives on the primitive object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchroKind {
    /// Waiting to acquire a mutex.
    Mutex,
    /// Waiting to acquire a semaphore permit.
    Semaphore,
    /// Waiting at a barrier.
    Barrier,
    /// Waiting on a condition variable.
    Condition,
}

/// A Synchro activity. `ready` is flipped by the owning primitive when this
/// waiter's turn comes (lock released to it, permit available, barrier
/// filled, condition signalled); the engine treats `ready` the same way it
/// treats "remaining <= epsilon" for the other variants.
#[derive(Debug, Clone, Copy)]
pub struct SynchroData {
    /// Which primitive family this is.
    pub kind: SynchroKind,
    /// Set by the primitive once this waiter may proceed.
    pub ready: bool,
}

impl SynchroData {
    /// A new, not-yet-ready Synchro wait.
    pub fn new(kind: SynchroKind) -> Self {
        Self { kind, ready: false }
    }
}
