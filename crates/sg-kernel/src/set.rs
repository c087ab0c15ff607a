//! `ActivitySet` (spec.md §3): an ordered, duplicate-free container of
//! activity handles with non-blocking and blocking membership queries.

use std::cell::RefCell;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::activity::ActivityId;
use crate::error::Outcome;
use crate::Kernel;

/// An ordered set of activity handles (spec.md §3 `Activity Set`).
///
/// Membership is a ref-counted hold on the kernel: pushing an activity
/// bumps its refcount, and `erase`/`drop`-via-`wait_any` release it again —
/// an activity drained by `wait_any` stays observable by the caller until
/// it drops its own handle (spec.md §3).
pub struct ActivitySet {
    kernel: Rc<RefCell<Kernel>>,
    members: Vec<ActivityId>,
    index: HashSet<ActivityId>,
}

impl ActivitySet {
    /// An empty set bound to `kernel`.
    pub fn new(kernel: Rc<RefCell<Kernel>>) -> Self {
        Self {
            kernel,
            members: Vec::new(),
            index: HashSet::new(),
        }
    }

    /// Adds `id` to the set. Panics on a duplicate (spec.md §3: "Duplicate
    /// membership is forbidden").
    pub fn push(&mut self, id: ActivityId) {
        assert!(self.index.insert(id), "activity already a member of this set");
        self.kernel.borrow_mut().retain(id);
        self.members.push(id);
    }

    /// Removes `id` from the set, if present, releasing the set's hold on it.
    pub fn erase(&mut self, id: ActivityId) {
        if self.index.remove(&id) {
            self.members.retain(|&m| m != id);
            self.kernel.borrow_mut().release(id);
        }
    }

    /// Number of members currently in the set.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Non-blocking: returns the first completed member (in insertion
    /// order), removing it from the set, or `None` if none are terminal yet.
    pub fn test_any(&mut self) -> Option<(ActivityId, Outcome)> {
        let kernel = self.kernel.clone();
        let k = kernel.borrow();
        let found = self
            .members
            .iter()
            .find_map(|&id| k.get(id).and_then(|a| a.outcome()).map(|o| (id, o)));
        drop(k);
        if let Some((id, _)) = found {
            self.erase(id);
        }
        found
    }

    /// Blocks the calling actor until any member completes, returning it
    /// (removed from the set) along with its outcome — or `None` immediately
    /// if the set is empty, rather than blocking forever (spec.md §4.4,
    /// `examples/original_source/examples/c/activityset-waitany`).
    pub fn wait_any(&mut self) -> WaitAny<'_> {
        WaitAny { set: self }
    }

    /// Blocks the calling actor until every current member has completed.
    /// Members are left in the set (callers typically drop it afterward).
    pub fn wait_all(&self) -> WaitAll {
        WaitAll {
            kernel: self.kernel.clone(),
            remaining: self.members.clone(),
        }
    }
}

impl Drop for ActivitySet {
    /// Releases every remaining member's hold (spec.md §3 I5): a set going
    /// out of scope with members still in it (e.g. after `wait_all`, or if
    /// the caller never drained it with `wait_any`/`erase`) must not pin
    /// those activities in the arena forever.
    fn drop(&mut self) {
        let mut kernel = self.kernel.borrow_mut();
        for &id in &self.members {
            kernel.release(id);
        }
    }
}

/// Future for [`ActivitySet::wait_any`].
pub struct WaitAny<'a> {
    set: &'a mut ActivitySet,
}

impl Future for WaitAny<'_> {
    type Output = Option<(ActivityId, Outcome)>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        // An empty set has nothing to ever wake it; matches `test_any` and
        // the `activityset-waitany` example's "return None rather than
        // blocking forever" contract.
        if this.set.is_empty() {
            return Poll::Ready(None);
        }
        if let Some(hit) = this.set.test_any() {
            return Poll::Ready(Some(hit));
        }
        let mut kernel = this.set.kernel.borrow_mut();
        for &id in &this.set.members {
            kernel.register_waker(id, cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Future for [`ActivitySet::wait_all`].
pub struct WaitAll {
    kernel: Rc<RefCell<Kernel>>,
    remaining: Vec<ActivityId>,
}

impl Future for WaitAll {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let kernel = this.kernel.borrow();
        this.remaining.retain(|&id| !kernel.get(id).map(|a| a.outcome().is_some()).unwrap_or(true));
        if this.remaining.is_empty() {
            return Poll::Ready(());
        }
        drop(kernel);
        let mut kernel = this.kernel.borrow_mut();
        for &id in &this.remaining {
            kernel.register_waker(id, cx.waker().clone());
        }
        Poll::Pending
    }
}
