//! Bridges an activity's terminal transition to an `.await` point.
//!
//! Grounded on `dslab-core::async_core::shared_state::EventFuture` (same
//! "poll checks a shared completion flag, registers a waker if not ready"
//! shape), generalized from "waiting for a named event" to "waiting for an
//! [`Activity`](crate::Activity)'s terminal state" (spec.md §4.4 `wait`).

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::activity::ActivityId;
use crate::error::Outcome;
use crate::Kernel;

/// Future returned by `wait()`-style calls: resolves to the activity's
/// [`Outcome`] once it reaches a terminal state.
///
/// Unconditional (no deadline) — `wait_for(timeout)` is composed one layer
/// up (`sg-actors`/`sg`), where the virtual clock and timer scheduling
/// live, by racing this future against a timeout future.
pub struct ActivityFuture {
    kernel: Rc<RefCell<Kernel>>,
    id: ActivityId,
}

impl ActivityFuture {
    /// A future that resolves when `id` reaches a terminal state.
    pub fn new(kernel: Rc<RefCell<Kernel>>, id: ActivityId) -> Self {
        Self { kernel, id }
    }
}

impl Future for ActivityFuture {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut kernel = self.kernel.borrow_mut();
        match kernel.get(self.id).and_then(|a| a.outcome()) {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                kernel.register_waker(self.id, cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
