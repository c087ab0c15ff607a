use std::cell::RefCell;
use std::rc::Rc;

use crate::activity::{ActivityKind, ActivityState};
use crate::comm::CommData;
use crate::error::{FailureKind, Outcome};
use crate::exec::ExecData;
use crate::future::ActivityFuture;
use crate::set::ActivitySet;
use crate::sleep::SleepData;
use crate::Kernel;

fn new_kernel() -> Rc<RefCell<Kernel>> {
    Rc::new(RefCell::new(Kernel::new()))
}

#[test]
fn lifecycle_starting_to_finished() {
    let kernel = new_kernel();
    let id = kernel.borrow_mut().create(ActivityKind::Exec(ExecData::single(0, 100.0)));
    assert_eq!(kernel.borrow().get(id).unwrap().state(), ActivityState::Inited);

    kernel.borrow_mut().begin_starting(id);
    assert_eq!(kernel.borrow().get(id).unwrap().state(), ActivityState::Starting);

    kernel.borrow_mut().mark_started(id, 1.0);
    kernel.borrow_mut().set_variable(id, Some(0));
    assert_eq!(kernel.borrow().get(id).unwrap().state(), ActivityState::Started);
    assert_eq!(kernel.borrow().get(id).unwrap().start_time(), Some(1.0));

    kernel.borrow_mut().finish(id, 2.5);
    let a = kernel.borrow();
    let a = a.get(id).unwrap();
    assert_eq!(a.state(), ActivityState::Finished);
    assert_eq!(a.finish_time(), Some(2.5));
    assert_eq!(a.outcome(), Some(Outcome::Finished));
}

#[test]
fn terminal_states_are_absorbing() {
    let kernel = new_kernel();
    let id = kernel.borrow_mut().create(ActivityKind::Sleep(SleepData::new(1.0)));
    kernel.borrow_mut().finish(id, 1.0);
    kernel.borrow_mut().fail(id, 2.0, FailureKind::Timeout);
    // The second transition must not overwrite the first (I4).
    let k = kernel.borrow();
    let a = k.get(id).unwrap();
    assert_eq!(a.outcome(), Some(Outcome::Finished));
    assert_eq!(a.finish_time(), Some(1.0));
}

#[test]
fn wait_resolves_after_finish() {
    let kernel = new_kernel();
    let id = kernel.borrow_mut().create(ActivityKind::Sleep(SleepData::new(1.0)));
    let fut = ActivityFuture::new(kernel.clone(), id);

    futures::pin_mut!(fut);
    let waker = futures::task::noop_waker();
    let mut cx = std::task::Context::from_waker(&waker);
    assert!(fut.as_mut().poll(&mut cx).is_pending());

    kernel.borrow_mut().finish(id, 3.0);
    match fut.as_mut().poll(&mut cx) {
        std::task::Poll::Ready(outcome) => assert_eq!(outcome, Outcome::Finished),
        std::task::Poll::Pending => panic!("expected ready after finish()"),
    }
}

#[test]
fn activity_set_rejects_duplicates() {
    let kernel = new_kernel();
    let mut set = ActivitySet::new(kernel.clone());
    let id = kernel.borrow_mut().create(ActivityKind::Sleep(SleepData::new(1.0)));
    set.push(id);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| set.push(id)));
    assert!(result.is_err());
}

#[test]
fn activity_set_test_any_drains_completed() {
    let kernel = new_kernel();
    let mut set = ActivitySet::new(kernel.clone());
    let a = kernel.borrow_mut().create(ActivityKind::Sleep(SleepData::new(1.0)));
    let b = kernel.borrow_mut().create(ActivityKind::Sleep(SleepData::new(2.0)));
    set.push(a);
    set.push(b);
    assert_eq!(set.test_any(), None);

    kernel.borrow_mut().finish(b, 2.0);
    let (done, outcome) = set.test_any().expect("b should be ready");
    assert_eq!(done, b);
    assert_eq!(outcome, Outcome::Finished);
    assert_eq!(set.len(), 1); // only `a` remains
}

#[test]
fn wait_any_on_empty_set_resolves_none_instead_of_hanging() {
    // Mirrors `activityset-waitany.c`: an empty set must not register a
    // waker and hang forever.
    let kernel = new_kernel();
    let mut set = ActivitySet::new(kernel.clone());
    let fut = set.wait_any();

    futures::pin_mut!(fut);
    let waker = futures::task::noop_waker();
    let mut cx = std::task::Context::from_waker(&waker);
    match fut.as_mut().poll(&mut cx) {
        std::task::Poll::Ready(None) => {}
        other => panic!("expected Ready(None) on an empty set, got {other:?}"),
    }
}

#[test]
fn cancel_propagates_to_peer_within_same_round() {
    // Mirrors spec.md P8: cancelling one matched Comm half cancels its
    // fused peer in the same call, without a second explicit cancel.
    let kernel = new_kernel();
    let sender = kernel.borrow_mut().create(ActivityKind::Comm(CommData::send(0, 1.0, Box::new(()))));
    let receiver = kernel.borrow_mut().create(ActivityKind::Comm(CommData::recv(1)));

    // Fuse the pair as sg-mailbox would on a match.
    if let Some(ActivityKind::Comm(c)) = kernel.borrow_mut().get_mut(sender).map(|a| a.kind_mut()) {
        c.peer = Some(receiver);
    }
    if let Some(ActivityKind::Comm(c)) = kernel.borrow_mut().get_mut(receiver).map(|a| a.kind_mut()) {
        c.peer = Some(sender);
    }
    kernel.borrow_mut().mark_started(sender, 0.0);
    kernel.borrow_mut().mark_started(receiver, 0.0);

    let fut_recv = ActivityFuture::new(kernel.clone(), receiver);
    futures::pin_mut!(fut_recv);
    let waker = futures::task::noop_waker();
    let mut cx = std::task::Context::from_waker(&waker);
    assert!(fut_recv.as_mut().poll(&mut cx).is_pending());

    kernel.borrow_mut().cancel(sender, 0.5);

    match fut_recv.as_mut().poll(&mut cx) {
        std::task::Poll::Ready(Outcome::Canceled) => {}
        std::task::Poll::Ready(other) => panic!("expected Canceled, got {:?}", other),
        std::task::Poll::Pending => panic!("expected Ready after cancel()"),
    }
    assert_eq!(kernel.borrow().get(receiver).unwrap().state(), ActivityState::Canceled);
}
