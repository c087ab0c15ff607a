//! Rendez-vous mailboxes (spec.md §4.5, component C5): pairing posted
//! sender Comms with posted receiver Comms into one fused, started Comm.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use sg_kernel::activity::{ActivityId, ActivityKind};
use sg_kernel::comm::CommData;
use sg_kernel::future::ActivityFuture;
use sg_kernel::{Kernel, Outcome};
use sg_platform::HostId;

/// Dense identifier of a [`Mailbox`] within a [`crate::MailboxRegistry`].
pub type MailboxId = usize;

/// A mailbox's permanent-receiver claim (spec.md §4.5 mode 4): the claiming
/// actor's host, so eagerly-arrived sends can be routed without a matching
/// `get_async` ever being posted.
#[derive(Debug, Clone, Copy)]
struct PermanentReceiver {
    host: HostId,
}

/// A named rendez-vous point (spec.md §3 `Mailbox`).
///
/// Invariant (I-mbox, spec.md §4.5): after every matching or cancel, at
/// most one of `send_queue`/`recv_queue` is non-empty — enforced here by
/// always attempting an immediate match inside `put_async`/`get_async`
/// rather than ever letting both queues hold entries simultaneously.
pub struct Mailbox {
    id: MailboxId,
    name: String,
    kernel: Rc<RefCell<Kernel>>,
    send_queue: VecDeque<ActivityId>,
    recv_queue: VecDeque<ActivityId>,
    permanent_receiver: Option<PermanentReceiver>,
    /// Side queue of sends already routed to the permanent receiver
    /// (spec.md §4.5 mode 4), in FIFO arrival order.
    arrived: VecDeque<ActivityId>,
}

impl Mailbox {
    pub(crate) fn new(id: MailboxId, name: impl Into<String>, kernel: Rc<RefCell<Kernel>>) -> Self {
        Self {
            id,
            name: name.into(),
            kernel,
            send_queue: VecDeque::new(),
            recv_queue: VecDeque::new(),
            permanent_receiver: None,
            arrived: VecDeque::new(),
        }
    }

    /// Mailbox identifier.
    pub fn id(&self) -> MailboxId {
        self.id
    }

    /// Mailbox name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Claims this mailbox as `host`'s permanent receiver (spec.md §4.5
    /// mode 4). Any sends already queued are immediately routed to it, in
    /// FIFO order, exactly as a newly-arrived send would be.
    pub fn claim_permanent_receiver(&mut self, host: HostId, time: f64) {
        self.permanent_receiver = Some(PermanentReceiver { host });
        while let Some(send_id) = self.send_queue.pop_front() {
            self.route_to_permanent_receiver(send_id, host, time);
        }
    }

    fn route_to_permanent_receiver(&mut self, send_id: ActivityId, host: HostId, time: f64) {
        let mut kernel = self.kernel.borrow_mut();
        if let Some(ActivityKind::Comm(c)) = kernel.get_mut(send_id).map(|a| a.kind_mut()) {
            c.dst_host = Some(host);
        }
        kernel.mark_started(send_id, time);
        drop(kernel);
        self.arrived.push_back(send_id);
    }

    /// Posts a sender Comm (spec.md §4.5 op 1): matches immediately against
    /// a waiting receiver or the permanent-receiver slot, else queues.
    pub fn put_async(&mut self, src_host: HostId, size: f64, payload: Box<dyn Any>, time: f64) -> ActivityId {
        let send_id = self.kernel.borrow_mut().create(ActivityKind::Comm(CommData::send(src_host, size, payload)));
        self.kernel.borrow_mut().begin_starting(send_id);

        if let Some(PermanentReceiver { host }) = self.permanent_receiver {
            self.route_to_permanent_receiver(send_id, host, time);
        } else if let Some(recv_id) = self.recv_queue.pop_front() {
            self.fuse(send_id, recv_id, time);
        } else {
            self.send_queue.push_back(send_id);
        }
        send_id
    }

    /// Posts a receiver Comm (spec.md §4.5 op 2): on a mailbox with a
    /// permanent receiver, drains the already-arrived side queue first
    /// (mode 4, "completes without round-trip"); otherwise matches
    /// immediately against a waiting sender, else queues.
    pub fn get_async(&mut self, dst_host: HostId, time: f64) -> ActivityId {
        let recv_id = self.kernel.borrow_mut().create(ActivityKind::Comm(CommData::recv(dst_host)));
        self.kernel.borrow_mut().begin_starting(recv_id);

        if let Some(send_id) = self.arrived.pop_front() {
            self.drain_arrived(send_id, recv_id, time);
        } else if let Some(send_id) = self.send_queue.pop_front() {
            self.fuse(send_id, recv_id, time);
        } else {
            self.recv_queue.push_back(recv_id);
        }
        recv_id
    }

    /// Pairs `recv_id` with `send_id`, a send already routed to the
    /// permanent receiver (spec.md §4.5 mode 4). If the underlying transfer
    /// already finished, the receive completes in the same instant — no
    /// second round-trip through the solver. If it's still in flight, the
    /// receive becomes its peer the way a freshly-fused pair would, so it
    /// completes exactly when the send does (spec.md §9's single rule: FIFO
    /// side-queue drain, no re-negotiated route).
    fn drain_arrived(&mut self, send_id: ActivityId, recv_id: ActivityId, time: f64) {
        let mut kernel = self.kernel.borrow_mut();
        let already_done = kernel.get(send_id).map(|a| a.state().is_terminal()).unwrap_or(true);

        if already_done {
            let payload = match kernel.get_mut(send_id).map(|a| a.kind_mut()) {
                Some(ActivityKind::Comm(c)) => c.payload.take(),
                _ => None,
            };
            if let Some(ActivityKind::Comm(c)) = kernel.get_mut(recv_id).map(|a| a.kind_mut()) {
                c.payload = payload;
            }
            drop(kernel);
            self.kernel.borrow_mut().finish(recv_id, time);
            return;
        }

        if let Some(ActivityKind::Comm(c)) = kernel.get_mut(send_id).map(|a| a.kind_mut()) {
            c.peer = Some(recv_id);
        }
        if let Some(ActivityKind::Comm(c)) = kernel.get_mut(recv_id).map(|a| a.kind_mut()) {
            c.peer = Some(send_id);
        }
        drop(kernel);
        self.kernel.borrow_mut().mark_started(recv_id, time);
    }

    /// Synchronous `put`: posts and waits for completion (spec.md §4.5 op 3).
    pub async fn put(&mut self, src_host: HostId, size: f64, payload: Box<dyn Any>, time: f64) -> Outcome {
        let id = self.put_async(src_host, size, payload, time);
        ActivityFuture::new(self.kernel.clone(), id).await
    }

    /// Synchronous `get`: posts and waits for completion, returning the
    /// transferred payload on success.
    pub async fn get(&mut self, dst_host: HostId, time: f64) -> (Outcome, Option<Box<dyn Any>>) {
        let id = self.get_async(dst_host, time);
        let outcome = ActivityFuture::new(self.kernel.clone(), id).await;
        let payload = match self.kernel.borrow_mut().get_mut(id).map(|a| a.kind_mut()) {
            Some(ActivityKind::Comm(c)) => c.payload.take(),
            _ => None,
        };
        (outcome, payload)
    }

    /// Marks `id` (one half of a fire-and-forget Comm) to hand its payload
    /// back to the caller's `cleanup` closure if it's ever canceled instead
    /// of finishing (spec.md §4.5 "payload ownership").
    pub fn detach(&mut self, id: ActivityId, cleanup: impl FnOnce(Box<dyn Any>) + 'static) {
        if let Some(ActivityKind::Comm(c)) = self.kernel.borrow_mut().get_mut(id).map(|a| a.kind_mut()) {
            c.on_cleanup = Some(Box::new(cleanup));
        }
    }

    /// Cancels `id`: removes it from whichever queue still holds it (if
    /// any) and transitions it to canceled. If `id` was already matched,
    /// [`Kernel::finalize`](sg_kernel::Kernel) propagates the cancellation
    /// to its peer (spec.md §8 P8).
    pub fn cancel(&mut self, id: ActivityId, time: f64) {
        self.send_queue.retain(|&x| x != id);
        self.recv_queue.retain(|&x| x != id);
        self.arrived.retain(|&x| x != id);
        log::debug!("mailbox '{}' cancels {:?} at t={}", self.name, id, time);
        self.kernel.borrow_mut().cancel(id, time);
    }

    /// Fuses a posted sender with a posted receiver into one started Comm
    /// (spec.md §4.5: "copy sender metadata into the fused Comm, transition
    /// to started"). Both halves become `started`; the route itself is
    /// filled in by the engine's network resource model on the next round.
    fn fuse(&mut self, send_id: ActivityId, recv_id: ActivityId, time: f64) {
        log::debug!("mailbox '{}' fuses send {:?} with recv {:?} at t={}", self.name, send_id, recv_id, time);
        let mut kernel = self.kernel.borrow_mut();
        let (dst_host, dst_buff) = match kernel.get(recv_id).map(|a| a.kind()) {
            Some(ActivityKind::Comm(c)) => (c.dst_host, c.dst_buff),
            _ => (None, None),
        };
        let (src_host, size, src_buff, bound, priority) = match kernel.get(send_id).map(|a| a.kind()) {
            Some(ActivityKind::Comm(c)) => (c.src_host, c.size, c.src_buff, c.bound, c.priority),
            _ => (None, 0.0, None, f64::INFINITY, 1.0),
        };

        if let Some(ActivityKind::Comm(c)) = kernel.get_mut(send_id).map(|a| a.kind_mut()) {
            c.dst_host = dst_host;
            c.peer = Some(recv_id);
        }
        if let Some(ActivityKind::Comm(c)) = kernel.get_mut(recv_id).map(|a| a.kind_mut()) {
            c.src_host = src_host;
            c.size = size;
            c.remaining = size;
            c.src_buff = src_buff;
            c.dst_buff = dst_buff;
            c.bound = bound;
            c.priority = priority;
            c.peer = Some(send_id);
        }

        kernel.mark_started(send_id, time);
        kernel.mark_started(recv_id, time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_kernel::ActivityState;

    fn new_mailbox() -> (Rc<RefCell<Kernel>>, Mailbox) {
        let kernel = Rc::new(RefCell::new(Kernel::new()));
        let mbox = Mailbox::new(0, "m", kernel.clone());
        (kernel, mbox)
    }

    #[test]
    fn put_then_get_fuses_immediately() {
        let (kernel, mut mbox) = new_mailbox();
        let send_id = mbox.put_async(0, 1.0, Box::new(42u32), 0.0);
        assert_eq!(kernel.borrow().get(send_id).unwrap().state(), ActivityState::Starting);

        let recv_id = mbox.get_async(1, 0.0);
        assert_eq!(kernel.borrow().get(send_id).unwrap().state(), ActivityState::Started);
        assert_eq!(kernel.borrow().get(recv_id).unwrap().state(), ActivityState::Started);
        assert!(mbox.send_queue.is_empty() && mbox.recv_queue.is_empty());
    }

    #[test]
    fn fifo_match_delivers_payload() {
        // spec.md P1
        let (kernel, mut mbox) = new_mailbox();
        let send_id = mbox.put_async(0, 1.0, Box::new(7u32), 0.0);
        let recv_id = mbox.get_async(1, 0.0);

        kernel.borrow_mut().finish(send_id, 1.0);
        let payload = match kernel.borrow_mut().get_mut(recv_id).map(|a| a.kind_mut()) {
            Some(ActivityKind::Comm(c)) => c.payload.take(),
            _ => None,
        };
        let delivered = *payload.expect("payload should have crossed to the receiver").downcast::<u32>().unwrap();
        assert_eq!(delivered, 7);
        assert_eq!(kernel.borrow().get(recv_id).unwrap().state(), ActivityState::Finished);
    }

    #[test]
    fn cancel_before_match_removes_from_queue() {
        let (kernel, mut mbox) = new_mailbox();
        let send_id = mbox.put_async(0, 1.0, Box::new(1u32), 0.0);
        assert_eq!(mbox.send_queue.len(), 1);
        mbox.cancel(send_id, 0.5);
        assert!(mbox.send_queue.is_empty());
        assert_eq!(kernel.borrow().get(send_id).unwrap().state(), ActivityState::Canceled);
    }

    #[test]
    fn cancel_after_match_propagates_to_peer() {
        let (kernel, mut mbox) = new_mailbox();
        let send_id = mbox.put_async(0, 1.0, Box::new(1u32), 0.0);
        let recv_id = mbox.get_async(1, 0.0);
        mbox.cancel(send_id, 0.5);
        assert_eq!(kernel.borrow().get(recv_id).unwrap().state(), ActivityState::Canceled);
    }

    #[test]
    fn permanent_receiver_skips_round_trip() {
        let (kernel, mut mbox) = new_mailbox();
        mbox.claim_permanent_receiver(9, 0.0);
        let send_id = mbox.put_async(0, 1.0, Box::new(5u32), 1.0);
        assert_eq!(kernel.borrow().get(send_id).unwrap().state(), ActivityState::Started);
        assert_eq!(mbox.arrived.len(), 1);
    }

    #[test]
    fn permanent_receiver_get_drains_already_finished_arrival() {
        // spec.md §4.5 mode 4: the transfer into the permanent receiver's
        // host already ran to completion (stands in for the engine's
        // network model finishing it); `get_async` must hand back the
        // payload in the same instant, no second round-trip.
        let (kernel, mut mbox) = new_mailbox();
        mbox.claim_permanent_receiver(9, 0.0);
        let send_id = mbox.put_async(0, 1.0, Box::new(99u32), 1.0);
        kernel.borrow_mut().finish(send_id, 1.5);
        assert!(mbox.arrived.len() == 1, "send should still be parked in the side queue until drained by get");

        let recv_id = mbox.get_async(9, 2.0);
        assert!(mbox.arrived.is_empty());
        assert_eq!(kernel.borrow().get(recv_id).unwrap().state(), ActivityState::Finished);
        let payload = match kernel.borrow_mut().get_mut(recv_id).map(|a| a.kind_mut()) {
            Some(ActivityKind::Comm(c)) => c.payload.take(),
            _ => None,
        };
        let delivered = *payload.expect("payload should have been staged for the permanent receiver").downcast::<u32>().unwrap();
        assert_eq!(delivered, 99);
    }

    #[test]
    fn permanent_receiver_get_rides_in_flight_arrival_to_completion() {
        // A `get` posted while the routed send is still in flight becomes
        // its peer instead of re-fusing a fresh pair, so it completes
        // exactly when the underlying transfer does.
        let (kernel, mut mbox) = new_mailbox();
        mbox.claim_permanent_receiver(9, 0.0);
        let send_id = mbox.put_async(0, 1.0, Box::new(7u32), 1.0);
        assert_eq!(kernel.borrow().get(send_id).unwrap().state(), ActivityState::Started);

        let recv_id = mbox.get_async(9, 1.2);
        assert_ne!(kernel.borrow().get(recv_id).unwrap().state(), ActivityState::Finished);

        kernel.borrow_mut().finish(send_id, 2.0);
        assert_eq!(kernel.borrow().get(recv_id).unwrap().state(), ActivityState::Finished);
        let payload = match kernel.borrow_mut().get_mut(recv_id).map(|a| a.kind_mut()) {
            Some(ActivityKind::Comm(c)) => c.payload.take(),
            _ => None,
        };
        let delivered = *payload.expect("payload should have crossed once the send finished").downcast::<u32>().unwrap();
        assert_eq!(delivered, 7);
    }
}
