//! Comm activities: moving bytes over a routed link path (spec.md §3
//! `Comm`), paired sender/receiver halves fused by `sg-mailbox`.

use std::any::Any;

use sg_platform::{HostId, LinkId};

use crate::arena::Index;
use crate::ActivityTag;

/// Which side of a rendez-vous this Comm half represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// This half is the sender (`put_async`).
    Send,
    /// This half is the receiver (`get_async`).
    Recv,
}

/// A Comm activity (spec.md §3, §4.5). Before mailbox matching, most fields
/// are placeholders (`route` empty, `peer` unset); `sg-mailbox` fills them
/// in when it fuses a sender half with a receiver half.
pub struct CommData {
    /// Which half this is.
    pub direction: Direction,
    /// Source host (sender side).
    pub src_host: Option<HostId>,
    /// Destination host (receiver side).
    pub dst_host: Option<HostId>,
    /// Links traversed, set once the peer is known and routing has run.
    pub route: Vec<LinkId>,
    /// Whether the engine has already computed `route`/`latency_remaining`
    /// for this Comm. Distinguishes "not yet routed" from "routed to a
    /// same-host, zero-link path", both of which leave `route` empty.
    pub routed: bool,
    /// Total bytes to move.
    pub size: f64,
    /// Bytes not yet transferred.
    pub remaining: f64,
    /// Seconds of the route's leading latency not yet elapsed (spec.md §4.3).
    pub latency_remaining: f64,
    /// Personal rate cap in bytes/s.
    pub bound: f64,
    /// Max-min priority.
    pub priority: f64,
    /// Move-only user payload, taken by the receiver on completion.
    pub payload: Option<Box<dyn Any>>,
    /// Sender-side buffer address (opaque to the kernel, meaningful to user code).
    pub src_buff: Option<usize>,
    /// Receiver-side buffer address, written into by the fused Comm on completion.
    pub dst_buff: Option<usize>,
    /// The other half of this rendez-vous, once matched.
    pub peer: Option<Index<ActivityTag>>,
    /// Fire-and-forget cleanup, invoked with the payload on cancellation if
    /// this half was `detach`ed (spec.md §4.5 "payload ownership").
    pub on_cleanup: Option<Box<dyn FnOnce(Box<dyn Any>)>>,
}

impl CommData {
    /// A not-yet-matched sender half posted by `put_async`.
    pub fn send(src_host: HostId, size: f64, payload: Box<dyn Any>) -> Self {
        Self {
            direction: Direction::Send,
            src_host: Some(src_host),
            dst_host: None,
            route: Vec::new(),
            routed: false,
            size,
            remaining: size,
            latency_remaining: 0.0,
            bound: f64::INFINITY,
            priority: 1.0,
            payload: Some(payload),
            src_buff: None,
            dst_buff: None,
            peer: None,
            on_cleanup: None,
        }
    }

    /// A not-yet-matched receiver half posted by `get_async`.
    pub fn recv(dst_host: HostId) -> Self {
        Self {
            direction: Direction::Recv,
            src_host: None,
            dst_host: Some(dst_host),
            route: Vec::new(),
            routed: false,
            size: 0.0,
            remaining: 0.0,
            latency_remaining: 0.0,
            bound: f64::INFINITY,
            priority: 1.0,
            payload: None,
            src_buff: None,
            dst_buff: None,
            peer: None,
            on_cleanup: None,
        }
    }

    /// Whether the leading-latency phase has elapsed (spec.md §4.3).
    pub fn in_latency_phase(&self) -> bool {
        self.latency_remaining > crate::EPSILON
    }
}
