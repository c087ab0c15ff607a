//! Network resource model (spec.md §4.3): one constraint per [`Link`].
//!
//! Grounded on `dslab-network::topology_model`'s per-link constraint
//! expansion (each transfer contributes weight `1` to every link on its
//! route), generalized to carry a Comm's leading latency and the
//! cross-traffic toggle spec.md §4.3 calls for.

use sg_platform::{Link, Route};

/// A Comm's touch of the network: the route it travels and whatever's left
/// of its leading latency.
#[derive(Debug, Clone)]
pub struct NetworkTouch<'a> {
    /// Links the Comm's route crosses, in order.
    pub route: &'a [sg_platform::LinkId],
    /// Seconds of the route's accumulated latency not yet elapsed. While
    /// this is positive the Comm consumes no bandwidth (spec.md §4.3: "a
    /// Comm incurs a leading `latency` seconds during which it consumes no
    /// bandwidth").
    pub latency_remaining: f64,
}

/// Whether a Comm is still in its latency phase and should not yet be
/// registered against any link's bandwidth constraint.
pub fn in_latency_phase(touch: &NetworkTouch) -> bool {
    touch.latency_remaining > 0.0
}

/// Constraint bound for `link`: its bandwidth if on, `0.0` if off (an off
/// link fails every Comm routed through it instead of silently stalling,
/// spec.md §7 NetworkFailure — the kernel checks `is_on` directly rather
/// than relying on a zero-bandwidth stall).
pub fn bound(link: &Link) -> f64 {
    if !link.is_on() {
        log::debug!("link '{}' is off, bandwidth constraint bound is 0", link.name());
        return 0.0;
    }
    link.bandwidth()
}

/// Weight contributed by one Comm on one link of its route.
///
/// Default weight is `1.0` (spec.md §4.3: "a Comm variable expands into
/// every constraint on its route with weight = 1 by default"). The
/// cross-traffic toggle (spec.md §6 `network/crosstraffic`) adds a small
/// reverse-direction expansion to reproduce TCP ACK interference; that
/// reverse touch is a second, smaller-weight membership on the same
/// constraints and is assembled by the caller, not by this function.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Default cross-traffic weight applied to the reverse-direction ACK touch
/// when `network/crosstraffic` is enabled (spec.md §6), grounded on
/// `dslab-network`'s TCP-gamma-style correction factor.
pub const CROSSTRAFFIC_WEIGHT: f64 = 0.05;

/// Applies the size-dependent latency/bandwidth factor callbacks (spec.md
/// §4.3) to a route's nominal latency and a link's nominal bandwidth.
/// Default factors are the identity; a platform-level override can be
/// supplied to the resource family when more fidelity is needed.
pub fn effective_latency(route: &Route, latency_factor: impl Fn(f64, f64) -> f64, size: f64) -> f64 {
    latency_factor(route.latency, size)
}
