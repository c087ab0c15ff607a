//! CPU resource model (spec.md §4.3): one constraint per host core-group.
//!
//! Grounded on `dslab-compute::multicore`'s `Compute` actor for the shape of
//! the data (per-host speed, `CoresDependency`-style speedup), generalized
//! from "one event-driven actor owning a fixed core pool" to "a pure
//! per-round constraint bound/weight pair" since the kernel, not this
//! crate, owns activity lifecycle and rate bookkeeping (spec.md §4.4).

use sg_platform::Host;

/// One host's share of a (possibly parallel) Exec's FLOP vector.
#[derive(Debug, Clone, Copy)]
pub struct CpuTouch {
    /// FLOPs this activity wants to burn on this host this round.
    pub flops: f64,
}

/// Bound for the CPU constraint on `host` at `time`: its current pstate
/// speed scaled by any active availability trace entry (spec.md §4.3:
/// "single-core hosts have one constraint of bound `speed · pstate_scale`").
/// Multi-core hosts are modeled as one constraint for their whole
/// core-group, matching `dslab-compute`'s single shared-speed pool rather
/// than per-core constraints, since spec.md §4.3 doesn't ask for per-core
/// partitioning.
pub fn bound(host: &Host, time: f64) -> f64 {
    if !host.is_on() {
        log::debug!("host '{}' is off at t={}, cpu constraint bound is 0", host.name(), time);
        return 0.0;
    }
    host.speed_at(time) * host.core_count() as f64
}

/// Weight contributed by one Exec's per-host touch: the FLOP amount itself
/// (spec.md §4.3: "An Exec variable expands into the CPU constraint with
/// weight = FLOP amount on that host" — a parallel Exec with a bigger share
/// on one host draws proportionally more of that host's constraint).
pub fn weight(touch: &CpuTouch) -> f64 {
    touch.flops
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_platform::{PlatformGraph, RoutingMethod};

    #[test]
    fn bound_scales_with_core_count() {
        let mut graph = PlatformGraph::new("root", RoutingMethod::Full);
        let root = graph.root();
        let h = graph.add_host("h", root, 1e9, 4).unwrap();
        assert_eq!(bound(graph.host(h), 0.0), 4e9);
    }

    #[test]
    fn bound_is_zero_when_off() {
        let mut graph = PlatformGraph::new("root", RoutingMethod::Full);
        let root = graph.root();
        let h = graph.add_host("h", root, 1e9, 1).unwrap();
        graph.set_host_power(h, false);
        assert_eq!(bound(graph.host(h), 0.0), 0.0);
    }
}
