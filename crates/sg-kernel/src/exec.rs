//! Exec activities: burning FLOPs on one or more hosts (spec.md §3 `Exec`,
//! §4.4 "Parallel Exec").

use sg_platform::HostId;

/// A (possibly parallel) compute activity.
///
/// A plain, single-host Exec is the `hosts.len() == 1` case; a parallel
/// Exec spans `hosts.len() > 1` hosts, each with its own remaining FLOP
/// entry, plus an optional inter-host byte matrix that keeps the hosts'
/// completion coupled through network constraints (spec.md §4.4: "Completion
/// is joint: the Exec finishes when all flop vector entries reach zero").
#[derive(Debug, Clone)]
pub struct ExecData {
    /// Hosts this Exec runs on, in the same order as `remaining_flops`.
    pub hosts: Vec<HostId>,
    /// Remaining FLOPs per host; mutated in place each scheduling round.
    pub remaining_flops: Vec<f64>,
    /// FLOPs per host at creation time, fixed for the activity's lifetime.
    /// The engine uses this (not `remaining_flops`) as the per-host CPU
    /// constraint weight, so a parallel Exec's hosts drain in lockstep
    /// (each host's remaining share shrinks by the same fraction every
    /// round) rather than drifting apart as faster hosts race ahead.
    pub initial_flops: Vec<f64>,
    /// `N x N` bytes to move between each pair of hosts this round, for
    /// parallel Execs that also communicate. `None` for a plain Exec.
    pub comm_matrix: Option<Vec<Vec<f64>>>,
    /// Personal rate cap in FLOP/s, `f64::INFINITY` if unbounded.
    pub bound: f64,
    /// Max-min priority.
    pub priority: f64,
}

impl ExecData {
    /// A single-host Exec of `cost` FLOP.
    pub fn single(host: HostId, cost: f64) -> Self {
        Self {
            hosts: vec![host],
            remaining_flops: vec![cost],
            initial_flops: vec![cost],
            comm_matrix: None,
            bound: f64::INFINITY,
            priority: 1.0,
        }
    }

    /// A parallel Exec spanning `hosts`, with per-host FLOP vector `flops`
    /// and optional inter-host byte matrix.
    pub fn parallel(hosts: Vec<HostId>, flops: Vec<f64>, comm_matrix: Option<Vec<Vec<f64>>>) -> Self {
        assert_eq!(hosts.len(), flops.len(), "parallel Exec needs one FLOP entry per host");
        Self {
            hosts,
            initial_flops: flops.clone(),
            remaining_flops: flops,
            comm_matrix,
            bound: f64::INFINITY,
            priority: 1.0,
        }
    }

    /// Whether every host's remaining FLOP count has reached zero.
    pub fn is_done(&self, epsilon: f64) -> bool {
        self.remaining_flops.iter().all(|&f| f <= epsilon)
    }

    /// Total remaining FLOPs across all hosts, used as the activity's
    /// common `remaining` field for reporting purposes.
    pub fn total_remaining(&self) -> f64 {
        self.remaining_flops.iter().sum()
    }
}
