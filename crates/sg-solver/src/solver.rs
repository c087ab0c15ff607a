//! Max-min fair iterative-saturation solver (spec.md §4.2).
//!
//! Generalizes `dslab-network::topology_model::TopologyNetwork::calculate_transfers`
//! (which freezes transfers through the currently-thinnest link, one link at
//! a time) from "links only, unit weight" to "any constraint family, any
//! weight, with per-variable priority and personal rate bound". The core
//! move is the same: repeatedly find the single most binding constraint,
//! freeze every variable it still holds at the rate that constraint allows,
//! and subtract their contribution from every other constraint they touch.

use crate::constraint::Constraint;
use crate::variable::Variable;
use sg_platform::SharingPolicy;

/// Absolute tolerance for "capacity is exhausted" / "rate is negligible"
/// comparisons (spec.md §4.2, default `1e-9`).
pub const EPSILON: f64 = 1e-9;

/// Computed instantaneous rate for each variable, in the same order as the
/// `variables` slice passed to [`solve`].
pub type Rates = Vec<f64>;

/// Runs one round of max-min fair sharing over `variables` against
/// `constraints`, returning each variable's instantaneous rate.
///
/// Variables with no constraint membership at all and no personal bound are
/// given rate `0.0` — the caller (a resource model) should never construct
/// one, since an unconstrained, unbounded activity has no physical meaning.
pub fn solve(variables: &[Variable], constraints: &[Constraint]) -> Rates {
    log::trace!("solving {} variables against {} constraints", variables.len(), constraints.len());
    let n = variables.len();
    let mut rate = vec![0.0; n];
    let mut frozen = vec![false; n];
    let mut remaining: Vec<f64> = constraints.iter().map(|c| c.bound).collect();
    let mut constraint_done = vec![false; constraints.len()];
    let mut frozen_count = 0usize;

    // Mark constraints with no capacity, or degenerate (no members), done up front.
    for (ci, c) in constraints.iter().enumerate() {
        if c.bound <= EPSILON || c.members.is_empty() {
            constraint_done[ci] = true;
        }
    }

    while frozen_count < n {
        // Candidate 1: each variable's personal bound, read as a one-member
        // constraint of capacity `bound(v)` and weight `1` — this is exactly
        // the "rate bound cap" of spec.md §4.2, folded into the same
        // saturation loop instead of special-cased before it.
        let mut best_variable: Option<(usize, f64)> = None;
        for (vi, v) in variables.iter().enumerate() {
            if frozen[vi] || !v.bound.is_finite() {
                continue;
            }
            let personal_s = v.bound * v.priority;
            if best_variable.map_or(true, |(_, s)| personal_s < s) {
                best_variable = Some((vi, personal_s));
            }
        }

        // Candidate 2: each unsaturated constraint's per-share capacity.
        let mut best_constraint: Option<(usize, f64)> = None;
        for (ci, c) in constraints.iter().enumerate() {
            if constraint_done[ci] {
                continue;
            }
            let unsat: Vec<&(usize, f64)> = c
                .members
                .iter()
                .filter(|(v, _)| !frozen[*v])
                .collect();
            if unsat.is_empty() {
                constraint_done[ci] = true;
                continue;
            }
            let s = match c.policy {
                SharingPolicy::Fatpipe => unsat
                    .iter()
                    .map(|(v, _)| variables[*v].bound)
                    .fold(f64::INFINITY, f64::min),
                SharingPolicy::Shared | SharingPolicy::Wifi => {
                    let denom: f64 = unsat.iter().map(|(v, w)| w / variables[*v].priority).sum();
                    if denom <= EPSILON {
                        f64::INFINITY
                    } else {
                        remaining[ci] / denom
                    }
                }
            };
            if best_constraint.map_or(true, |(_, bs)| s < bs) {
                best_constraint = Some((ci, s));
            }
        }

        let s_star = match (best_variable, best_constraint) {
            (Some((_, vs)), Some((_, cs))) => vs.min(cs),
            (Some((_, vs)), None) => vs,
            (None, Some((_, cs))) => cs,
            (None, None) => break, // no unsaturated variables left with any bound or constraint
        };

        let mut newly_frozen = Vec::new();

        // Freeze every variable whose personal bound is the bottleneck this round.
        if let Some((vi, vs)) = best_variable {
            if vs <= s_star + EPSILON {
                frozen[vi] = true;
                rate[vi] = variables[vi].bound;
                newly_frozen.push(vi);
            }
        }

        // Freeze every unsaturated member of the constraint(s) achieving s*.
        for (ci, c) in constraints.iter().enumerate() {
            if constraint_done[ci] {
                continue;
            }
            let cs = match best_constraint {
                Some((bci, bs)) if bci == ci => bs,
                _ => continue,
            };
            if cs > s_star + EPSILON {
                continue;
            }
            for &(vi, _) in &c.members {
                if frozen[vi] {
                    continue;
                }
                match c.policy {
                    SharingPolicy::Fatpipe => {
                        // s(c) for a fatpipe is min_v bound(v): only the
                        // member(s) achieving that minimum are pinned this
                        // round, at their own bound — the others stay in
                        // the pool uncoupled, per spec.md §4.2.
                        if variables[vi].bound <= s_star + EPSILON {
                            rate[vi] = variables[vi].bound;
                            frozen[vi] = true;
                            newly_frozen.push(vi);
                        }
                    }
                    SharingPolicy::Shared | SharingPolicy::Wifi => {
                        // s* <= personal_s(vi) = bound(vi)*priority(vi) by
                        // construction of best_variable, so this is always <= bound(vi).
                        rate[vi] = (s_star / variables[vi].priority).min(variables[vi].bound);
                        frozen[vi] = true;
                        newly_frozen.push(vi);
                    }
                }
            }
        }

        if newly_frozen.is_empty() {
            // All remaining constraints/variables are mutually exhausted;
            // nothing more can be frozen productively this round.
            break;
        }

        // Subtract the newly frozen variables' contribution from every
        // constraint they touch, and mark exhausted constraints done.
        for (ci, c) in constraints.iter().enumerate() {
            if constraint_done[ci] {
                continue;
            }
            let mut still_unsat = false;
            for &(vi, w) in &c.members {
                if frozen[vi] {
                    if newly_frozen.contains(&vi) && matches!(c.policy, SharingPolicy::Shared | SharingPolicy::Wifi) {
                        remaining[ci] -= rate[vi] * w;
                    }
                } else {
                    still_unsat = true;
                }
            }
            if !still_unsat || remaining[ci] <= EPSILON {
                constraint_done[ci] = true;
            }
        }

        frozen_count += newly_frozen.len();
    }

    rate
}
