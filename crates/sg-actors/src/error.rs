//! Actor-level signal propagated through every suspension point (spec.md §9
//! design note: "model kill as a sentinel return status propagated by every
//! suspension point; the actor body runs an implicit `?`-style early return
//! at each await" — rather than a C++-style stack unwind).

use std::fmt;

/// Returned by every [`crate::context::ActorContext`] suspension method once
/// the actor has been marked for termination (spec.md §4.6 `kill`). User
/// code propagates it with `?`; the fiber wrapper that owns the entry
/// function catches it and runs on-exit callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Killed;

impl fmt::Display for Killed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor was killed")
    }
}

impl std::error::Error for Killed {}
