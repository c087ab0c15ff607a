//! Resource models (spec.md §4.3, component C3): per-family glue between
//! live activities and the [`sg_solver`] constraints they draw on.
//!
//! Three families — [`cpu`], [`network`], [`disk`] — each expand one
//! activity's touch of a resource into a `(ConstraintKey, weight)` pair and
//! read the resource's current bound off the [`sg_platform::PlatformGraph`].
//! [`model::ConstraintBook`] is the shared accumulator the kernel drives
//! across all three families while assembling one scheduling round's
//! [`sg_solver::solve`] input.

pub mod cpu;
pub mod disk;
pub mod model;
pub mod network;

pub use model::{ConstraintBook, ConstraintKey};
