//! Max-min fair resource sharing solver (spec.md §4.2, component C2).
//!
//! Stateless by design: `sg-kernel` rebuilds [`Variable`]/[`Constraint`]
//! lists from its live activities each scheduling round and calls [`solve`]
//! once; nothing here is kept between rounds.

pub mod constraint;
pub mod solver;
pub mod variable;

pub use constraint::{Constraint, ConstraintId};
pub use solver::{solve, Rates, EPSILON};
pub use variable::{Variable, VariableId};
