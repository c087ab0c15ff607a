//! Shared constraint-key bookkeeping used when assembling one scheduling
//! round's solver input (spec.md §4.2/§4.3).
//!
//! Each resource family (`cpu`, `network`, `disk`) only knows how to turn
//! one activity's touch of a resource into a `(key, weight)` pair and how to
//! read that resource's current bound off the platform graph; the kernel
//! drives a single [`ConstraintBook`] across all three families so that two
//! activities sharing the same host/link/disk land on the same
//! [`sg_solver::Constraint`] instead of each getting their own.

use std::collections::HashMap;

use sg_platform::{DiskId, HostId, LinkId};

/// Identifies one of the constraints spec.md §4.3 says each resource family
/// owns: a host's core-group, a link, or one of a disk's three budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKey {
    /// A host's CPU core-group (spec.md §4.3 CPU model).
    Cpu(HostId),
    /// A network link (spec.md §4.3 network model).
    Link(LinkId),
    /// A disk's read budget.
    DiskRead(DiskId),
    /// A disk's write budget.
    DiskWrite(DiskId),
    /// A disk's joint read+write budget.
    DiskAggregate(DiskId),
}

/// Accumulates [`sg_solver::Constraint`]s across however many activities are
/// active this round, assigning each distinct [`ConstraintKey`] a stable
/// [`sg_solver::ConstraintId`] the first time it's touched and merging
/// `(variable, weight)` members in as each activity's resource touches are
/// registered.
#[derive(Default)]
pub struct ConstraintBook {
    index: HashMap<ConstraintKey, usize>,
    constraints: Vec<sg_solver::Constraint>,
}

impl ConstraintBook {
    /// An empty book, ready for one scheduling round.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the solver-local id for `key`, creating its constraint via
    /// `make` the first time this round that `key` is touched.
    pub fn constraint_id(&mut self, key: ConstraintKey, make: impl FnOnce() -> sg_solver::Constraint) -> sg_solver::ConstraintId {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.constraints.len();
        self.constraints.push(make());
        self.index.insert(key, id);
        id
    }

    /// Registers `variable` as a member of `key`'s constraint with `weight`,
    /// creating the constraint via `make` if this is the first touch.
    pub fn add_member(
        &mut self,
        key: ConstraintKey,
        variable: sg_solver::VariableId,
        weight: f64,
        make: impl FnOnce() -> sg_solver::Constraint,
    ) {
        let id = self.constraint_id(key, make);
        self.constraints[id].add_member(variable, weight);
    }

    /// The id already assigned to `key`, if it has been touched this round.
    pub fn existing_id(&self, key: ConstraintKey) -> Option<sg_solver::ConstraintId> {
        self.index.get(&key).copied()
    }

    /// Consumes the book, returning the assembled constraint list in id order.
    pub fn into_constraints(self) -> Vec<sg_solver::Constraint> {
        self.constraints
    }
}
