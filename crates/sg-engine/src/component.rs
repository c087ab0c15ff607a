//! Identifiers of simulation components.

/// Identifier of a simulation component (host, actor, disk, mailbox, etc.).
///
/// Components are registered by name via [`SimulationContext`](crate::SimulationContext)
/// and are assigned sequential identifiers starting from 0.
pub type Id = u32;
