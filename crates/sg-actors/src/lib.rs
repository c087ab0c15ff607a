//! Actor runtime (spec.md §4.6, component C6): cooperatively scheduled
//! fibers with private stacks, built on `sg-engine`'s `Task`/`Executor`
//! channel-based scheduling substrate and `sg-kernel`'s activity kernel.
//!
//! This crate does not own the virtual clock or the scheduling round
//! itself (drain ready actors, invoke the solver, advance the clock,
//! process completions) — that main loop lives in the `sg` crate's engine,
//! which drives [`Scheduler::drain_ready`] once per round and reacts to
//! [`Actor`] state for termination/deadlock detection.

pub mod actor;
pub mod builder;
pub mod context;
pub mod error;
pub mod scheduler;
pub mod sync;

pub use actor::{Actor, ActorId, ActorState, DEFAULT_STACK_SIZE};
pub use builder::ActorBuilder;
pub use context::ActorContext;
pub use error::Killed;
pub use scheduler::Scheduler;
pub use sync::{Barrier, Condvar, Mutex, Semaphore};
