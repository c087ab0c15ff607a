//! The public facade (spec.md §4.8, component C8): re-exports the typed
//! handles every other crate in the workspace defines, plus the engine main
//! loop (spec.md §4.7) and the plugin-hook mechanism (spec.md §4.8) that are
//! native to this crate.
//!
//! Grounded on `dslab-core`'s top-level `lib.rs`, which re-exports its
//! subsystem crates' public types behind one facade instead of asking
//! callers to depend on `dslab-network`/`dslab-compute`/`dslab-storage`
//! directly — the same shape, generalized to this workspace's
//! platform/solver/kernel/mailbox/actor split.

#![warn(missing_docs)]

pub mod engine;
pub mod plugin;

pub use engine::{Blocked, Engine, EngineError, EngineReport};
pub use plugin::{ActivityCompletion, CpuUtilization, PowerChange, Signal};

pub use sg_actors::{Actor, ActorBuilder, ActorContext, ActorId, ActorState, Barrier, Condvar, Killed, Mutex, Semaphore};
pub use sg_engine::Config;
pub use sg_kernel::activity::{ActivityId, ActivityKind, ActivityState};
pub use sg_kernel::comm::Direction;
pub use sg_kernel::exec::ExecData;
pub use sg_kernel::io::IoOp;
pub use sg_kernel::{ActivitySet, FailureKind, Outcome};
pub use sg_mailbox::{Mailbox, MailboxId, MailboxRegistry};
pub use sg_platform::{
    Disk, DiskId, Host, HostId, Link, LinkId, PlatformError, PlatformGraph, Pstate, Route, RoutingMethod, SharingPolicy, TraceEntry,
    VirtualMachine, VmId, Zone, ZoneElement, ZoneId,
};
pub use sg_solver::{Constraint, Variable, VariableId};
