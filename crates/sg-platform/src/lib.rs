//! Platform graph (spec.md §4.1, component C1): hosts, links, disks, VMs and
//! recursive routing zones, consumed by `sg-resources` and `sg-kernel`.
//!
//! This crate does not parse platform description files (spec.md §1 keeps
//! XML loading out of scope); platforms are built programmatically via
//! [`PlatformGraph`]'s `add_*` methods, which is the "equivalent programmatic
//! builder API" spec.md §6 requires to exist alongside the (external) XML
//! grammar.

pub mod disk;
pub mod error;
pub mod graph;
pub mod host;
pub mod link;
pub mod routing;
pub mod vm;
pub mod zone;

pub use disk::{Disk, DiskId};
pub use error::{PlatformError, Result};
pub use graph::{PlatformGraph, Route};
pub use host::{Host, HostId, Pstate, TraceEntry};
pub use link::{Link, LinkId, SharingPolicy};
pub use routing::RoutingMethod;
pub use vm::{VirtualMachine, VmId};
pub use zone::{Zone, ZoneElement, ZoneId};
