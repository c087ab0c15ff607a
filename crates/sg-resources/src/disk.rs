//! Disk resource model (spec.md §4.3): two independent constraints (read,
//! write) plus one joint constraint limiting their aggregate.
//!
//! Grounded on `dslab-storage::shared_disk`'s three-constraint shape
//! (independent read/write budgets plus a combined cap), generalized from
//! its event-driven `DataReadCompleted`/`DataWriteCompleted` dispatch to the
//! pure per-round bound/weight pairs spec.md §4.3 asks resource models for.

use sg_platform::Disk;

/// Which side of a Disk's two independent budgets an Io activity draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    /// Reading from the disk.
    Read,
    /// Writing to the disk.
    Write,
}

/// Bound of the read or write constraint, per `direction`.
pub fn bound(disk: &Disk, direction: IoDirection) -> f64 {
    match direction {
        IoDirection::Read => disk.read_bandwidth(),
        IoDirection::Write => disk.write_bandwidth(),
    }
}

/// Bound of the joint aggregate constraint (spec.md §3 Disk: "one joint
/// constraint limiting aggregate"). Matches `dslab-storage`'s convention of
/// capping combined throughput at the read peak, since platforms rarely
/// specify a distinct joint figure.
pub fn aggregate_bound(disk: &Disk) -> f64 {
    disk.read_bandwidth().max(disk.write_bandwidth())
}

/// Weight contributed by one Io activity: its declared transfer size acts
/// as the per-byte draw, mirroring the network model's "weight = bytes" choice.
pub const WEIGHT: f64 = 1.0;
