//! Platform construction and lookup errors.

use std::fmt;

/// Errors raised while building or querying the platform graph.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformError {
    /// No host, link, disk or zone is registered under this name.
    UnknownName(String),
    /// A disk was attached to a host that does not exist.
    UnknownHost(String),
    /// The zone was already sealed; topology mutation is no longer allowed.
    ZoneSealed(String),
    /// No route exists between the two endpoints (disjoint zones, or a link is off).
    NoRoute { src: String, dst: String },
    /// A `cluster-fat-tree`/`cluster-dragonfly` zone was requested; the algebraic
    /// radical-notation grammar for these is not specified closely enough to
    /// implement without guessing (see DESIGN.md Open Questions).
    UnsupportedTopology(&'static str),
    /// A platform invariant was violated (e.g. non-positive speed/bandwidth).
    InvalidValue(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::UnknownName(name) => write!(f, "no platform element named '{}'", name),
            PlatformError::UnknownHost(name) => write!(f, "unknown host '{}'", name),
            PlatformError::ZoneSealed(name) => write!(f, "zone '{}' is sealed, cannot mutate topology", name),
            PlatformError::NoRoute { src, dst } => write!(f, "no route from '{}' to '{}'", src, dst),
            PlatformError::UnsupportedTopology(kind) => write!(f, "unsupported cluster topology: {}", kind),
            PlatformError::InvalidValue(msg) => write!(f, "invalid platform value: {}", msg),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Convenience alias for fallible platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
