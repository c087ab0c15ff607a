//! Hosts and performance states.

use std::collections::HashMap;

use crate::error::{PlatformError, Result};

/// Dense identifier of a [`Host`] within a [`crate::PlatformGraph`].
pub type HostId = usize;

/// A single performance state: peak speed in FLOP/s at that pstate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pstate {
    /// Peak FLOP/s delivered by one core while this pstate is active.
    pub speed: f64,
}

/// One piecewise-constant entry of a host's availability trace.
///
/// `scale` multiplies the host's nominal speed for `[start, start + duration)`;
/// a value of `0.0` models the host being fully stolen by an external load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceEntry {
    /// Start time of this entry, relative to simulation start.
    pub start: f64,
    /// Duration this entry is active for.
    pub duration: f64,
    /// Speed scale factor applied during this entry.
    pub scale: f64,
}

/// A compute node: a speed curve, a core count, and on/off state.
///
/// Corresponds to spec.md §3 `Host`. Invariant: `speed > 0` whenever the
/// host is on (enforced at construction and at every pstate switch).
#[derive(Debug, Clone)]
pub struct Host {
    id: HostId,
    name: String,
    pstates: Vec<Pstate>,
    pstate_index: usize,
    core_count: u32,
    coordinates: Option<(f64, f64)>,
    height: f64,
    trace: Vec<TraceEntry>,
    on: bool,
    properties: HashMap<String, String>,
    disks: Vec<crate::disk::DiskId>,
}

impl Host {
    pub(crate) fn new(id: HostId, name: impl Into<String>, speed: f64, core_count: u32) -> Result<Self> {
        if speed <= 0.0 {
            return Err(PlatformError::InvalidValue(format!(
                "host speed must be > 0, got {}",
                speed
            )));
        }
        if core_count == 0 {
            return Err(PlatformError::InvalidValue("host core_count must be >= 1".into()));
        }
        Ok(Self {
            id,
            name: name.into(),
            pstates: vec![Pstate { speed }],
            pstate_index: 0,
            core_count,
            coordinates: None,
            height: 0.0,
            trace: Vec::new(),
            on: true,
            properties: HashMap::new(),
            disks: Vec::new(),
        })
    }

    /// Host identifier.
    pub fn id(&self) -> HostId {
        self.id
    }

    /// Host name, as given to the platform builder.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of cores available on this host.
    pub fn core_count(&self) -> u32 {
        self.core_count
    }

    /// Peak speed (FLOP/s per core) at the current pstate, ignoring availability traces.
    pub fn peak_speed(&self) -> f64 {
        self.pstates[self.pstate_index].speed
    }

    /// Effective speed (FLOP/s per core) at `time`, accounting for the active trace
    /// entry if any. Returns `0.0` if the host is off.
    pub fn speed_at(&self, time: f64) -> f64 {
        if !self.on {
            return 0.0;
        }
        let scale = self
            .trace
            .iter()
            .find(|e| time >= e.start && time < e.start + e.duration)
            .map(|e| e.scale)
            .unwrap_or(1.0);
        self.peak_speed() * scale
    }

    /// Adds an additional pstate; does not change the currently active one.
    pub fn add_pstate(&mut self, speed: f64) -> Result<usize> {
        if speed <= 0.0 {
            return Err(PlatformError::InvalidValue("pstate speed must be > 0".into()));
        }
        self.pstates.push(Pstate { speed });
        Ok(self.pstates.len() - 1)
    }

    /// Number of pstates defined for this host.
    pub fn pstate_count(&self) -> usize {
        self.pstates.len()
    }

    /// Index of the currently active pstate.
    pub fn pstate(&self) -> usize {
        self.pstate_index
    }

    /// Switches the active pstate. Panics (AssertionFailure, spec.md §7) on an out-of-range index.
    pub fn set_pstate(&mut self, index: usize) {
        assert!(index < self.pstates.len(), "pstate index {} out of range", index);
        self.pstate_index = index;
    }

    /// Appends a piecewise-constant availability trace entry.
    pub fn add_trace_entry(&mut self, entry: TraceEntry) {
        self.trace.push(entry);
    }

    /// Whether the host is currently powered on.
    pub fn is_on(&self) -> bool {
        self.on
    }

    pub(crate) fn set_on(&mut self, on: bool) {
        self.on = on;
    }

    /// Sets a vivaldi-style coordinate used by `vivaldi` zone routing.
    pub fn set_coordinates(&mut self, x: f64, y: f64) {
        self.coordinates = Some((x, y));
    }

    /// Returns the vivaldi coordinate, if any was set.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.coordinates
    }

    /// Sets the per-node height term added to vivaldi latency estimates
    /// (spec.md §3 Zone "vivaldi": "Euclidean distance in a stored coordinate
    /// plus a per-node height term").
    pub fn set_height(&mut self, height: f64) {
        self.height = height;
    }

    /// The per-node height term, `0.0` if never set.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Sets a pinned property (spec.md §3 "pinned properties map").
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Reads a pinned property. Supplemental feature grounded on
    /// `original_source/platform-properties.c` (see SPEC_FULL.md).
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub(crate) fn attach_disk(&mut self, disk: crate::disk::DiskId) {
        self.disks.push(disk);
    }

    /// Disks attached to this host.
    pub fn disks(&self) -> &[crate::disk::DiskId] {
        &self.disks
    }
}
