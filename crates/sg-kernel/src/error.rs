//! Activity-level error kinds (spec.md §7).

/// Why an activity left the `started`/`starting` state other than by
/// finishing normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A link on the Comm's route went off.
    NetworkFailure,
    /// The host carrying this Exec/Io (or the actor on it) went off.
    HostFailure,
    /// A `wait_for` deadline elapsed before the activity reached a terminal state.
    Timeout,
    /// An Exec was started without a host bound.
    Unassigned,
}

/// How a non-finished activity reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `remaining` reached zero through normal resource consumption.
    Finished,
    /// Terminated abnormally; see [`FailureKind`].
    Failed(FailureKind),
    /// Terminated via an explicit `cancel` call.
    Canceled,
}

impl Outcome {
    /// Whether this outcome represents successful completion.
    pub fn is_finished(&self) -> bool {
        matches!(self, Outcome::Finished)
    }
}
