//! Sleep activities: elapsing a fixed virtual-time duration (spec.md §3 `Sleep`).

/// A Sleep activity. Carries no solver variable; the engine completes it
/// directly once `clock >= start_time + duration`.
#[derive(Debug, Clone, Copy)]
pub struct SleepData {
    /// Total duration to elapse.
    pub duration: f64,
    /// Time remaining, decremented by `Δt` each scheduling round.
    pub remaining: f64,
}

impl SleepData {
    /// A new Sleep of `duration` seconds.
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            remaining: duration,
        }
    }
}
