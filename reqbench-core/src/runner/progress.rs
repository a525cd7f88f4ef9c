use std::time::Duration;

use super::config::StopCondition;

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub elapsed: Duration,
    /// Wall-clock time covered by this update.
    pub interval: Duration,
    pub stop: StopCondition,
    pub issued: u64,
    pub completed: u64,
    pub failures: u64,
    /// Completed requests/sec observed during the last interval.
    pub rps_now: f64,
}

impl ProgressUpdate {
    pub fn in_flight(&self) -> u64 {
        self.issued.saturating_sub(self.completed)
    }
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
