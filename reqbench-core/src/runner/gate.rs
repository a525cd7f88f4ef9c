use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use super::config::StopCondition;

/// Counters shared by every worker for the duration of one run.
#[derive(Debug)]
pub struct RunState {
    issued: AtomicU64,
    completed: AtomicU64,
    stop_requested: AtomicBool,
    started: OnceLock<Instant>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            stop_requested: AtomicBool::new(false),
            started: OnceLock::new(),
        }
    }

    pub fn started_at(started: Instant) -> Self {
        let state = Self::new();
        state.start_at(started);
        state
    }

    /// Sets the run start clock. Only the first call has an effect.
    pub fn start_at(&self, started: Instant) {
        let _ = self.started.set(started);
    }

    /// Time since the run started; zero before it has.
    pub fn elapsed(&self) -> Duration {
        self.started
            .get()
            .map_or(Duration::ZERO, |started| started.elapsed())
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn in_flight(&self) -> u64 {
        self.issued().saturating_sub(self.completed())
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Assigns the next 1-based sequence index. Called once per finished request.
    pub fn complete(&self) -> u64 {
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Grants workers the right to send one more request.
#[derive(Debug, Clone)]
pub struct PermitGate {
    stop: StopCondition,
    state: Arc<RunState>,
}

impl PermitGate {
    pub fn new(stop: StopCondition, state: Arc<RunState>) -> Self {
        Self { stop, state }
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    /// Returns the 0-based issue index of the granted request, or `None` once the run
    /// stops issuing work.
    ///
    /// Under `ByCount(n)` the bound check and the increment are a single atomic step, so
    /// exactly `n` permits are granted no matter how many workers race.
    pub fn claim(&self) -> Option<u64> {
        if self.state.stop_requested() {
            return None;
        }

        match self.stop {
            StopCondition::ByCount(total) => self
                .state
                .issued
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                    (cur < total).then_some(cur + 1)
                })
                .ok(),
            StopCondition::ByDuration(duration) => {
                if self.state.elapsed() >= duration {
                    return None;
                }
                Some(self.state.issued.fetch_add(1, Ordering::AcqRel))
            }
        }
    }
}

/// Requests an early, graceful stop: no new permits, in-flight requests still finish.
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<RunState>,
}

impl StopHandle {
    pub(crate) fn new(state: Arc<RunState>) -> Self {
        Self { state }
    }

    pub fn stop(&self) {
        if !self.state.stop_requested() {
            tracing::info!(
                in_flight = self.state.in_flight(),
                "stop requested; draining in-flight requests"
            );
        }
        self.state.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stop_requested()
    }
}
