use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};

/// When a run stops issuing new requests. Exactly one rule is active per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    ByCount(u64),
    ByDuration(Duration),
}

impl Default for StopCondition {
    fn default() -> Self {
        Self::ByCount(1)
    }
}

impl StopCondition {
    /// Resolves the mutually exclusive `limit`/`duration` options.
    ///
    /// With neither set the run sends a single request.
    pub fn from_limits(limit: Option<u64>, duration: Option<Duration>) -> Result<Self> {
        let stop = match (limit, duration) {
            (Some(_), Some(_)) => return Err(Error::ConflictingStopConditions),
            (Some(n), None) => Self::ByCount(n),
            (None, Some(d)) => Self::ByDuration(d),
            (None, None) => Self::default(),
        };
        stop.validate()?;
        Ok(stop)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::ByCount(0) => Err(Error::InvalidLimit),
            Self::ByDuration(d) if d.is_zero() => Err(Error::InvalidDuration),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Retention {
    /// Running statistics plus a latency histogram; memory does not grow with the run.
    #[default]
    Streaming,
    /// Every result record is kept, including raw response headers and body.
    Full,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub concurrency: u64,
    pub stop: StopCondition,
    pub retention: Retention,
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub progress_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            stop: StopCondition::default(),
            retention: Retention::default(),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            progress_interval: Duration::from_secs(1),
        }
    }
}

impl RunConfig {
    pub fn new(concurrency: u64, stop: StopCondition) -> Self {
        Self {
            concurrency,
            stop,
            ..Self::default()
        }
    }

    /// Workers actually spawned. A count limit caps it: workers beyond `n` could never
    /// claim a permit.
    pub fn worker_count(&self) -> u64 {
        match self.stop {
            StopCondition::ByCount(n) => self.concurrency.min(n),
            StopCondition::ByDuration(_) => self.concurrency,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConcurrency);
        }
        self.stop.validate()?;
        if self.request_timeout.is_some_and(|t| t.is_zero())
            || self.connect_timeout.is_some_and(|t| t.is_zero())
            || self.progress_interval.is_zero()
        {
            return Err(Error::InvalidTimeout);
        }
        Ok(())
    }
}
