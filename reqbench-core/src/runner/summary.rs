use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use super::record::{FailureKind, ResultRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub stdev: Duration,
    pub p50: Duration,
    pub p75: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl LatencySummary {
    /// Exact nearest-rank percentiles over the given latencies.
    pub(crate) fn exact(mut latencies: Vec<Duration>) -> Option<Self> {
        if latencies.is_empty() {
            return None;
        }
        latencies.sort_unstable();

        let n = latencies.len();
        let rank = |q: f64| -> Duration {
            let idx = ((q * n as f64).ceil() as usize).clamp(1, n) - 1;
            latencies[idx]
        };

        let secs: Vec<f64> = latencies.iter().map(Duration::as_secs_f64).collect();
        let mean = secs.iter().sum::<f64>() / n as f64;
        let variance = secs.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;

        Some(Self {
            count: n as u64,
            min: latencies[0],
            max: latencies[n - 1],
            mean: Duration::from_secs_f64(mean),
            stdev: Duration::from_secs_f64(variance.sqrt()),
            p50: rank(0.50),
            p75: rank(0.75),
            p90: rank(0.90),
            p95: rank(0.95),
            p99: rank(0.99),
        })
    }
}

/// Response body sizes over successful requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySizeSummary {
    pub total: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// Final statistics of one run.
///
/// Statistics that are undefined for an empty run (`latency`, `body`, `throughput`) are
/// `None` rather than zero.
#[derive(Debug, Clone)]
pub struct Summary {
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub status_counts: BTreeMap<u16, u64>,
    pub failure_kinds: BTreeMap<FailureKind, u64>,
    pub latency: Option<LatencySummary>,
    /// `true` when percentiles were computed from every latency, `false` when they come
    /// from the streaming histogram (<= 0.1% relative error).
    pub exact_percentiles: bool,
    pub body: Option<BodySizeSummary>,
    pub started_at: SystemTime,
    pub run_duration: Duration,
    /// Completed requests per second of wall-clock run time.
    pub throughput: Option<f64>,
    /// The run was stopped early through a `StopHandle`.
    pub interrupted: bool,
    /// Every record in sequence order; empty unless full retention was requested.
    pub records: Vec<ResultRecord>,
}

impl Summary {
    pub fn status_count(&self, status: u16) -> u64 {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    pub fn failure_kind_count(&self, kind: FailureKind) -> u64 {
        self.failure_kinds.get(&kind).copied().unwrap_or(0)
    }
}
