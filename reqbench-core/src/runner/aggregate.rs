use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use hdrhistogram::Histogram;

use super::config::Retention;
use super::record::{FailureKind, Outcome, ResultRecord};
use super::summary::{BodySizeSummary, LatencySummary, Summary};

/// Highest latency the streaming histogram tracks (1h in microseconds); larger values saturate.
const HISTOGRAM_MAX_US: u64 = 3_600_000_000;

/// Collects result records from all workers and produces the final summary.
///
/// `consume` may be called concurrently; counters are atomics and the remaining state sits
/// behind a mutex held only for the bookkeeping itself, never across a network call.
#[derive(Debug)]
pub struct Aggregator {
    retention: Retention,
    total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    latency_us: Histogram<u64>,
    status_counts: BTreeMap<u16, u64>,
    failure_kinds: BTreeMap<FailureKind, u64>,
    body: Option<BodySizeSummary>,
    records: Vec<ResultRecord>,
}

impl Aggregator {
    pub fn new(retention: Retention) -> Self {
        // Track 1us..1h with 3 significant figures.
        let latency_us = Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_US, 3)
            .unwrap_or_else(|err| panic!("failed to init histogram: {err}"));

        Self {
            retention,
            total: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                latency_us,
                status_counts: BTreeMap::new(),
                failure_kinds: BTreeMap::new(),
                body: None,
                records: Vec::new(),
            }),
        }
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn consume(&self, record: ResultRecord) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if record.outcome.is_success() {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }

        let us = (record.latency.as_micros().min(u128::from(u64::MAX)) as u64).max(1);

        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        inner.latency_us.saturating_record(us);

        match &record.outcome {
            Outcome::Success { status, body_size } => {
                *inner.status_counts.entry(*status).or_insert(0) += 1;
                inner.body = Some(match inner.body {
                    None => BodySizeSummary {
                        total: *body_size,
                        min: *body_size,
                        max: *body_size,
                        mean: 0.0,
                    },
                    Some(b) => BodySizeSummary {
                        total: b.total.saturating_add(*body_size),
                        min: b.min.min(*body_size),
                        max: b.max.max(*body_size),
                        mean: 0.0,
                    },
                });
            }
            Outcome::Failure { kind, .. } => {
                *inner.failure_kinds.entry(*kind).or_insert(0) += 1;
            }
        }

        if self.retention == Retention::Full {
            inner.records.push(record);
        }
    }

    /// Produces the summary. Call once, after every worker has drained.
    ///
    /// An empty run is valid: counts are zero and undefined statistics are `None`.
    pub fn finalize(
        &self,
        started_at: SystemTime,
        run_duration: Duration,
        interrupted: bool,
    ) -> Summary {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let total_requests = self.total();
        let success_count = self.successes();
        let failure_count = self.failures();

        let mut records = std::mem::take(&mut inner.records);
        records.sort_unstable_by_key(|r| r.sequence);

        let exact_percentiles = self.retention == Retention::Full;
        let latency = if exact_percentiles {
            LatencySummary::exact(records.iter().map(|r| r.latency).collect())
        } else {
            histogram_summary(&inner.latency_us)
        };

        let body = inner.body.map(|b| BodySizeSummary {
            mean: if success_count == 0 {
                0.0
            } else {
                b.total as f64 / success_count as f64
            },
            ..b
        });

        let secs = run_duration.as_secs_f64();
        let throughput = (secs > 0.0).then(|| total_requests as f64 / secs);

        Summary {
            total_requests,
            success_count,
            failure_count,
            status_counts: inner.status_counts.clone(),
            failure_kinds: inner.failure_kinds.clone(),
            latency,
            exact_percentiles,
            body,
            started_at,
            run_duration,
            throughput,
            interrupted,
            records,
        }
    }
}

fn histogram_summary(h: &Histogram<u64>) -> Option<LatencySummary> {
    #[allow(clippy::len_zero)]
    if h.len() == 0 {
        return None;
    }

    let at = |q: f64| Duration::from_micros(h.value_at_quantile(q));

    Some(LatencySummary {
        count: h.len(),
        min: Duration::from_micros(h.min()),
        max: Duration::from_micros(h.max()),
        mean: Duration::from_secs_f64(h.mean() / 1_000_000.0),
        stdev: Duration::from_secs_f64(h.stdev() / 1_000_000.0),
        p50: at(0.50),
        p75: at(0.75),
        p90: at(0.90),
        p95: at(0.95),
        p99: at(0.99),
    })
}
