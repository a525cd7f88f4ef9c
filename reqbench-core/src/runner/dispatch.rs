use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::aggregate::Aggregator;
use super::config::{RunConfig, StopCondition};
use super::gate::{PermitGate, RunState, StopHandle};
use super::progress::{ProgressFn, ProgressUpdate};
use super::summary::Summary;
use super::worker::{WorkerContext, run_worker};
use crate::RequestTemplate;
use crate::error::{Error, Result};
use crate::http::HttpClient;

/// Runs `concurrency` workers against `template` until `stop` is reached.
pub async fn run(
    template: RequestTemplate,
    concurrency: u64,
    stop: StopCondition,
) -> Result<Summary> {
    Dispatcher::new(RunConfig::new(concurrency, stop))?
        .run(template)
        .await
}

/// Owns one run: the worker pool, the stopping rule and the drain.
pub struct Dispatcher {
    config: RunConfig,
    state: Arc<RunState>,
    progress: Option<ProgressFn>,
}

impl Dispatcher {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Arc::new(RunState::new()),
            progress: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// A handle that stops the run early. Requests already in flight still complete and
    /// are part of the summary.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.state.clone())
    }

    pub async fn run(self, template: RequestTemplate) -> Result<Summary> {
        let Self {
            config,
            state,
            progress,
        } = self;

        let template = Arc::new(template);
        let client = HttpClient::new(config.connect_timeout, config.request_timeout);
        let aggregator = Arc::new(Aggregator::new(config.retention));
        let gate = PermitGate::new(config.stop, state.clone());

        tracing::info!(
            method = %template.method(),
            url = template.url(),
            concurrency = config.concurrency,
            workers = config.worker_count(),
            stop = ?config.stop,
            retention = %config.retention,
            "starting run"
        );

        let started_at = SystemTime::now();
        let started = Instant::now();
        state.start_at(started);

        let workers = config.worker_count();
        let mut handles: Vec<JoinHandle<u64>> =
            Vec::with_capacity(usize::try_from(workers).unwrap_or(usize::MAX));
        for worker_id in 1..=workers {
            let ctx = WorkerContext {
                worker_id,
                template: template.clone(),
                client: client.clone(),
                gate: gate.clone(),
                aggregator: aggregator.clone(),
            };
            handles.push(tokio::spawn(run_worker(ctx)));
        }

        let progress_handle = progress.map(|progress| {
            spawn_progress(progress, &config, state.clone(), aggregator.clone())
        });

        // Drain every worker, even if one of them failed, so no request is left running.
        let mut first_error: Option<Error> = None;
        for h in handles {
            if let Err(err) = h.await {
                tracing::error!(error = %err, "worker task failed");
                state.request_stop();
                first_error.get_or_insert(Error::Join(err));
            }
        }

        if let Some(h) = progress_handle {
            h.abort();
            let _ = h.await;
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        let run_duration = started.elapsed();
        let natural_end = match config.stop {
            StopCondition::ByCount(n) => state.issued() >= n,
            StopCondition::ByDuration(d) => run_duration >= d,
        };
        let interrupted = state.stop_requested() && !natural_end;

        let summary = aggregator.finalize(started_at, run_duration, interrupted);

        tracing::info!(
            total = summary.total_requests,
            success = summary.success_count,
            failed = summary.failure_count,
            duration_ms = run_duration.as_millis() as u64,
            interrupted,
            "run finished"
        );

        Ok(summary)
    }
}

fn spawn_progress(
    progress: ProgressFn,
    config: &RunConfig,
    state: Arc<RunState>,
    aggregator: Arc<Aggregator>,
) -> JoinHandle<()> {
    let period = config.progress_interval;
    let stop = config.stop;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        let mut tick: u64 = 0;
        let mut last_at = Instant::now();
        let mut last_completed = state.completed();

        loop {
            interval.tick().await;

            tick = tick.saturating_add(1);
            let now = Instant::now();
            let dt = now.duration_since(last_at);
            last_at = now;

            let completed = state.completed();
            let delta = completed.saturating_sub(last_completed);
            last_completed = completed;

            (progress)(ProgressUpdate {
                tick,
                elapsed: state.elapsed(),
                interval: dt,
                stop,
                issued: state.issued(),
                completed,
                failures: aggregator.failures(),
                rps_now: (delta as f64) / dt.as_secs_f64().max(1e-9),
            });
        }
    })
}
