use std::sync::Arc;
use std::time::Instant;

use super::aggregate::Aggregator;
use super::config::Retention;
use super::gate::PermitGate;
use super::record::{Outcome, RawResponse, ResultRecord};
use crate::RequestTemplate;
use crate::http::HttpClient;

#[derive(Debug, Clone)]
pub(crate) struct WorkerContext {
    pub worker_id: u64,
    pub template: Arc<RequestTemplate>,
    pub client: HttpClient,
    pub gate: PermitGate,
    pub aggregator: Arc<Aggregator>,
}

/// Claim, send, record; until the gate stops granting permits. Returns requests sent.
pub(crate) async fn run_worker(ctx: WorkerContext) -> u64 {
    let WorkerContext {
        worker_id,
        template,
        client,
        gate,
        aggregator,
    } = ctx;

    let keep_raw = aggregator.retention() == Retention::Full;
    let state = gate.state().clone();
    let mut sent: u64 = 0;

    tracing::debug!(worker = worker_id, "worker started");

    while let Some(issue_index) = gate.claim() {
        let started_at = state.elapsed();
        let send_started = Instant::now();

        let (outcome, latency, response) = match client.send(&template, issue_index).await {
            Ok(res) => {
                let outcome = Outcome::Success {
                    status: res.status,
                    body_size: res.body.len() as u64,
                };
                let response = keep_raw.then(|| RawResponse {
                    headers: res.headers,
                    body: res.body,
                });
                (outcome, res.time_to_first_byte, response)
            }
            Err(err) => {
                let kind = err.failure_kind();
                tracing::debug!(
                    worker = worker_id,
                    issue_index,
                    %kind,
                    error = %err,
                    "request failed"
                );
                let outcome = Outcome::Failure {
                    kind,
                    message: err.to_string(),
                };
                (outcome, send_started.elapsed(), None)
            }
        };

        let sequence = state.complete();
        aggregator.consume(ResultRecord {
            sequence,
            issue_index,
            outcome,
            started_at,
            latency,
            response,
        });
        sent = sent.saturating_add(1);
    }

    tracing::debug!(worker = worker_id, sent, "worker drained");
    sent
}
