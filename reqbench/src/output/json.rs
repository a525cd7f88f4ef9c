use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::time::Duration;

use reqbench_core::RequestTemplate;
use reqbench_core::runner::{LatencySummary, ProgressFn, RunConfig, Summary};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _template: &RequestTemplate, _config: &RunConfig) {}

    fn progress(&self) -> Option<ProgressFn> {
        None
    }

    fn print_summary(&self, summary: &Summary) -> anyhow::Result<()> {
        let line = build_summary_line(summary);
        emit_json_line(&line)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub started_at: String,
    pub duration_secs: f64,
    pub interrupted: bool,

    pub requests_total: u64,
    pub success_total: u64,
    pub failed_total: u64,
    pub status_counts: BTreeMap<u16, u64>,
    pub failure_kinds: BTreeMap<String, u64>,

    pub throughput: Option<f64>,
    pub exact_percentiles: bool,
    pub latency_ms: Option<JsonLatencySummary>,
    pub body_bytes: Option<JsonBodySummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonLatencySummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonBodySummary {
    pub total: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn latency_line(l: &LatencySummary) -> JsonLatencySummary {
    JsonLatencySummary {
        count: l.count,
        min: millis(l.min),
        max: millis(l.max),
        mean: millis(l.mean),
        stdev: millis(l.stdev),
        p50: millis(l.p50),
        p75: millis(l.p75),
        p90: millis(l.p90),
        p95: millis(l.p95),
        p99: millis(l.p99),
    }
}

fn build_summary_line(summary: &Summary) -> JsonSummaryLine {
    JsonSummaryLine {
        kind: "summary",
        started_at: humantime::format_rfc3339_millis(summary.started_at).to_string(),
        duration_secs: summary.run_duration.as_secs_f64(),
        interrupted: summary.interrupted,

        requests_total: summary.total_requests,
        success_total: summary.success_count,
        failed_total: summary.failure_count,
        status_counts: summary.status_counts.clone(),
        failure_kinds: summary
            .failure_kinds
            .iter()
            .map(|(kind, count)| (kind.to_string(), *count))
            .collect(),

        throughput: summary.throughput,
        exact_percentiles: summary.exact_percentiles,
        latency_ms: summary.latency.as_ref().map(latency_line),
        body_bytes: summary.body.map(|b| JsonBodySummary {
            total: b.total,
            min: b.min,
            max: b.max,
            mean: b.mean,
        }),
    }
}

fn emit_json_line<T: Serialize>(line: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, line)?;
    writeln!(out)?;
    Ok(())
}
