use anyhow::Context as _;
use serde::Serialize;
use std::borrow::Cow;
use std::path::Path;
use tokio::io::AsyncWriteExt as _;

use reqbench_core::RequestTemplate;
use reqbench_core::runner::{Outcome, ResultRecord, Summary};

#[derive(Debug, Serialize)]
struct ResponseLine<'a> {
    seq: u64,
    started_at: String,
    latency_ms: f64,
    method: String,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_body: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ResponseError<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    headers: Vec<(&'a str, &'a str)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Cow<'a, str>>,
}

#[derive(Debug, Serialize)]
struct ResponseError<'a> {
    kind: String,
    message: &'a str,
}

fn response_line<'a>(
    template: &'a RequestTemplate,
    summary: &Summary,
    record: &'a ResultRecord,
) -> ResponseLine<'a> {
    let started_at = humantime::format_rfc3339_micros(summary.started_at + record.started_at);

    let error = match &record.outcome {
        Outcome::Success { .. } => None,
        Outcome::Failure { kind, message } => Some(ResponseError {
            kind: kind.to_string(),
            message,
        }),
    };

    let (headers, body) = match &record.response {
        Some(r) => (
            r.headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
            Some(String::from_utf8_lossy(&r.body)),
        ),
        None => (Vec::new(), None),
    };

    let variant = template.variant(record.issue_index);
    let request_body =
        (!variant.body().is_empty()).then(|| String::from_utf8_lossy(variant.body()));

    ResponseLine {
        seq: record.sequence,
        started_at: started_at.to_string(),
        latency_ms: record.latency.as_secs_f64() * 1000.0,
        method: template.method().to_string(),
        url: variant.url(),
        request_body,
        status: record.outcome.status(),
        error,
        headers,
        body,
    }
}

/// Renders one NDJSON line per retained record, in sequence order.
pub(crate) fn render_responses(
    template: &RequestTemplate,
    summary: &Summary,
) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    for record in &summary.records {
        serde_json::to_writer(&mut buf, &response_line(template, summary, record))
            .with_context(|| format!("failed to encode response {}", record.sequence))?;
        buf.push(b'\n');
    }
    Ok(buf)
}

pub(crate) async fn write_responses(
    path: &Path,
    template: &RequestTemplate,
    summary: &Summary,
) -> anyhow::Result<()> {
    let buf = render_responses(template, summary)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create output dir: {}", parent.display()))?;
    }

    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create output file: {}", path.display()))?;
    file.write_all(&buf)
        .await
        .with_context(|| format!("failed to write output file: {}", path.display()))?;
    file.flush().await?;

    tracing::debug!(
        path = %path.display(),
        records = summary.records.len(),
        "wrote responses"
    );
    Ok(())
}
