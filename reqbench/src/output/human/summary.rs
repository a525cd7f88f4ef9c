use std::fmt::Write as _;

use reqbench_core::runner::Summary;

use super::format::*;

pub(crate) fn render(summary: &Summary) -> String {
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(
        &mut out,
        "  requests: {} (success {}, failed {})",
        summary.total_requests, summary.success_count, summary.failure_count
    )
    .ok();

    if !summary.status_counts.is_empty() {
        let statuses = summary
            .status_counts
            .iter()
            .map(|(status, count)| format!("{status}={count}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(&mut out, "  status: {statuses}").ok();
    }

    if !summary.failure_kinds.is_empty() {
        let kinds = summary
            .failure_kinds
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(&mut out, "  failures: {kinds}").ok();
    }

    match &summary.latency {
        Some(l) => {
            writeln!(
                &mut out,
                "  latency = min={} p50={} p90={} p99={} mean={} max={} stdev={} (n={}{})",
                format_latency(l.min),
                format_latency(l.p50),
                format_latency(l.p90),
                format_latency(l.p99),
                format_latency(l.mean),
                format_latency(l.max),
                format_latency(l.stdev),
                l.count,
                if summary.exact_percentiles { ", exact" } else { "" }
            )
            .ok();
        }
        None => out.push_str("  latency: n/a\n"),
    }

    if let Some(b) = &summary.body {
        writeln!(
            &mut out,
            "  body: total {} min {} max {} avg {}",
            format_bytes(b.total),
            format_bytes(b.min),
            format_bytes(b.max),
            format_bytes(b.mean.round() as u64)
        )
        .ok();
    }

    writeln!(
        &mut out,
        "  duration: {}",
        format_latency(summary.run_duration)
    )
    .ok();

    match summary.throughput {
        Some(rps) => writeln!(&mut out, "  throughput: rps={}", format_rate(rps)).ok(),
        None => writeln!(&mut out, "  throughput: n/a").ok(),
    };

    if summary.interrupted {
        out.push_str("  interrupted: partial results\n");
    }

    out
}
