use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use reqbench_core::Method;
use reqbench_core::runner::Retention;

/// Accepts humantime spans (`250ms`, `10s`, `1m 30s`); a bare number is seconds.
fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| format!("duration '{s}' is too large"));
    }
    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}': {err} (expected e.g. 10s, 250ms, 1m)"))
}

fn parse_method(input: &str) -> Result<Method, String> {
    input.trim().parse().map_err(|_| {
        format!("unsupported method '{input}' (expected GET, DELETE, OPTIONS, HEAD, POST or PUT)")
    })
}

fn parse_retention(input: &str) -> Result<Retention, String> {
    input
        .trim()
        .parse()
        .map_err(|_| format!("invalid retention '{input}' (expected streaming or full)"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    Human,
    /// A single JSON summary line on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "reqbench",
    author,
    version,
    about = "Concurrent HTTP request benchmarking tool",
    long_about = "reqbench sends the same HTTP request from a pool of concurrent workers until a request limit or a duration is reached, then reports status counts, latency percentiles, response sizes and throughput.\n\nRequest data given with -D or -F goes into the query string for GET/DELETE/OPTIONS/HEAD and into the body for POST/PUT.\n\nCtrl-C stops issuing new requests, waits for the ones in flight and prints the partial summary.",
    after_help = "Examples:\n  reqbench http://localhost:8080/ -c 10 -l 1000\n  reqbench http://localhost:8080/search -D q:rust -d 30s -c 50\n  reqbench http://localhost:8080/users -m POST -j -F users.txt -l 200\n  reqbench https://example.com/ -a user:secret -H 'X-Trace:1' -O responses.ndjson"
)]
pub struct Cli {
    /// Target URL (http:// or https://)
    pub url: String,

    /// HTTP method: GET, DELETE, OPTIONS, HEAD, POST or PUT
    #[arg(short = 'm', long, default_value = "GET", value_parser = parse_method)]
    pub method: Method,

    /// Request data as NAME:VALUE (repeatable)
    #[arg(short = 'D', long = "data", value_name = "NAME:VALUE", conflicts_with = "file")]
    pub data: Vec<String>,

    /// Data file: one request per line of space-separated NAME:VALUE pairs, cycled
    #[arg(short = 'F', long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Send POST/PUT data as a JSON object instead of a form
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Number of concurrent workers
    #[arg(short = 'c', long, env = "REQBENCH_CONCURRENCY", default_value_t = 1)]
    pub concurrency: u64,

    /// Basic authentication as USER:PASSWORD
    #[arg(short = 'a', long, value_name = "USER:PASSWORD")]
    pub auth: Option<String>,

    /// Extra request header as NAME:VALUE (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Total number of requests to send (default 1 when no duration is given)
    #[arg(short = 'l', long, env = "REQBENCH_LIMIT", conflicts_with = "duration")]
    pub limit: Option<u64>,

    /// Keep issuing requests for this long (e.g. 10s, 250ms, 1m)
    #[arg(short = 'd', long, env = "REQBENCH_DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Write every request and response as NDJSON to this file (keeps all records in memory)
    #[arg(short = 'O', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Per-request timeout
    #[arg(long, env = "REQBENCH_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// TCP connect timeout
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    pub connect_timeout: Duration,

    /// Result retention: streaming (bounded memory) or full (exact percentiles)
    #[arg(long, default_value = "streaming", value_parser = parse_retention)]
    pub retention: Retention,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Do not draw the progress bar
    #[arg(long)]
    pub no_progress: bool,
}
