use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{any, get, post};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_HELLO: &str = "/hello";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_STATUS: &str = "/status/{code}";
pub const PATH_ECHO: &str = "/echo";
pub const PATH_AUTH: &str = "/auth";
pub const PATH_QP: &str = "/qp";

pub const SLOW_DELAY: Duration = Duration::from_millis(50);

/// `Authorization` value for `user:pass`.
pub const EXPECTED_BASIC_AUTH: &str = "Basic dXNlcjpwYXNz";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    saw_custom_header: Arc<AtomicU64>,
    saw_json_content_type: Arc<AtomicU64>,
    saw_form_content_type: Arc<AtomicU64>,
    saw_reqbench_user_agent: Arc<AtomicU64>,
    echo_bodies: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn observe_headers(&self, headers: &HeaderMap) {
        if headers.get("x-test").and_then(|v| v.to_str().ok()) == Some("1") {
            self.saw_custom_header.fetch_add(1, Ordering::Relaxed);
        }
        if headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("reqbench/"))
        {
            self.saw_reqbench_user_agent.fetch_add(1, Ordering::Relaxed);
        }

        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if content_type.starts_with("application/json") {
            self.saw_json_content_type.fetch_add(1, Ordering::Relaxed);
        }
        if content_type.starts_with("application/x-www-form-urlencoded") {
            self.saw_form_content_type.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_echo_body(&self, body: &Bytes) {
        let key = String::from_utf8_lossy(body).to_string();
        let mut bodies = self
            .echo_bodies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *bodies.entry(key).or_insert(0) += 1;
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn saw_custom_header(&self) -> u64 {
        self.saw_custom_header.load(Ordering::Relaxed)
    }

    pub fn saw_json_content_type(&self) -> u64 {
        self.saw_json_content_type.load(Ordering::Relaxed)
    }

    pub fn saw_form_content_type(&self) -> u64 {
        self.saw_form_content_type.load(Ordering::Relaxed)
    }

    pub fn saw_reqbench_user_agent(&self) -> u64 {
        self.saw_reqbench_user_agent.load(Ordering::Relaxed)
    }

    /// Bodies received on the echo endpoint and how often each was seen.
    pub fn echo_bodies(&self) -> BTreeMap<String, u64> {
        self.echo_bodies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[derive(Debug, Clone)]
pub struct TestServerUrls {
    pub base_url: String,
    pub hello: String,
    pub slow: String,
    pub echo: String,
    pub auth: String,
    pub qp: String,
}

impl TestServerUrls {
    pub fn new(base_url: String) -> Self {
        Self {
            hello: format!("{base_url}{PATH_HELLO}"),
            slow: format!("{base_url}{PATH_SLOW}"),
            echo: format!("{base_url}{PATH_ECHO}"),
            auth: format!("{base_url}{PATH_AUTH}"),
            qp: format!("{base_url}{PATH_QP}"),
            base_url,
        }
    }

    pub fn status(&self, code: u16) -> String {
        format!("{}/status/{code}", self.base_url)
    }
}

async fn handle_hello(State(stats): State<TestServerStats>, headers: HeaderMap) -> &'static str {
    stats.inc_requests_total();
    stats.observe_headers(&headers);
    "Hello World!"
}

async fn handle_slow(State(stats): State<TestServerStats>) -> &'static str {
    stats.inc_requests_total();
    sleep(SLOW_DELAY).await;
    "slow"
}

async fn handle_status(
    State(stats): State<TestServerStats>,
    Path(code): Path<u16>,
) -> (StatusCode, &'static str) {
    stats.inc_requests_total();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, "status")
}

async fn handle_echo(
    State(stats): State<TestServerStats>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Bytes) {
    stats.inc_requests_total();
    stats.observe_headers(&headers);
    stats.record_echo_body(&body);
    (StatusCode::OK, body)
}

async fn handle_auth(State(stats): State<TestServerStats>, headers: HeaderMap) -> StatusCode {
    stats.inc_requests_total();
    if headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(EXPECTED_BASIC_AUTH) {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn handle_qp(
    State(stats): State<TestServerStats>,
    Query(query): Query<HashMap<String, String>>,
) -> StatusCode {
    stats.inc_requests_total();

    if query.get("foo").map(String::as_str) == Some("bar") {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_HELLO, any(handle_hello))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_STATUS, any(handle_status))
        .route(PATH_ECHO, post(handle_echo).put(handle_echo))
        .route(PATH_AUTH, get(handle_auth))
        .route(PATH_QP, get(handle_qp))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    urls: TestServerUrls,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        let base_url = format!("http://{addr}");
        let urls = TestServerUrls::new(base_url.clone());

        Ok(Self {
            addr,
            base_url,
            urls,
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
