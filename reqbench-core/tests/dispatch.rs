use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use reqbench_core::runner::{
    Dispatcher, FailureKind, Outcome, Retention, RunConfig, StopCondition, run,
};
use reqbench_core::{BasicAuth, Method, RequestTemplate};
use reqbench_testserver::TestServer;

fn get(url: &str) -> anyhow::Result<RequestTemplate> {
    RequestTemplate::builder(Method::Get, url)
        .build()
        .context("build template")
}

fn full_retention(concurrency: u64, stop: StopCondition) -> RunConfig {
    RunConfig {
        retention: Retention::Full,
        ..RunConfig::new(concurrency, stop)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn count_limit_is_exact_for_any_concurrency() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let mut expected_server_total = 0;
    for concurrency in [1u64, 5, 16, 64] {
        let dispatcher = Dispatcher::new(full_retention(concurrency, StopCondition::ByCount(50)))?;
        let summary = dispatcher.run(get(&server.urls().hello)?).await?;
        expected_server_total += 50;

        anyhow::ensure!(
            summary.total_requests == 50,
            "concurrency={concurrency}: total={}",
            summary.total_requests
        );
        anyhow::ensure!(summary.success_count + summary.failure_count == 50);
        anyhow::ensure!(summary.records.len() == 50);

        let sequences: Vec<u64> = summary.records.iter().map(|r| r.sequence).collect();
        anyhow::ensure!(
            sequences == (1..=50).collect::<Vec<_>>(),
            "sequence indices must be a permutation of 1..=50, got {sequences:?}"
        );

        let issued: BTreeSet<u64> = summary.records.iter().map(|r| r.issue_index).collect();
        anyhow::ensure!(issued == (0..50).collect::<BTreeSet<_>>());
    }

    anyhow::ensure!(server.stats().requests_total() == expected_server_total);
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_workers_fifty_requests() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let summary = run(get(&server.urls().hello)?, 5, StopCondition::ByCount(50)).await?;

    anyhow::ensure!(summary.total_requests == 50);
    anyhow::ensure!(summary.success_count == 50);
    anyhow::ensure!(summary.failure_count == 0);
    anyhow::ensure!(summary.status_count(200) == 50);
    anyhow::ensure!(summary.latency.is_some_and(|l| l.count == 50));
    anyhow::ensure!(summary.body.is_some_and(|b| b.total == 50 * "Hello World!".len() as u64));
    anyhow::ensure!(summary.throughput.is_some_and(|t| t > 0.0));
    anyhow::ensure!(!summary.interrupted);
    anyhow::ensure!(summary.records.is_empty(), "streaming retention keeps no records");

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn huge_concurrency_with_small_limit_only_spawns_needed_workers() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let summary = run(
        get(&server.urls().hello)?,
        10_000_000_000_000,
        StopCondition::ByCount(10),
    )
    .await?;

    anyhow::ensure!(summary.total_requests == 10);
    anyhow::ensure!(summary.success_count == 10);
    anyhow::ensure!(server.stats().requests_total() == 10);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duration_limit_stops_issuing_at_deadline() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let limit = Duration::from_millis(200);

    let dispatcher = Dispatcher::new(full_retention(1, StopCondition::ByDuration(limit)))?;
    let summary = dispatcher.run(get(&server.urls().slow)?).await?;

    anyhow::ensure!(
        (3..=5).contains(&summary.total_requests),
        "expected 3..=5 requests at ~50ms each, got {}",
        summary.total_requests
    );
    for r in &summary.records {
        anyhow::ensure!(
            r.started_at < limit,
            "request {} issued after the deadline at {:?}",
            r.sequence,
            r.started_at
        );
    }
    anyhow::ensure!(summary.run_duration >= limit);
    anyhow::ensure!(server.stats().requests_total() == summary.total_requests);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_requests_at_deadline_are_awaited() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    // Workers are mid-request when the 10ms deadline passes.
    let summary = run(
        get(&server.urls().slow)?,
        4,
        StopCondition::ByDuration(Duration::from_millis(10)),
    )
    .await?;

    anyhow::ensure!(summary.total_requests >= 1, "got {}", summary.total_requests);
    anyhow::ensure!(summary.success_count == summary.total_requests);
    anyhow::ensure!(summary.run_duration >= Duration::from_millis(40));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn server_errors_are_successful_outcomes() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let dispatcher = Dispatcher::new(full_retention(3, StopCondition::ByCount(9)))?;
    let summary = dispatcher.run(get(&server.urls().status(500))?).await?;

    anyhow::ensure!(summary.success_count == 9);
    anyhow::ensure!(summary.failure_count == 0);
    anyhow::ensure!(summary.status_count(500) == 9);
    anyhow::ensure!(summary.records.iter().all(|r| matches!(
        r.outcome,
        Outcome::Success { status: 500, .. }
    )));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn refused_connections_are_counted_not_fatal() -> anyhow::Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let summary = run(
        get(&format!("http://{addr}/"))?,
        4,
        StopCondition::ByCount(20),
    )
    .await?;

    anyhow::ensure!(summary.total_requests == 20);
    anyhow::ensure!(summary.failure_count == 20);
    anyhow::ensure!(summary.success_count == 0);
    anyhow::ensure!(summary.failure_kind_count(FailureKind::Connect) == 20);
    anyhow::ensure!(summary.body.is_none());
    anyhow::ensure!(summary.latency.is_some());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_handle_drains_and_returns_partial_summary() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let dispatcher = Dispatcher::new(full_retention(
        4,
        StopCondition::ByDuration(Duration::from_secs(60)),
    ))?;
    let stop = dispatcher.stop_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.stop();
    });

    let started = Instant::now();
    let summary = dispatcher.run(get(&server.urls().slow)?).await?;
    let wall = started.elapsed();

    anyhow::ensure!(wall < Duration::from_secs(5), "run took {wall:?}");
    anyhow::ensure!(summary.interrupted);
    anyhow::ensure!(summary.total_requests >= 4);
    anyhow::ensure!(summary.success_count == summary.total_requests);
    anyhow::ensure!(summary.records.len() as u64 == summary.total_requests);
    anyhow::ensure!(server.stats().requests_total() == summary.total_requests);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn invalid_config_fails_before_sending() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let err = match run(get(&server.urls().hello)?, 0, StopCondition::ByCount(5)).await {
        Ok(_) => anyhow::bail!("expected a config error"),
        Err(err) => err,
    };
    anyhow::ensure!(err.is_config_error());
    anyhow::ensure!(matches!(err, reqbench_core::Error::InvalidConcurrency));

    anyhow::ensure!(Dispatcher::new(RunConfig::new(1, StopCondition::ByCount(0))).is_err());
    anyhow::ensure!(server.stats().requests_total() == 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn progress_reports_while_running() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let ticks = Arc::new(AtomicU64::new(0));
    let last_completed = Arc::new(AtomicU64::new(0));
    let config = RunConfig {
        progress_interval: Duration::from_millis(50),
        ..RunConfig::new(2, StopCondition::ByDuration(Duration::from_millis(400)))
    };

    let ticks_cb = ticks.clone();
    let completed_cb = last_completed.clone();
    let dispatcher = Dispatcher::new(config)?.with_progress(Arc::new(move |u| {
        ticks_cb.fetch_add(1, Ordering::Relaxed);
        completed_cb.fetch_max(u.completed, Ordering::Relaxed);
    }));

    let summary = dispatcher.run(get(&server.urls().slow)?).await?;

    anyhow::ensure!(ticks.load(Ordering::Relaxed) >= 2);
    anyhow::ensure!(last_completed.load(Ordering::Relaxed) <= summary.total_requests);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn data_rows_headers_and_auth_reach_the_server() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let rows = vec![
        vec![("id".to_string(), "1".to_string())],
        vec![("id".to_string(), "2".to_string())],
    ];
    let template = RequestTemplate::builder(Method::Post, &server.urls().echo)
        .header("X-Test", "1")
        .data_rows(rows)
        .build()?;
    let summary = run(template, 3, StopCondition::ByCount(10)).await?;
    anyhow::ensure!(summary.status_count(200) == 10);

    let bodies = server.stats().echo_bodies();
    anyhow::ensure!(bodies.get("id=1") == Some(&5), "bodies={bodies:?}");
    anyhow::ensure!(bodies.get("id=2") == Some(&5), "bodies={bodies:?}");
    anyhow::ensure!(server.stats().saw_custom_header() == 10);
    anyhow::ensure!(server.stats().saw_form_content_type() == 10);
    anyhow::ensure!(server.stats().saw_reqbench_user_agent() == 10);

    let json = RequestTemplate::builder(Method::Put, &server.urls().echo)
        .data(vec![("name".to_string(), "bob".to_string())])
        .json(true)
        .build()?;
    run(json, 1, StopCondition::ByCount(2)).await?;
    anyhow::ensure!(server.stats().saw_json_content_type() == 2);

    let authed = RequestTemplate::builder(Method::Get, &server.urls().auth)
        .basic_auth(Some(BasicAuth::new("user", "pass")))
        .build()?;
    let summary = run(authed, 1, StopCondition::ByCount(1)).await?;
    anyhow::ensure!(summary.status_count(200) == 1);

    let query = RequestTemplate::builder(Method::Get, &server.urls().qp)
        .data(vec![("foo".to_string(), "bar".to_string())])
        .build()?;
    let summary = run(query, 1, StopCondition::ByCount(1)).await?;
    anyhow::ensure!(summary.status_count(200) == 1);

    server.shutdown().await;
    Ok(())
}
