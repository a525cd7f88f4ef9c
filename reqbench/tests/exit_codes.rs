use std::process::{Command, Output};

use anyhow::Context as _;
use reqbench_testserver::TestServer;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn reqbench(args: &[&str]) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_reqbench");
    Command::new(exe)
        .args(args)
        .env_remove("REQBENCH_CONCURRENCY")
        .env_remove("REQBENCH_LIMIT")
        .env_remove("REQBENCH_DURATION")
        .env_remove("REQBENCH_TIMEOUT")
        .output()
        .context("run reqbench binary")
}

fn ensure_code(out: &Output, want: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == want,
        "expected exit code {want}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[test]
fn help_exits_0() -> anyhow::Result<()> {
    ensure_code(&reqbench(&["--help"])?, 0)
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    ensure_code(&reqbench(&["http://127.0.0.1:1/", "--duration", "10x"])?, 30)?;
    ensure_code(&reqbench(&["http://127.0.0.1:1/", "-m", "PATCH"])?, 30)?;
    ensure_code(&reqbench(&["http://127.0.0.1:1/", "-l", "5", "-d", "1s"])?, 30)?;
    ensure_code(&reqbench(&[])?, 30)
}

#[test]
fn invalid_config_exits_30() -> anyhow::Result<()> {
    ensure_code(&reqbench(&["ftp://127.0.0.1/"])?, 30)?;
    ensure_code(&reqbench(&["not a url"])?, 30)?;
    ensure_code(&reqbench(&["http://127.0.0.1:1/", "-c", "0"])?, 30)?;
    ensure_code(&reqbench(&["http://127.0.0.1:1/", "-l", "0"])?, 30)?;
    ensure_code(&reqbench(&["http://127.0.0.1:1/", "-H", "no-colon"])?, 30)?;
    ensure_code(&reqbench(&["http://127.0.0.1:1/", "-a", "nocolon"])?, 30)
}

#[test]
fn bad_data_file_exits_30() -> anyhow::Result<()> {
    ensure_code(
        &reqbench(&["http://127.0.0.1:1/", "-F", "./does-not-exist.txt"])?,
        30,
    )?;

    let dir = tempfile::tempdir().context("create temp dir")?;
    let rows = dir.path().join("rows.txt");
    std::fs::write(&rows, "id:1\nbroken\n").context("write data file")?;
    let rows = rows.to_string_lossy().to_string();
    let out = reqbench(&["http://127.0.0.1:1/", "-F", rows.as_str()])?;
    ensure_code(&out, 30)?;
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("line 2"),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );

    let blank = dir.path().join("blank.txt");
    std::fs::write(&blank, "\n\n").context("write data file")?;
    let blank = blank.to_string_lossy().to_string();
    ensure_code(&reqbench(&["http://127.0.0.1:1/", "-F", blank.as_str()])?, 30)
}

#[test]
fn unreachable_server_still_exits_0() -> anyhow::Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let url = format!("http://{}/", listener.local_addr()?);
    drop(listener);

    let out = reqbench(&[url.as_str(), "-l", "3", "--format", "json"])?;
    ensure_code(&out, 0)?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("\"failed_total\":3"), "stdout:\n{stdout}");
    anyhow::ensure!(stdout.contains("\"connect\":3"), "stdout:\n{stdout}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_run_exits_0() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let url = server.urls().status(500);

    let out = tokio::task::spawn_blocking(move || reqbench(&[url.as_str(), "-l", "2", "--no-progress"]))
        .await
        .context("spawn_blocking join")??;

    server.shutdown().await;
    ensure_code(&out, 0)
}
