use anyhow::Context as _;

use reqbench_core::runner::{Dispatcher, Retention, RunConfig, StopCondition, StopHandle};

use crate::cli::{Cli, OutputFormat};
use crate::exit_codes::ExitCode;
use crate::input::template_from_cli;
use crate::output;
use crate::responses::write_responses;
use crate::run_error::RunError;

pub async fn run(cli: Cli) -> Result<ExitCode, RunError> {
    let template = template_from_cli(&cli).await?;
    let config = run_config(&cli).map_err(RunError::from_core)?;
    let dispatcher = Dispatcher::new(config).map_err(RunError::from_core)?;

    let show_progress = !cli.no_progress && matches!(cli.format, OutputFormat::Human);
    let out = output::formatter(cli.format, show_progress);
    out.print_header(&template, dispatcher.config());

    let dispatcher = match out.progress() {
        Some(progress) => dispatcher.with_progress(progress),
        None => dispatcher,
    };

    let interrupt = tokio::spawn(stop_on_ctrl_c(dispatcher.stop_handle()));
    let result = dispatcher.run(template.clone()).await;
    interrupt.abort();
    let summary = result.map_err(RunError::from_core)?;

    out.print_summary(&summary)
        .map_err(RunError::RuntimeError)?;

    if let Some(path) = &cli.output {
        write_responses(path, &template, &summary)
            .await
            .context("failed to write responses")
            .map_err(RunError::RuntimeError)?;
    }

    Ok(ExitCode::from_summary(&summary))
}

fn run_config(cli: &Cli) -> reqbench_core::Result<RunConfig> {
    let stop = StopCondition::from_limits(cli.limit, cli.duration)?;

    // The response file needs every record.
    let retention = if cli.output.is_some() {
        Retention::Full
    } else {
        cli.retention
    };

    Ok(RunConfig {
        retention,
        connect_timeout: Some(cli.connect_timeout),
        request_timeout: Some(cli.timeout),
        ..RunConfig::new(cli.concurrency, stop)
    })
}

/// First Ctrl-C drains the run; a second one exits immediately.
async fn stop_on_ctrl_c(stop: StopHandle) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    eprintln!("interrupted: waiting for in-flight requests (Ctrl-C again to abort)");
    stop.stop();

    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(ExitCode::Interrupted.as_i32());
    }
}
