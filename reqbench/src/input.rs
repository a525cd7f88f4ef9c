use anyhow::Context as _;
use std::path::Path;

use reqbench_core::{BasicAuth, RequestTemplate};

use crate::cli::Cli;
use crate::run_error::RunError;

pub(crate) type DataRow = Vec<(String, String)>;

/// Builds the request template from the command line, reading the data file if one was given.
pub(crate) async fn template_from_cli(cli: &Cli) -> Result<RequestTemplate, RunError> {
    let headers = cli
        .headers
        .iter()
        .map(|raw| parse_pair(raw).with_context(|| format!("invalid --header: {raw}")))
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(RunError::InvalidInput)?;

    let auth = cli
        .auth
        .as_deref()
        .map(parse_auth)
        .transpose()
        .map_err(RunError::InvalidInput)?;

    let mut builder = RequestTemplate::builder(cli.method, cli.url.clone())
        .headers(headers)
        .basic_auth(auth)
        .json(cli.json);

    if let Some(path) = &cli.file {
        let rows = read_data_file(path).await.map_err(RunError::InvalidInput)?;
        builder = builder.data_rows(rows);
    } else if !cli.data.is_empty() {
        let data = cli
            .data
            .iter()
            .map(|raw| parse_pair(raw).with_context(|| format!("invalid --data: {raw}")))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(RunError::InvalidInput)?;
        builder = builder.data(data);
    }

    builder.build().map_err(RunError::from_core)
}

/// Splits `name:value` at the first colon. Both halves are kept as given; the value may be
/// empty or contain further colons.
pub(crate) fn parse_pair(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("expected NAME:VALUE, got `{raw}`"))?;
    if name.is_empty() {
        anyhow::bail!("empty NAME in `{raw}`");
    }
    Ok((name.to_string(), value.to_string()))
}

pub(crate) fn parse_auth(raw: &str) -> anyhow::Result<BasicAuth> {
    let (user, password) = raw
        .split_once(':')
        .with_context(|| format!("invalid --auth (expected USER:PASSWORD): {raw}"))?;
    if user.is_empty() {
        anyhow::bail!("invalid --auth (empty USER): {raw}");
    }
    Ok(BasicAuth::new(user, password))
}

pub(crate) async fn read_data_file(path: &Path) -> anyhow::Result<Vec<DataRow>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read data file: {}", path.display()))?;
    parse_data_rows(&text).with_context(|| format!("invalid data file: {}", path.display()))
}

/// One row per non-blank line, each a whitespace-separated list of `name:value` tokens.
pub(crate) fn parse_data_rows(text: &str) -> anyhow::Result<Vec<DataRow>> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(parse_pair)
            .collect::<anyhow::Result<DataRow>>()
            .with_context(|| format!("line {}", idx + 1))?;
        rows.push(row);
    }
    Ok(rows)
}
