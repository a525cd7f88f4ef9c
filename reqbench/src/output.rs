use reqbench_core::RequestTemplate;
use reqbench_core::runner::{ProgressFn, RunConfig, Summary};

use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, template: &RequestTemplate, config: &RunConfig);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(&self, summary: &Summary) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat, show_progress: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(human::HumanReadableOutput::new(show_progress)),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
