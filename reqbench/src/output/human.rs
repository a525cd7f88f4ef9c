use std::sync::Arc;

use reqbench_core::RequestTemplate;
use reqbench_core::runner::{ProgressFn, RunConfig, StopCondition, Summary};

mod format;
mod progress;
mod summary;

use format::{format_elapsed, format_rate};
use progress::HumanProgress;
use summary::render;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Option<Arc<HumanProgress>>,
}

impl HumanReadableOutput {
    pub(crate) fn new(show_progress: bool) -> Self {
        Self {
            progress: show_progress.then(|| Arc::new(HumanProgress::new())),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, template: &RequestTemplate, config: &RunConfig) {
        println!("target: {} {}", template.method(), template.url());
        let stop = match config.stop {
            StopCondition::ByCount(n) => format!("limit={n}"),
            StopCondition::ByDuration(d) => format!("duration={}", format_elapsed(d)),
        };
        let variants = template.variants().len();
        if variants > 1 {
            println!(
                "concurrency={} {stop} data_rows={variants}",
                config.concurrency
            );
        } else {
            println!("concurrency={} {stop}", config.concurrency);
        }
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone()?;

        Some(Arc::new(move |u| {
            let message = format!(
                "elapsed={} done={} in_flight={} failed={} rps={}",
                format_elapsed(u.elapsed),
                u.completed,
                u.in_flight(),
                u.failures,
                format_rate(u.rps_now)
            );
            progress.update(u.stop, u.elapsed, u.completed, message);
        }))
    }

    fn print_summary(&self, summary: &Summary) -> anyhow::Result<()> {
        if let Some(progress) = &self.progress {
            progress.finish();
        }
        print!("{}", render(summary));
        Ok(())
    }
}
