use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqbench_core::runner::StopCondition;

pub(crate) struct HumanProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    /// Request count drives the bar under a limit, wall-clock time under a duration.
    pub(crate) fn update(
        &self,
        stop: StopCondition,
        elapsed: Duration,
        completed: u64,
        message: String,
    ) {
        let mut bar = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = bar.get_or_insert_with(new_bar);
        pb.set_message(message);

        let (length, position) = match stop {
            StopCondition::ByCount(n) => (n, completed.min(n)),
            StopCondition::ByDuration(d) => {
                let total_ms = d.as_millis() as u64;
                (total_ms, (elapsed.as_millis() as u64).min(total_ms))
            }
        };
        pb.set_length(length);
        pb.set_position(position);
    }

    pub(crate) fn finish(&self) {
        let mut bar = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pb) = bar.take() {
            pb.finish_and_clear();
        }
    }
}

fn new_bar() -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr_with_hz(5));
    pb.set_style(bar_style());
    pb.set_prefix("reqbench");
    pb
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}
