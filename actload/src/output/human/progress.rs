use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Single run-wide bar on stderr; hidden automatically when stderr is not a terminal.
pub(crate) struct HumanProgress {
    pb: ProgressBar,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr_with_hz(5));
        pb.set_style(bar_style());
        pb.set_prefix("actload");
        Self { pb }
    }

    pub(crate) fn update(&self, total: Duration, elapsed: Duration, message: String) {
        let total_ms = total.as_millis().min(u128::from(u64::MAX)) as u64;
        let elapsed_ms = elapsed.as_millis().min(u128::from(u64::MAX)) as u64;

        self.pb.set_length(total_ms);
        self.pb.set_position(elapsed_ms.min(total_ms));
        self.pb.set_message(message);
    }

    pub(crate) fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}
