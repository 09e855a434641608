use std::path::Path;
use std::sync::Arc;

mod format;
mod progress;
mod summary;

use actload_core::runner::{ProgressFn, ProgressUpdate, RunOutcome};
use actload_core::{RunConfig, Stage, violations};
use progress::HumanProgress;
use summary::render;

use crate::output::human::format::*;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, cfg: &RunConfig) {
        println!("target: {}", cfg.base_url);
        println!("stages: {}", describe_stages(&cfg.stages));
        println!(
            "max vus: {}, duration: {}",
            cfg.max_vus(),
            format_duration(cfg.total_duration())
        );
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |u| {
            progress.update(u.total_duration, u.elapsed, progress_message(&u));
        }))
    }

    fn print_summary(&self, outcome: &RunOutcome, export: Option<&Path>) -> anyhow::Result<()> {
        self.progress.finish();

        print!("{}", render(outcome));

        for t in violations(&outcome.thresholds) {
            eprintln!("threshold failed: {} {}", t.metric, t.expression);
        }
        if let Some(path) = export {
            println!("raw metrics written to {}", path.display());
        }
        Ok(())
    }
}

fn describe_stages(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(|s| format!("{} -> {}", humantime::format_duration(s.duration), s.target))
        .collect::<Vec<_>>()
        .join(", ")
}

fn progress_message(u: &ProgressUpdate) -> String {
    let stage = u
        .stage
        .as_ref()
        .map_or_else(|| "-".to_string(), |s| format!("{}/{}", s.stage, s.stages));

    format!(
        "stage={stage} target={} vus={} elapsed={} rps={} errors={}",
        u.current_target(),
        u.active_vus,
        format_duration(u.elapsed),
        format_rate(u.rps_now),
        u.errors_total
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use actload_core::runner::StageProgress;

    #[test]
    fn stages_are_listed_in_order() {
        let stages = [
            Stage::new(Duration::from_secs(30), 10),
            Stage::new(Duration::from_secs(60), 10),
            Stage::new(Duration::from_secs(30), 0),
        ];
        assert_eq!(describe_stages(&stages), "30s -> 10, 1m -> 10, 30s -> 0");
    }

    #[test]
    fn progress_message_shows_stage_and_counters() {
        let u = ProgressUpdate {
            tick: 3,
            elapsed: Duration::from_secs(3),
            total_duration: Duration::from_secs(10),
            stage: Some(StageProgress {
                stage: 1,
                stages: 2,
                stage_elapsed: Duration::from_secs(3),
                stage_remaining: Duration::from_secs(2),
                start_target: 0,
                end_target: 10,
                current_target: 6,
                exact_target: 6.0,
            }),
            active_vus: 5,
            requests_total: 40,
            iterations_total: 20,
            errors_total: 1,
            rps_now: 12.4,
        };

        assert_eq!(
            progress_message(&u),
            "stage=1/2 target=6 vus=5 elapsed=3s rps=12 errors=1"
        );
    }
}
