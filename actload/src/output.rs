use crate::cli::OutputFormat;
use std::path::Path;

use actload_core::RunConfig;
use actload_core::runner::{ProgressFn, RunOutcome};

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, cfg: &RunConfig);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(&self, outcome: &RunOutcome, export: Option<&Path>) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
