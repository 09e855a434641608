use anyhow::Context as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use actload_core::runner::{self, RunOutcome};
use actload_core::{
    DEFAULT_SUMMARY_EXPORT, Payloads, RunConfig, default_parse_payload, default_run_payload,
};
use actload_http::HttpClient;
use tracing::debug;

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::logging;
use crate::output;
use crate::profile::{ProfileYaml, load_profile};
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    logging::init(args.log_level.as_deref()).map_err(RunError::InvalidInput)?;

    let profile = match &args.profile {
        Some(path) => load_profile(path).await.map_err(RunError::InvalidInput)?,
        None => ProfileYaml::default(),
    };

    let cfg = resolve_config(&args, profile).map_err(RunError::InvalidInput)?;
    runner::validate(&cfg).map_err(RunError::from_core)?;
    debug!(
        profile = ?args.profile,
        base_url = %cfg.base_url,
        timeout = ?cfg.timeout,
        think_time = ?cfg.think_time,
        thresholds = cfg.thresholds.len(),
        "resolved run configuration"
    );

    let export = summary_export_path(&args);

    let out = output::formatter(args.output);
    out.print_header(&cfg);

    let outcome = runner::run(cfg, Arc::new(HttpClient::default()), out.progress())
        .await
        .map_err(RunError::from_core)?;

    if let Some(path) = &export {
        write_summary_export(path, &outcome)
            .await
            .map_err(RunError::RuntimeError)?;
    }

    out.print_summary(&outcome, export.as_deref())
        .map_err(RunError::RuntimeError)?;

    Ok(ExitCode::from_thresholds(outcome.thresholds_passed()))
}

/// Flags and environment first, then the profile, then built-in defaults.
fn resolve_config(args: &RunArgs, profile: ProfileYaml) -> anyhow::Result<RunConfig> {
    let defaults = RunConfig::default();

    let stages = if !args.stages.is_empty() {
        args.stages.clone()
    } else if !profile.stages.is_empty() {
        profile.stages()
    } else {
        defaults.stages
    };

    let thresholds = profile.thresholds().unwrap_or(defaults.thresholds);

    let parse_payload = profile.parse_payload.unwrap_or_else(default_parse_payload);
    let run_payload = profile.run_payload.unwrap_or_else(default_run_payload);
    let payloads = Payloads::from_json(&parse_payload, &run_payload)
        .context("failed to encode request payloads")?;

    Ok(RunConfig {
        base_url: args
            .base_url
            .clone()
            .or(profile.base_url)
            .unwrap_or(defaults.base_url),
        stages,
        thresholds,
        payloads,
        timeout: args
            .timeout
            .or(profile.timeout.map(|d| d.into_inner()))
            .unwrap_or(defaults.timeout),
        think_time: args
            .think_time
            .or(profile.think_time.map(|d| d.into_inner()))
            .unwrap_or(defaults.think_time),
        request_id_prefix: profile
            .request_id_prefix
            .unwrap_or(defaults.request_id_prefix),
    })
}

fn summary_export_path(args: &RunArgs) -> Option<PathBuf> {
    if args.no_summary_export {
        return None;
    }
    Some(
        args.summary_export
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SUMMARY_EXPORT)),
    )
}

async fn write_summary_export(path: &Path, outcome: &RunOutcome) -> anyhow::Result<()> {
    let json = outcome
        .results_document()
        .to_json_pretty()
        .context("failed to encode results document")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("failed to create summary export dir: {}", parent.display())
        })?;
    }
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write summary export: {}", path.display()))
}
