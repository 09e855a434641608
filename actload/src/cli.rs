use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use actload_core::Stage;

pub(crate) fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 30s, 500ms, 2m)".to_string());
    }

    // A bare number means seconds.
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}' ({err}; expected e.g. 30s, 500ms, 2m)"))
}

/// `DURATION:TARGET`, e.g. `30s:10`.
pub(crate) fn parse_stage(input: &str) -> Result<Stage, String> {
    let (duration, target) = input
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| format!("invalid stage '{input}' (expected DURATION:TARGET, e.g. 30s:10)"))?;

    let duration = parse_duration(duration)?;
    let target: u64 = target.trim().parse().map_err(|_| {
        format!("invalid stage target in '{input}' (expected a non-negative integer)")
    })?;

    Ok(Stage::new(duration, target))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bar and a text report.
    HumanReadable,
    /// Emit JSON progress lines (NDJSON) and a final summary line to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "actload",
    author,
    version,
    about = "Staged load testing for the actions API",
    long_about = "actload drives a ramping population of virtual users against the `/actions/parse` and `/actions/run` endpoints.\n\nEach iteration posts a parse request, waits, posts a run request, and waits again. Every response is checked for status 200, a JSON body, and a `success` field.\n\nWhen the run ends a report is printed, raw metrics are exported as JSON, and thresholds decide the exit code.",
    after_help = "Examples:\n  actload run\n  actload run profile.yaml\n  actload run --base-url http://staging:8000 --stage 10s:5 --stage 1m:5 --stage 10s:0\n  actload run --output json --no-summary-export"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the load test
    #[command(
        long_about = "Run the staged load test.\n\nValues are taken from CLI flags first, then environment variables, then the optional YAML profile, then built-in defaults."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Optional YAML profile (.yaml/.yml)
    pub profile: Option<PathBuf>,

    /// Base URL of the service under test
    #[arg(long, env = "BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Ramp stage (repeatable, replaces the profile/default stages)
    #[arg(long = "stage", value_name = "DURATION:TARGET", value_parser = parse_stage)]
    pub stages: Vec<Stage>,

    /// Per-request timeout (e.g. 5s, 750ms)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Pause after each call of an iteration (e.g. 500ms)
    #[arg(long, value_parser = parse_duration)]
    pub think_time: Option<Duration>,

    /// Where to write the raw metrics JSON
    #[arg(long, value_name = "PATH")]
    pub summary_export: Option<PathBuf>,

    /// Do not write the raw metrics JSON
    #[arg(long, conflicts_with = "summary_export")]
    pub no_summary_export: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Log filter (e.g. info, debug, actload_core=trace); overrides ACTLOAD_LOG
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_run(args: &[&str]) -> RunArgs {
        let argv = ["actload", "run"].into_iter().chain(args.iter().copied());
        match Cli::try_parse_from(argv) {
            Ok(cli) => match cli.command {
                Command::Run(args) => args,
            },
            Err(err) => panic!("failed to parse args: {err}"),
        }
    }

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("5"), Ok(Duration::from_secs(5)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn parse_stage_splits_duration_and_target() {
        assert_eq!(
            parse_stage("30s:10"),
            Ok(Stage::new(Duration::from_secs(30), 10))
        );
        assert_eq!(parse_stage("2m:0"), Ok(Stage::new(Duration::from_secs(120), 0)));
        assert!(parse_stage("30s").is_err());
        assert!(parse_stage("30s:-1").is_err());
        assert!(parse_stage("soon:3").is_err());
    }

    #[test]
    fn cli_parses_run_flags() {
        let args = parse_run(&[
            "profile.yaml",
            "--base-url",
            "http://example.test:8000",
            "--stage",
            "1s:2",
            "--stage",
            "2s:0",
            "--timeout",
            "750ms",
            "--think-time",
            "10ms",
            "--summary-export",
            "out.json",
            "--output",
            "json",
            "--log-level",
            "debug",
        ]);

        assert_eq!(args.profile, Some(PathBuf::from("profile.yaml")));
        assert_eq!(args.base_url.as_deref(), Some("http://example.test:8000"));
        assert_eq!(
            args.stages,
            vec![
                Stage::new(Duration::from_secs(1), 2),
                Stage::new(Duration::from_secs(2), 0)
            ]
        );
        assert_eq!(args.timeout, Some(Duration::from_millis(750)));
        assert_eq!(args.think_time, Some(Duration::from_millis(10)));
        assert_eq!(args.summary_export, Some(PathBuf::from("out.json")));
        assert_eq!(args.output, OutputFormat::Json);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn summary_export_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "actload",
            "run",
            "--summary-export",
            "a.json",
            "--no-summary-export",
        ]);
        assert!(parsed.is_err());
    }
}
