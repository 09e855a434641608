use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use actload_core::runner::{ProgressFn, ProgressUpdate, RunOutcome};
use actload_core::{LatencyStats, RunConfig, violations};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _cfg: &RunConfig) {}

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, outcome: &RunOutcome, export: Option<&Path>) -> anyhow::Result<()> {
        let line = build_summary_line(outcome, export);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub total_secs: f64,
    pub stage: Option<usize>,
    pub stages: Option<usize>,
    pub target_vus: u64,
    pub target_vus_exact: f64,
    pub active_vus: u64,
    pub requests_per_sec: f64,
    pub requests_total: u64,
    pub iterations_total: u64,
    pub errors_total: u64,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        total_secs: u.total_duration.as_secs_f64(),
        stage: u.stage.as_ref().map(|s| s.stage),
        stages: u.stage.as_ref().map(|s| s.stages),
        target_vus: u.current_target(),
        target_vus_exact: u.stage.as_ref().map_or(0.0, |s| s.exact_target),
        active_vus: u.active_vus,
        requests_per_sec: u.rps_now,
        requests_total: u.requests_total,
        iterations_total: u.iterations_total,
        errors_total: u.errors_total,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub duration_secs: f64,
    pub requests_total: u64,
    pub request_rate: f64,
    pub error_rate: Option<f64>,
    pub errors_total: u64,
    pub failed_requests_total: u64,
    pub transport_errors: BTreeMap<String, u64>,
    pub iterations_total: u64,
    pub vus_max: u64,
    pub bytes_received_total: u64,
    pub bytes_sent_total: u64,

    pub latency: Option<JsonLatencySummary>,
    pub parse_latency: Option<JsonLatencySummary>,
    pub run_latency: Option<JsonLatencySummary>,

    pub checks_failed_total: u64,
    pub checks_failed: BTreeMap<String, u64>,

    pub thresholds_passed: bool,
    pub thresholds_failed: Vec<String>,

    pub summary_export: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonLatencySummary {
    pub count: u64,
    pub min: f64,
    pub avg: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

impl From<&LatencyStats> for JsonLatencySummary {
    fn from(l: &LatencyStats) -> Self {
        Self {
            count: l.count,
            min: l.min,
            avg: l.avg,
            p50: l.p50,
            p90: l.p90,
            p95: l.p95,
            p99: l.p99,
            max: l.max,
        }
    }
}

fn build_summary_line(outcome: &RunOutcome, export: Option<&Path>) -> JsonSummaryLine {
    let s = &outcome.summary;

    let checks_failed = s
        .checks
        .iter()
        .filter(|c| c.fails > 0)
        .map(|c| (c.name.clone(), c.fails))
        .collect::<BTreeMap<_, _>>();

    let thresholds_failed = violations(&outcome.thresholds)
        .map(|t| format!("{}: {}", t.metric, t.expression))
        .collect();

    JsonSummaryLine {
        kind: "summary",
        duration_secs: s.run_duration.as_secs_f64(),
        requests_total: s.requests_total,
        request_rate: s.request_rate,
        error_rate: s.error_rate,
        errors_total: s.errors_total,
        failed_requests_total: s.failed_requests_total,
        transport_errors: s.transport_errors.clone(),
        iterations_total: s.iterations_total,
        vus_max: s.vus_max,
        bytes_received_total: s.bytes_received_total,
        bytes_sent_total: s.bytes_sent_total,
        latency: s.overall.as_ref().map(Into::into),
        parse_latency: s.parse.as_ref().map(Into::into),
        run_latency: s.run.as_ref().map(Into::into),
        checks_failed_total: s.checks_failed_total(),
        checks_failed,
        thresholds_passed: outcome.thresholds_passed(),
        thresholds_failed,
        summary_export: export.map(|p| p.display().to_string()),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;

    use actload_core::{
        CheckCounts, EndpointKind, RunSummary, Sample, ThresholdSet, evaluate_thresholds,
    };

    #[test]
    fn progress_line_has_kind_and_stage() {
        let u = ProgressUpdate {
            tick: 1,
            elapsed: Duration::from_secs(1),
            total_duration: Duration::from_secs(4),
            stage: None,
            active_vus: 0,
            requests_total: 0,
            iterations_total: 0,
            errors_total: 0,
            rps_now: 0.0,
        };

        let v: Value = match serde_json::to_value(build_progress_line(&u)) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };
        assert_eq!(v.get("kind").and_then(Value::as_str), Some("progress"));
        assert_eq!(v.get("tick").and_then(Value::as_u64), Some(1));
        assert!(v.get("stage").is_some_and(Value::is_null));
    }

    #[test]
    fn summary_line_reports_failures() {
        let samples = [Sample {
            kind: EndpointKind::Run,
            duration: Duration::from_millis(40),
            success: false,
            status: None,
            transport_error: Some(actload_http::HttpTransportErrorKind::Timeout),
            bytes_sent: 0,
            bytes_received: 0,
        }];
        let checks: BTreeMap<String, CheckCounts> = [(
            "run: has success field".to_string(),
            CheckCounts {
                passes: 0,
                fails: 1,
            },
        )]
        .into_iter()
        .collect();
        let summary =
            RunSummary::from_parts(&samples, &checks, Vec::new(), 1, Duration::from_secs(1));
        let thresholds = evaluate_thresholds(
            &[ThresholdSet::new("errors", ["rate<0.1"])],
            &summary.metrics,
        )
        .unwrap_or_else(|e| panic!("{e}"));
        let outcome = RunOutcome {
            summary,
            thresholds,
        };

        let line = build_summary_line(&outcome, Some(Path::new("out.json")));
        let v: Value = match serde_json::to_value(&line) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };

        assert_eq!(v.get("kind").and_then(Value::as_str), Some("summary"));
        assert_eq!(v.get("requests_total").and_then(Value::as_u64), Some(1));
        assert_eq!(
            v.pointer("/transport_errors/timeout").and_then(Value::as_u64),
            Some(1)
        );
        assert_eq!(v.get("error_rate").and_then(Value::as_f64), Some(1.0));
        assert_eq!(
            v.pointer("/checks_failed/run: has success field")
                .and_then(Value::as_u64),
            Some(1)
        );
        assert_eq!(v.get("thresholds_passed").and_then(Value::as_bool), Some(false));
        assert_eq!(
            v.pointer("/thresholds_failed/0").and_then(Value::as_str),
            Some("errors: rate<0.1")
        );
        assert_eq!(v.pointer("/run_latency/count").and_then(Value::as_u64), Some(1));
        assert!(v.get("parse_latency").is_some_and(Value::is_null));
        assert_eq!(v.get("summary_export").and_then(Value::as_str), Some("out.json"));
    }
}
