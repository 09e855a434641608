use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::summary::{CheckSummary, LatencyStats, percentile};
use crate::thresholds::ThresholdOutcome;

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const ERRORS: &str = "errors";
pub const PARSE_LATENCY: &str = "parse_latency";
pub const RUN_LATENCY: &str = "run_latency";
pub const CHECKS: &str = "checks";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const DATA_RECEIVED: &str = "data_received";
pub const DATA_SENT: &str = "data_sent";
pub const VUS_MAX: &str = "vus_max";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

/// Millisecond observations kept sorted so any percentile can be read back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trend {
    sorted_ms: Vec<f64>,
}

impl Trend {
    pub fn from_ms(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        Self { sorted_ms: values }
    }

    pub fn from_durations(durations: impl IntoIterator<Item = Duration>) -> Self {
        Self::from_ms(
            durations
                .into_iter()
                .map(|d| d.as_secs_f64() * 1000.0)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.sorted_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_ms.is_empty()
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        percentile(&self.sorted_ms, p)
    }

    pub fn stats(&self) -> Option<LatencyStats> {
        LatencyStats::from_sorted_ms(&self.sorted_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValues {
    Counter { value: f64, rate: f64 },
    Gauge { value: f64, min: f64, max: f64 },
    Rate { passes: u64, fails: u64 },
    Trend(Trend),
}

impl MetricValues {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValues::Counter { .. } => MetricKind::Counter,
            MetricValues::Gauge { .. } => MetricKind::Gauge,
            MetricValues::Rate { .. } => MetricKind::Rate,
            MetricValues::Trend(_) => MetricKind::Trend,
        }
    }

    /// Share of non-zero observations, `None` for an empty rate.
    pub fn rate(&self) -> Option<f64> {
        match self {
            MetricValues::Rate { passes, fails } => {
                let total = passes.saturating_add(*fails);
                (total > 0).then(|| *passes as f64 / total as f64)
            }
            _ => None,
        }
    }
}

/// What a metric's values measure, as reported in the results document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Contains {
    Default,
    Time,
    Data,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub name: String,
    pub contains: Contains,
    pub values: MetricValues,
}

impl MetricSeries {
    pub fn new(name: &str, contains: Contains, values: MetricValues) -> Self {
        Self {
            name: name.to_string(),
            contains,
            values,
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.values.kind()
    }
}

pub fn find_series<'a>(series: &'a [MetricSeries], name: &str) -> Option<&'a MetricSeries> {
    series.iter().find(|s| s.name == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThresholdStatus {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub contains: Contains,
    pub values: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub thresholds: BTreeMap<String, ThresholdStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckEntry {
    pub name: String,
    pub path: String,
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootGroup {
    pub name: String,
    pub path: String,
    pub groups: Vec<RootGroup>,
    pub checks: Vec<CheckEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub test_run_duration_ms: f64,
}

/// The raw metrics dump written next to the human report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsDocument {
    pub state: RunState,
    pub metrics: BTreeMap<String, MetricEntry>,
    pub root_group: RootGroup,
}

impl ResultsDocument {
    /// Empty trends are left out; threshold outcomes attach to the metric they name.
    pub fn new(
        series: &[MetricSeries],
        checks: &[CheckSummary],
        thresholds: &[ThresholdOutcome],
        run_duration: Duration,
    ) -> Self {
        let mut metrics = BTreeMap::new();
        for s in series {
            let Some(values) = entry_values(&s.values) else {
                continue;
            };
            metrics.insert(
                s.name.clone(),
                MetricEntry {
                    kind: s.kind().to_string(),
                    contains: s.contains,
                    values,
                    thresholds: BTreeMap::new(),
                },
            );
        }

        for outcome in thresholds {
            if let Some(entry) = metrics.get_mut(&outcome.metric) {
                entry
                    .thresholds
                    .insert(outcome.expression.clone(), ThresholdStatus { ok: outcome.ok });
            }
        }

        let checks = checks
            .iter()
            .map(|c| CheckEntry {
                name: c.name.clone(),
                path: format!("::{}", c.name),
                passes: c.passes,
                fails: c.fails,
            })
            .collect();

        Self {
            state: RunState {
                test_run_duration_ms: run_duration.as_secs_f64() * 1000.0,
            },
            metrics,
            root_group: RootGroup {
                name: String::new(),
                path: String::new(),
                groups: Vec::new(),
                checks,
            },
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn entry_values(values: &MetricValues) -> Option<BTreeMap<String, f64>> {
    let mut out = BTreeMap::new();
    match values {
        MetricValues::Counter { value, rate } => {
            out.insert("count".to_string(), *value);
            out.insert("rate".to_string(), *rate);
        }
        MetricValues::Gauge { value, min, max } => {
            out.insert("value".to_string(), *value);
            out.insert("min".to_string(), *min);
            out.insert("max".to_string(), *max);
        }
        MetricValues::Rate { passes, fails } => {
            out.insert("rate".to_string(), values.rate().unwrap_or(0.0));
            out.insert("passes".to_string(), *passes as f64);
            out.insert("fails".to_string(), *fails as f64);
        }
        MetricValues::Trend(trend) => {
            let stats = trend.stats()?;
            out.insert("min".to_string(), stats.min);
            out.insert("avg".to_string(), stats.avg);
            out.insert("med".to_string(), stats.p50);
            out.insert("max".to_string(), stats.max);
            out.insert("p(90)".to_string(), stats.p90);
            out.insert("p(95)".to_string(), stats.p95);
            out.insert("p(99)".to_string(), stats.p99);
        }
    }
    Some(out)
}
