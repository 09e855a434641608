use std::collections::BTreeMap;
use std::time::Duration;

use crate::context::{CheckCounts, EndpointKind, RunContext, Sample};
use crate::metrics::{self, Contains, MetricSeries, MetricValues, Trend};

/// Linear interpolation between the closest ranks of an ascending slice.
///
/// `None` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let (&first, &last) = (sorted.first()?, sorted.last()?);
    if sorted.len() == 1 || p <= 0.0 {
        return Some(first);
    }
    if p >= 100.0 {
        return Some(last);
    }

    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = (idx.ceil() as usize).min(sorted.len() - 1);
    let fraction = idx - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Latency distribution of one stream, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub min: f64,
    pub avg: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

impl LatencyStats {
    pub fn from_sorted_ms(sorted: &[f64]) -> Option<Self> {
        let (&min, &max) = (sorted.first()?, sorted.last()?);
        let sum: f64 = sorted.iter().sum();
        let pct = |p| percentile(sorted, p).unwrap_or(max);

        Some(Self {
            count: sorted.len() as u64,
            min,
            avg: sum / sorted.len() as f64,
            p50: pct(50.0),
            p90: pct(90.0),
            p95: pct(95.0),
            p99: pct(99.0),
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckSummary {
    pub fn total(&self) -> u64 {
        self.passes.saturating_add(self.fails)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub requests_total: u64,
    /// Requests per second over the whole run.
    pub request_rate: f64,

    pub overall: Option<LatencyStats>,
    pub parse: Option<LatencyStats>,
    pub run: Option<LatencyStats>,

    /// Share of samples whose checks did not all pass.
    pub error_rate: Option<f64>,
    pub errors_total: u64,

    /// Share of calls with a transport failure or a non-2xx/3xx status.
    pub failed_request_rate: Option<f64>,
    pub failed_requests_total: u64,
    /// Samples without a response, keyed by transport error kind.
    pub transport_errors: BTreeMap<String, u64>,

    pub iterations_total: u64,
    pub iteration_duration: Option<LatencyStats>,

    pub checks: Vec<CheckSummary>,
    pub bytes_sent_total: u64,
    pub bytes_received_total: u64,
    pub vus_max: u64,
    pub run_duration: Duration,

    /// Named series backing the results document and threshold evaluation.
    pub metrics: Vec<MetricSeries>,
}

impl RunSummary {
    /// Aggregates everything a finished run recorded. Call only after every VU has joined.
    pub fn from_context(ctx: &RunContext, run_duration: Duration) -> Self {
        Self::from_parts(
            &ctx.samples(),
            &ctx.checks(),
            ctx.iteration_durations(),
            ctx.active_vus_max(),
            run_duration,
        )
    }

    pub fn from_parts(
        samples: &[Sample],
        checks: &BTreeMap<String, CheckCounts>,
        iteration_durations: Vec<Duration>,
        vus_max: u64,
        run_duration: Duration,
    ) -> Self {
        let secs = run_duration.as_secs_f64();
        let per_sec = |n: u64| if secs > 0.0 { n as f64 / secs } else { 0.0 };
        let ratio = |n: u64, total: u64| (total > 0).then(|| n as f64 / total as f64);

        let trend_of = |kind: Option<EndpointKind>| {
            Trend::from_ms(
                samples
                    .iter()
                    .filter(|s| kind.is_none_or(|k| s.kind == k))
                    .map(Sample::duration_ms)
                    .collect(),
            )
        };
        let overall = trend_of(None);
        let parse = trend_of(Some(EndpointKind::Parse));
        let run = trend_of(Some(EndpointKind::Run));

        let iterations_total = iteration_durations.len() as u64;
        let iteration_trend = Trend::from_durations(iteration_durations);

        let requests_total = samples.len() as u64;
        let errors_total = samples.iter().filter(|s| !s.success).count() as u64;
        let failed_requests_total = samples.iter().filter(|s| s.request_failed()).count() as u64;
        let mut transport_errors: BTreeMap<String, u64> = BTreeMap::new();
        for kind in samples.iter().filter_map(|s| s.transport_error) {
            *transport_errors.entry(kind.to_string()).or_default() += 1;
        }
        let bytes_sent_total: u64 = samples.iter().map(|s| s.bytes_sent).sum();
        let bytes_received_total: u64 = samples.iter().map(|s| s.bytes_received).sum();

        let checks: Vec<CheckSummary> = checks
            .iter()
            .map(|(name, c)| CheckSummary {
                name: name.clone(),
                passes: c.passes,
                fails: c.fails,
            })
            .collect();
        let check_passes: u64 = checks.iter().map(|c| c.passes).sum();
        let check_fails: u64 = checks.iter().map(|c| c.fails).sum();

        let metrics = vec![
            MetricSeries::new(
                metrics::HTTP_REQS,
                Contains::Default,
                MetricValues::Counter {
                    value: requests_total as f64,
                    rate: per_sec(requests_total),
                },
            ),
            MetricSeries::new(
                metrics::HTTP_REQ_DURATION,
                Contains::Time,
                MetricValues::Trend(overall.clone()),
            ),
            MetricSeries::new(
                metrics::HTTP_REQ_FAILED,
                Contains::Default,
                MetricValues::Rate {
                    passes: failed_requests_total,
                    fails: requests_total - failed_requests_total,
                },
            ),
            MetricSeries::new(
                metrics::ERRORS,
                Contains::Default,
                MetricValues::Rate {
                    passes: errors_total,
                    fails: requests_total - errors_total,
                },
            ),
            MetricSeries::new(
                metrics::PARSE_LATENCY,
                Contains::Time,
                MetricValues::Trend(parse.clone()),
            ),
            MetricSeries::new(
                metrics::RUN_LATENCY,
                Contains::Time,
                MetricValues::Trend(run.clone()),
            ),
            MetricSeries::new(
                metrics::CHECKS,
                Contains::Default,
                MetricValues::Rate {
                    passes: check_passes,
                    fails: check_fails,
                },
            ),
            MetricSeries::new(
                metrics::ITERATIONS,
                Contains::Default,
                MetricValues::Counter {
                    value: iterations_total as f64,
                    rate: per_sec(iterations_total),
                },
            ),
            MetricSeries::new(
                metrics::ITERATION_DURATION,
                Contains::Time,
                MetricValues::Trend(iteration_trend.clone()),
            ),
            MetricSeries::new(
                metrics::DATA_RECEIVED,
                Contains::Data,
                MetricValues::Counter {
                    value: bytes_received_total as f64,
                    rate: per_sec(bytes_received_total),
                },
            ),
            MetricSeries::new(
                metrics::DATA_SENT,
                Contains::Data,
                MetricValues::Counter {
                    value: bytes_sent_total as f64,
                    rate: per_sec(bytes_sent_total),
                },
            ),
            MetricSeries::new(
                metrics::VUS_MAX,
                Contains::Default,
                MetricValues::Gauge {
                    value: vus_max as f64,
                    min: vus_max as f64,
                    max: vus_max as f64,
                },
            ),
        ];

        Self {
            requests_total,
            request_rate: per_sec(requests_total),
            overall: overall.stats(),
            parse: parse.stats(),
            run: run.stats(),
            error_rate: ratio(errors_total, requests_total),
            errors_total,
            failed_request_rate: ratio(failed_requests_total, requests_total),
            failed_requests_total,
            transport_errors,
            iterations_total,
            iteration_duration: iteration_trend.stats(),
            checks,
            bytes_sent_total,
            bytes_received_total,
            vus_max,
            run_duration,
            metrics,
        }
    }

    pub fn checks_failed_total(&self) -> u64 {
        self.checks.iter().map(|c| c.fails).sum()
    }
}
