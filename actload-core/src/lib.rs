#![forbid(unsafe_code)]

mod config;
mod context;
mod error;
mod scenario;
mod summary;
mod thresholds;

pub mod metrics;
pub mod runner;

pub use config::{
    DEFAULT_BASE_URL, DEFAULT_SUMMARY_EXPORT, DEFAULT_THINK_TIME, DEFAULT_TIMEOUT, PATH_PARSE,
    PATH_RUN, Payloads, RunConfig, Stage, default_parse_payload, default_run_payload,
    default_stages, default_thresholds,
};
pub use context::{CheckCounts, EndpointKind, RunContext, Sample};
pub use error::{Error, Result};
pub use metrics::{
    Contains, MetricKind, MetricSeries, MetricValues, ResultsDocument, Trend, find_series,
};
pub use scenario::{
    CHECK_HAS_SUCCESS, CHECK_STATUS_200, CHECK_VALID_JSON, CheckResult, IterationExecutor,
    REQUEST_ID_HEADER,
};
pub use summary::{CheckSummary, LatencyStats, RunSummary, percentile};
pub use thresholds::{
    ThresholdAgg, ThresholdExpr, ThresholdOp, ThresholdOutcome, ThresholdSet,
    evaluate_thresholds, parse_threshold_expr, violations,
};
