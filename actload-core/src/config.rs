use std::time::Duration;

use bytes::Bytes;
use serde_json::json;

use crate::thresholds::ThresholdSet;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_THINK_TIME: Duration = Duration::from_millis(500);
pub const DEFAULT_SUMMARY_EXPORT: &str = "load-test-results.json";

pub const PATH_PARSE: &str = "/actions/parse";
pub const PATH_RUN: &str = "/actions/run";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    #[must_use]
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// Ramp up to 10 VUs over 30s, hold for 2m, ramp down over 30s.
#[must_use]
pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(Duration::from_secs(30), 10),
        Stage::new(Duration::from_secs(120), 10),
        Stage::new(Duration::from_secs(30), 0),
    ]
}

#[must_use]
pub fn default_thresholds() -> Vec<ThresholdSet> {
    vec![
        ThresholdSet::new("errors", ["rate<0.01"]),
        ThresholdSet::new("http_req_duration", ["p(95)<300"]),
        ThresholdSet::new("http_req_failed", ["rate<0.01"]),
    ]
}

#[must_use]
pub fn default_parse_payload() -> serde_json::Value {
    json!({ "text": "get user john.doe from clockify" })
}

/// `mock: true` keeps the run endpoint away from real integrations.
#[must_use]
pub fn default_run_payload() -> serde_json::Value {
    json!({
        "action": "get_user",
        "arguments": {
            "identifier": "john.doe",
            "source": "clockify",
        },
        "mock": true,
    })
}

/// Request bodies, serialized once up front and shared by every VU.
#[derive(Debug, Clone)]
pub struct Payloads {
    pub parse: Bytes,
    pub run: Bytes,
}

impl Payloads {
    pub fn from_json(
        parse: &serde_json::Value,
        run: &serde_json::Value,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            parse: Bytes::from(serde_json::to_vec(parse)?),
            run: Bytes::from(serde_json::to_vec(run)?),
        })
    }
}

impl Default for Payloads {
    fn default() -> Self {
        Self {
            parse: Bytes::from(default_parse_payload().to_string()),
            run: Bytes::from(default_run_payload().to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: String,
    pub stages: Vec<Stage>,
    pub thresholds: Vec<ThresholdSet>,
    pub payloads: Payloads,

    /// Per-request timeout; a call exceeding it is a failed sample.
    pub timeout: Duration,

    /// Sleep after each of the two calls in an iteration.
    pub think_time: Duration,

    /// Prepended to `<vu>-<iteration>` in the `X-Request-ID` header.
    pub request_id_prefix: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stages: default_stages(),
            thresholds: default_thresholds(),
            payloads: Payloads::default(),
            timeout: DEFAULT_TIMEOUT,
            think_time: DEFAULT_THINK_TIME,
            request_id_prefix: String::new(),
        }
    }
}

impl RunConfig {
    pub fn parse_url(&self) -> String {
        join_url(&self.base_url, PATH_PARSE)
    }

    pub fn run_url(&self) -> String {
        join_url(&self.base_url, PATH_RUN)
    }

    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration))
    }

    pub fn max_vus(&self) -> u64 {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}
