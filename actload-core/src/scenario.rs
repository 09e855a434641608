mod check;

use std::sync::Arc;
use std::time::{Duration, Instant};

use actload_http::{HttpClient, HttpRequest};
use bytes::Bytes;
use tracing::debug;

use crate::config::{Payloads, RunConfig};
use crate::context::{EndpointKind, RunContext, Sample};

pub use check::{CHECK_HAS_SUCCESS, CHECK_STATUS_200, CHECK_VALID_JSON, CheckResult};

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// The fixed parse-then-run iteration, shared by every VU.
#[derive(Debug, Clone)]
pub struct IterationExecutor {
    client: Arc<HttpClient>,
    parse_url: String,
    run_url: String,
    payloads: Payloads,
    timeout: Duration,
    think_time: Duration,
    request_id_prefix: String,
}

impl IterationExecutor {
    pub fn new(cfg: &RunConfig, client: Arc<HttpClient>) -> Self {
        Self {
            client,
            parse_url: cfg.parse_url(),
            run_url: cfg.run_url(),
            payloads: cfg.payloads.clone(),
            timeout: cfg.timeout,
            think_time: cfg.think_time,
            request_id_prefix: cfg.request_id_prefix.clone(),
        }
    }

    /// `<prefix><vu>-<iteration>`, identical for both calls of an iteration.
    pub fn request_id(&self, vu: u64, iteration: u64) -> String {
        format!("{}{vu}-{iteration}", self.request_id_prefix)
    }

    /// Parse, think, run, think. Failures are recorded as samples and never abort the iteration.
    pub async fn run_iteration(&self, ctx: &RunContext, vu: u64, iteration: u64) {
        let started = Instant::now();
        let request_id = self.request_id(vu, iteration);

        let (sample, checks) = self.call(EndpointKind::Parse, &request_id).await;
        ctx.record_sample(sample, &checks);
        tokio::time::sleep(self.think_time).await;

        let (sample, checks) = self.call(EndpointKind::Run, &request_id).await;
        ctx.record_sample(sample, &checks);
        tokio::time::sleep(self.think_time).await;

        ctx.record_iteration(started.elapsed());
    }

    /// Performs one POST and evaluates its checks.
    pub async fn call(&self, kind: EndpointKind, request_id: &str) -> (Sample, CheckResult) {
        let (url, body) = self.target(kind);
        let req = HttpRequest::post_json(url, body)
            .with_header(REQUEST_ID_HEADER, request_id)
            .with_timeout(self.timeout);

        let started = Instant::now();
        let res = self.client.request(req).await;
        let duration = started.elapsed();

        match res {
            Ok(res) => {
                let checks = CheckResult::evaluate(res.status, &res.body);
                if !checks.passed() {
                    debug!(
                        endpoint = %kind,
                        request_id,
                        status = res.status,
                        ?checks,
                        "checks failed"
                    );
                }
                let sample = Sample {
                    kind,
                    duration,
                    success: checks.passed(),
                    status: Some(res.status),
                    transport_error: None,
                    bytes_sent: res.bytes_sent,
                    bytes_received: res.bytes_received,
                };
                (sample, checks)
            }
            Err(err) => {
                debug!(endpoint = %kind, request_id, error = %err, "request failed");
                let sample = Sample {
                    kind,
                    duration,
                    success: false,
                    status: None,
                    transport_error: Some(err.transport_error_kind()),
                    bytes_sent: 0,
                    bytes_received: 0,
                };
                (sample, CheckResult::no_response())
            }
        }
    }

    fn target(&self, kind: EndpointKind) -> (&str, Bytes) {
        match kind {
            EndpointKind::Parse => (&self.parse_url, self.payloads.parse.clone()),
            EndpointKind::Run => (&self.run_url, self.payloads.run.clone()),
        }
    }
}
