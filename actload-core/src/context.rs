use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use actload_http::HttpTransportErrorKind;
use parking_lot::Mutex;

use crate::scenario::CheckResult;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum EndpointKind {
    Parse,
    Run,
}

/// One observation per HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub kind: EndpointKind,
    /// Wall-clock round trip, including time spent waiting on a timeout.
    pub duration: Duration,
    /// All checks passed.
    pub success: bool,
    /// `None` when the call failed before a response arrived.
    pub status: Option<u16>,
    pub transport_error: Option<HttpTransportErrorKind>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl Sample {
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }

    /// Transport failure or a status outside 2xx/3xx.
    pub fn request_failed(&self) -> bool {
        !matches!(self.status, Some(200..=399))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckCounts {
    pub passes: u64,
    pub fails: u64,
}

/// Shared accumulators for one run.
///
/// VUs append concurrently; the contents are only read once every VU task has joined.
#[derive(Debug, Default)]
pub struct RunContext {
    samples: Mutex<Vec<Sample>>,
    checks: Mutex<BTreeMap<String, CheckCounts>>,
    iteration_durations: Mutex<Vec<Duration>>,

    requests_total: AtomicU64,
    failed_samples_total: AtomicU64,
    iterations_total: AtomicU64,
    active_vus: AtomicU64,
    active_vus_max: AtomicU64,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sample(&self, sample: Sample, checks: &CheckResult) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !sample.success {
            self.failed_samples_total.fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut tally = self.checks.lock();
            for (name, passed) in checks.named(sample.kind) {
                let entry = tally.entry(name).or_default();
                if passed {
                    entry.passes += 1;
                } else {
                    entry.fails += 1;
                }
            }
        }

        self.samples.lock().push(sample);
    }

    pub fn record_iteration(&self, duration: Duration) {
        self.iterations_total.fetch_add(1, Ordering::Relaxed);
        self.iteration_durations.lock().push(duration);
    }

    pub fn enter_active_vu(&self) -> ActiveVuGuard<'_> {
        let now = self.active_vus.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        self.active_vus_max.fetch_max(now, Ordering::Relaxed);
        ActiveVuGuard { ctx: self }
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn failed_samples_total(&self) -> u64 {
        self.failed_samples_total.load(Ordering::Relaxed)
    }

    pub fn iterations_total(&self) -> u64 {
        self.iterations_total.load(Ordering::Relaxed)
    }

    pub fn active_vus(&self) -> u64 {
        self.active_vus.load(Ordering::Relaxed)
    }

    pub fn active_vus_max(&self) -> u64 {
        self.active_vus_max.load(Ordering::Relaxed)
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().clone()
    }

    pub fn checks(&self) -> BTreeMap<String, CheckCounts> {
        self.checks.lock().clone()
    }

    pub fn iteration_durations(&self) -> Vec<Duration> {
        self.iteration_durations.lock().clone()
    }
}

/// Marks a VU as busy with an iteration until dropped.
pub struct ActiveVuGuard<'a> {
    ctx: &'a RunContext,
}

impl Drop for ActiveVuGuard<'_> {
    fn drop(&mut self) {
        self.ctx.active_vus.fetch_sub(1, Ordering::Relaxed);
    }
}
