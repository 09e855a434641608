use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct StageProgress {
    /// 1-based stage index.
    pub stage: usize,
    pub stages: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
    /// Un-floored point on the ramp.
    pub exact_target: f64,
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based).
    pub tick: u64,
    pub elapsed: Duration,
    pub total_duration: Duration,
    pub stage: Option<StageProgress>,

    /// VUs currently inside an iteration.
    pub active_vus: u64,
    pub requests_total: u64,
    pub iterations_total: u64,
    /// Samples whose checks did not all pass.
    pub errors_total: u64,

    /// Requests/sec observed during the last interval.
    pub rps_now: f64,
}

impl ProgressUpdate {
    pub fn current_target(&self) -> u64 {
        self.stage.as_ref().map_or(0, |s| s.current_target)
    }
}

pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
