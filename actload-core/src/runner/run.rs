use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use actload_http::HttpClient;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::progress::{ProgressFn, ProgressUpdate, StageProgress};
use super::schedule::RampSchedule;
use super::vu::{StartSignal, VuContext, run_vu};
use crate::config::RunConfig;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::metrics::ResultsDocument;
use crate::scenario::IterationExecutor;
use crate::summary::RunSummary;
use crate::thresholds::{ThresholdOutcome, evaluate_thresholds};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunOutcome {
    pub fn thresholds_passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.ok)
    }

    pub fn results_document(&self) -> ResultsDocument {
        ResultsDocument::new(
            &self.summary.metrics,
            &self.summary.checks,
            &self.thresholds,
            self.summary.run_duration,
        )
    }
}

/// Rejects a configuration that could not produce a meaningful run.
pub fn validate(cfg: &RunConfig) -> Result<()> {
    if cfg.stages.is_empty() {
        return Err(Error::InvalidStages);
    }
    if cfg.total_duration().is_zero() {
        return Err(Error::ZeroDuration);
    }
    if cfg.max_vus() == 0 {
        return Err(Error::InvalidVus);
    }
    if cfg.timeout.is_zero() {
        return Err(Error::InvalidTimeout);
    }

    let base = url::Url::parse(&cfg.base_url)
        .map_err(|_| Error::InvalidBaseUrl(cfg.base_url.clone()))?;
    if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
        return Err(Error::InvalidBaseUrl(cfg.base_url.clone()));
    }

    for set in &cfg.thresholds {
        set.validate()?;
    }
    Ok(())
}

/// Drives the staged VU population to completion and aggregates what it recorded.
pub async fn run(
    cfg: RunConfig,
    client: Arc<HttpClient>,
    progress: Option<ProgressFn>,
) -> Result<RunOutcome> {
    validate(&cfg)?;

    let schedule = Arc::new(RampSchedule::new(cfg.stages.clone()));
    let executor = Arc::new(IterationExecutor::new(&cfg, client));
    let ctx = Arc::new(RunContext::new());
    let run_started: Arc<OnceLock<Instant>> = Arc::new(OnceLock::new());
    let start_signal = Arc::new(StartSignal::new());

    let max_vus = schedule.max_target();
    info!(
        base_url = %cfg.base_url,
        stages = schedule.stages().len(),
        max_vus,
        duration = ?schedule.total_duration(),
        "starting load run"
    );

    let mut handles = Vec::with_capacity(max_vus.min(usize::MAX as u64) as usize);
    for vu_id in 1..=max_vus {
        let vu = VuContext {
            vu_id,
            schedule: schedule.clone(),
            executor: executor.clone(),
            ctx: ctx.clone(),
            run_started: run_started.clone(),
            start_signal: start_signal.clone(),
        };
        handles.push(tokio::spawn(run_vu(vu)));
    }

    let started = Instant::now();
    let _ = run_started.set(started);
    start_signal.start();

    let (finished_tx, finished_rx) = oneshot::channel();
    let ticker = tokio::spawn(progress_loop(
        started,
        schedule.clone(),
        ctx.clone(),
        progress,
        finished_rx,
    ));

    let mut joined = Ok(());
    for h in handles {
        if let Err(err) = h.await {
            joined = Err(err);
        }
    }
    let run_duration = started.elapsed();

    // The ticker publishes one last update with every VU gone, then exits.
    let _ = finished_tx.send(());
    let _ = ticker.await;
    joined?;

    let summary = RunSummary::from_context(&ctx, run_duration);
    let thresholds = evaluate_thresholds(&cfg.thresholds, &summary.metrics)?;

    info!(
        requests = summary.requests_total,
        iterations = summary.iterations_total,
        errors = summary.errors_total,
        duration = ?run_duration,
        "load run finished"
    );

    Ok(RunOutcome {
        summary,
        thresholds,
    })
}

async fn progress_loop(
    started: Instant,
    schedule: Arc<RampSchedule>,
    ctx: Arc<RunContext>,
    progress: Option<ProgressFn>,
    mut finished: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval_at(
        tokio::time::Instant::from_std(started) + PROGRESS_INTERVAL,
        PROGRESS_INTERVAL,
    );
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut tick: u64 = 0;
    let mut last_at = started;
    let mut last_requests = 0u64;
    let mut last_stage: Option<usize> = None;

    loop {
        let last = tokio::select! {
            _ = interval.tick() => false,
            _ = &mut finished => true,
        };
        tick = tick.saturating_add(1);

        let now = Instant::now();
        let dt = now.duration_since(last_at);
        last_at = now;

        let elapsed = started.elapsed();
        let requests_total = ctx.requests_total();
        let rps_now =
            requests_total.saturating_sub(last_requests) as f64 / dt.as_secs_f64().max(1e-9);
        last_requests = requests_total;

        let stage = schedule.stage_at(elapsed).map(|st| StageProgress {
            stage: st.index + 1,
            stages: st.count,
            stage_elapsed: st.stage_elapsed,
            stage_remaining: st.stage_remaining,
            start_target: st.start_target,
            end_target: st.end_target,
            current_target: st.current_target,
            exact_target: st.exact_target,
        });

        if let Some(st) = &stage
            && last_stage != Some(st.stage)
        {
            last_stage = Some(st.stage);
            info!(
                stage = st.stage,
                stages = st.stages,
                from = st.start_target,
                to = st.end_target,
                "entered stage"
            );
        }

        let update = ProgressUpdate {
            tick,
            elapsed,
            total_duration: schedule.total_duration(),
            stage,
            active_vus: ctx.active_vus(),
            requests_total,
            iterations_total: ctx.iterations_total(),
            errors_total: ctx.failed_samples_total(),
            rps_now,
        };
        debug!(
            tick,
            rps = rps_now,
            active_vus = update.active_vus,
            target = update.current_target(),
            "progress"
        );

        if let Some(progress) = &progress {
            (progress)(update);
        }
        if last {
            return;
        }
    }
}
