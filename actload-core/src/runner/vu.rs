use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use super::schedule::RampSchedule;
use crate::context::RunContext;
use crate::scenario::IterationExecutor;

/// Releases every VU at once after the runner has started timing.
#[derive(Debug, Default)]
pub struct StartSignal {
    started: AtomicBool,
    notify: Notify,
}

impl StartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        loop {
            // Register interest before checking the flag so a concurrent `start` is not missed.
            let notified = self.notify.notified();
            if self.started.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct VuContext {
    /// 1-based; VU `n` is active while the ramp target is at least `n`.
    pub vu_id: u64,
    pub schedule: Arc<RampSchedule>,
    pub executor: Arc<IterationExecutor>,
    pub ctx: Arc<RunContext>,
    pub run_started: Arc<OnceLock<Instant>>,
    pub start_signal: Arc<StartSignal>,
}

/// Runs iterations while the ramp includes this VU, until the schedule ends.
///
/// An iteration that is already running when the schedule ends is allowed to finish.
pub async fn run_vu(vu: VuContext) {
    vu.start_signal.wait().await;

    let started = vu
        .run_started
        .get()
        .copied()
        .unwrap_or_else(Instant::now);

    let mut iteration: u64 = 0;
    loop {
        let elapsed = started.elapsed();
        if vu.schedule.is_done(elapsed) {
            break;
        }

        if vu.vu_id > vu.schedule.target_at(elapsed) {
            let wait = vu.schedule.next_recheck_in(elapsed, vu.vu_id);
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
            continue;
        }

        {
            let _active = vu.ctx.enter_active_vu();
            vu.executor
                .run_iteration(&vu.ctx, vu.vu_id, iteration)
                .await;
        }
        iteration = iteration.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_signal_releases_waiters() {
        let signal = Arc::new(StartSignal::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };
        tokio::task::yield_now().await;
        signal.start();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap_or_else(|_| panic!("waiter not released"))
            .unwrap_or_else(|e| panic!("{e}"));

        // Waiting after start returns immediately.
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .unwrap_or_else(|_| panic!("late waiter blocked"));
    }
}
