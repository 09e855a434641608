use std::time::Duration;

use crate::config::Stage;

#[derive(Debug, Clone, PartialEq)]
pub struct StageSnapshot {
    /// 0-based stage index.
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
    pub exact_target: f64,
}

/// The stage containing some instant, with its absolute bounds.
#[derive(Debug, Clone, Copy)]
struct Segment {
    index: usize,
    start: Duration,
    end: Duration,
    from: u64,
    to: u64,
}

impl Segment {
    fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Piecewise-linear VU target over wall-clock time.
///
/// The curve starts at 0 and moves linearly from each stage's starting
/// target to its own `target` across the stage's duration.
#[derive(Debug, Clone)]
pub struct RampSchedule {
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

impl RampSchedule {
    pub fn new(stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            stages,
            cumulative_ends,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn max_target(&self) -> u64 {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    fn segment_at(&self, elapsed: Duration) -> Option<Segment> {
        if self.stages.is_empty() {
            return None;
        }

        let idx = if elapsed >= self.total_duration() {
            self.stages.len() - 1
        } else {
            // First stage whose end lies strictly after `elapsed`.
            self.cumulative_ends.partition_point(|end| *end <= elapsed)
        };

        let start = if idx == 0 {
            Duration::ZERO
        } else {
            self.cumulative_ends[idx - 1]
        };
        let from = if idx == 0 { 0 } else { self.stages[idx - 1].target };

        Some(Segment {
            index: idx,
            start,
            end: self.cumulative_ends[idx],
            from,
            to: self.stages[idx].target,
        })
    }

    /// Interpolated target without rounding.
    pub fn target_at_exact(&self, elapsed: Duration) -> f64 {
        let Some(seg) = self.segment_at(elapsed) else {
            return 0.0;
        };

        if elapsed >= self.total_duration() {
            return seg.to as f64;
        }

        let span = seg.duration();
        if span.is_zero() {
            return seg.to as f64;
        }

        let frac = elapsed.saturating_sub(seg.start).as_secs_f64() / span.as_secs_f64();
        let from = seg.from as f64;
        from + (seg.to as f64 - from) * frac
    }

    /// Number of VUs that should be active at `elapsed` (floor of the curve).
    pub fn target_at(&self, elapsed: Duration) -> u64 {
        let Some(seg) = self.segment_at(elapsed) else {
            return 0;
        };

        if elapsed >= self.total_duration() {
            return seg.to;
        }

        let span = seg.duration();
        if span.is_zero() {
            return seg.to;
        }

        // Integer math on nanoseconds keeps the floor exact at stage boundaries.
        let from = seg.from as i128;
        let delta = seg.to as i128 - from;
        let num = elapsed.saturating_sub(seg.start).as_nanos() as i128;
        let den = (span.as_nanos() as i128).max(1);

        let cur = from + delta.saturating_mul(num).div_euclid(den);
        cur.clamp(0, u64::MAX as i128) as u64
    }

    pub fn stage_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        let clamped = elapsed.min(self.total_duration());
        let seg = self.segment_at(clamped)?;

        let stage_elapsed = clamped.saturating_sub(seg.start);
        Some(StageSnapshot {
            index: seg.index,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining: seg.duration().saturating_sub(stage_elapsed),
            start_target: seg.from,
            end_target: seg.to,
            current_target: self.target_at(clamped),
            exact_target: self.target_at_exact(clamped),
        })
    }

    /// How long VU number `vu` (1-based) should park before re-checking whether it is active.
    pub fn next_recheck_in(&self, elapsed: Duration, vu: u64) -> Duration {
        let default_sleep = Duration::from_millis(50);

        let Some(seg) = self.segment_at(elapsed) else {
            return default_sleep;
        };
        if self.is_done(elapsed) {
            return Duration::ZERO;
        }

        if vu <= self.target_at(elapsed) {
            return Duration::from_millis(1);
        }

        // Flat or decreasing: this VU stays idle at least until the stage ends.
        if seg.to <= seg.from || vu > seg.to {
            return seg.end.saturating_sub(elapsed).min(default_sleep);
        }

        // Increasing: solve from + (to - from) * t / span >= vu for t.
        let want = (vu - seg.from) as u128;
        let delta = (seg.to - seg.from) as u128;
        let needed_ns = (want * seg.duration().as_nanos()).div_ceil(delta);
        let stage_elapsed_ns = elapsed.saturating_sub(seg.start).as_nanos();
        let wait_ns = needed_ns.saturating_sub(stage_elapsed_ns);
        let wait = Duration::from_nanos(wait_ns.min(u64::MAX as u128) as u64);

        wait.min(default_sleep)
    }
}
