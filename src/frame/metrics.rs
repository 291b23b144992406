//! Frame Metrics & Budget
//!
//! Per-frame timing report and the adaptive frame-time budget ticked by
//! the BudgetAdapt phase.

use std::collections::VecDeque;
use std::time::Duration;

/// Timing and workload summary of one completed frame.
#[derive(Clone, Debug, Default)]
pub struct FrameMetrics {
    pub frame_index: u64,
    /// Wall-clock time of the whole frame, pacing sleep included.
    pub frame_cpu_time: Duration,
    /// Wall-clock span of the parallel phase barrier.
    pub parallel_span: Duration,
    /// Number of parallel tasks dispatched.
    pub parallel_jobs: usize,
    /// Async-phase modules ticked this frame.
    pub async_ready: usize,
    /// Time slept for pacing after present.
    pub pacing_sleep: Duration,
    /// The frame exceeded the pacing target.
    pub over_budget: bool,
}

/// Adaptive per-frame time budget.
///
/// Tracks recent frame times and widens or narrows the working budget
/// toward their average, clamped to `[target, 1.5 * target]`. With no
/// pacing target the budget stays unlimited.
#[derive(Debug)]
pub struct FrameBudget {
    target: Option<Duration>,
    current: Option<Duration>,
    history: VecDeque<Duration>,
}

const HISTORY_LEN: usize = 32;

impl FrameBudget {
    /// Creates a budget for a pacing target; `None` disables budgeting.
    #[must_use]
    pub fn new(target: Option<Duration>) -> Self {
        Self {
            target,
            current: target,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// Records one frame time and adapts the working budget.
    pub fn adapt(&mut self, frame_time: Duration) {
        let Some(target) = self.target else {
            return;
        };
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(frame_time);

        let total: Duration = self.history.iter().sum();
        let average = total / self.history.len() as u32;
        let ceiling = target + target / 2;
        self.current = Some(average.clamp(target, ceiling));
    }

    /// The working budget, if pacing is enabled.
    #[must_use]
    pub fn current(&self) -> Option<Duration> {
        self.current
    }

    /// Whether `frame_time` exceeds the working budget.
    #[must_use]
    pub fn is_over(&self, frame_time: Duration) -> bool {
        self.current.is_some_and(|budget| frame_time > budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_widens_toward_slow_frames_but_clamps() {
        let target = Duration::from_millis(10);
        let mut budget = FrameBudget::new(Some(target));
        for _ in 0..8 {
            budget.adapt(Duration::from_millis(40));
        }
        assert_eq!(budget.current(), Some(Duration::from_millis(15)));
        assert!(budget.is_over(Duration::from_millis(20)));
    }

    #[test]
    fn fast_frames_keep_the_target_floor() {
        let target = Duration::from_millis(10);
        let mut budget = FrameBudget::new(Some(target));
        budget.adapt(Duration::from_millis(2));
        assert_eq!(budget.current(), Some(target));
    }

    #[test]
    fn uncapped_budget_never_flags() {
        let mut budget = FrameBudget::new(None);
        budget.adapt(Duration::from_secs(1));
        assert!(!budget.is_over(Duration::from_secs(10)));
    }
}
