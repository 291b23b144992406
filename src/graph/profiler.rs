//! Pass Cost Profiler
//!
//! Tracks per-pass moving averages of CPU time, GPU time, and memory
//! traffic. The scheduler prefers these smoothed costs over declared
//! estimates once a pass has samples, keyed by pass *name* so history
//! survives the per-frame handle churn.

use rustc_hash::FxHashMap;

use super::types::PassCost;

/// Default exponential smoothing factor.
pub const DEFAULT_SMOOTHING: f32 = 0.1;

#[derive(Default)]
struct ActiveSample {
    name: String,
    cpu_us: u32,
    gpu_us: u32,
    memory_bytes: u64,
}

/// Exponential-moving-average cost tracker.
#[derive(Default)]
pub struct PassCostProfiler {
    alpha: f32,
    smoothed: FxHashMap<String, PassCost>,
    active: Vec<ActiveSample>,
}

impl PassCostProfiler {
    /// Creates a profiler with the default smoothing factor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            alpha: DEFAULT_SMOOTHING,
            smoothed: FxHashMap::default(),
            active: Vec::new(),
        }
    }

    /// Sets the smoothing factor, clamped to `[0, 1]`.
    pub fn set_smoothing(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    /// Current smoothing factor.
    #[must_use]
    pub fn smoothing(&self) -> f32 {
        self.alpha
    }

    /// Opens a sample for `name`. Samples nest; `end_pass` closes the most
    /// recent one.
    pub fn begin_pass(&mut self, name: &str) {
        self.active.push(ActiveSample {
            name: name.to_string(),
            ..ActiveSample::default()
        });
    }

    /// Accumulates CPU time into the open sample.
    pub fn record_cpu_time(&mut self, us: u32) {
        if let Some(sample) = self.active.last_mut() {
            sample.cpu_us += us;
        }
    }

    /// Accumulates GPU time into the open sample.
    pub fn record_gpu_time(&mut self, us: u32) {
        if let Some(sample) = self.active.last_mut() {
            sample.gpu_us += us;
        }
    }

    /// Accumulates memory traffic into the open sample.
    pub fn record_memory(&mut self, bytes: u64) {
        if let Some(sample) = self.active.last_mut() {
            sample.memory_bytes += bytes;
        }
    }

    /// Closes the open sample and folds it into the moving average.
    pub fn end_pass(&mut self) {
        let Some(sample) = self.active.pop() else {
            log::warn!("end_pass without matching begin_pass");
            return;
        };
        let fresh = PassCost {
            cpu_us: sample.cpu_us,
            gpu_us: sample.gpu_us,
            memory_bytes: sample.memory_bytes,
        };
        let alpha = self.alpha;
        self.smoothed
            .entry(sample.name)
            .and_modify(|old| *old = blend(*old, fresh, alpha))
            .or_insert(fresh);
    }

    /// Whether `name` has at least one committed sample.
    #[must_use]
    pub fn has_samples(&self, name: &str) -> bool {
        self.smoothed.contains_key(name)
    }

    /// The smoothed cost for `name`, falling back to the declared estimate
    /// when no samples exist yet.
    #[must_use]
    pub fn updated_cost(&self, name: &str, declared: PassCost) -> PassCost {
        self.smoothed.get(name).copied().unwrap_or(declared)
    }

    /// Drops all history.
    pub fn clear(&mut self) {
        self.smoothed.clear();
        self.active.clear();
    }
}

fn blend(old: PassCost, fresh: PassCost, alpha: f32) -> PassCost {
    let mix_u32 = |o: u32, n: u32| -> u32 {
        (alpha * n as f32 + (1.0 - alpha) * o as f32).round() as u32
    };
    let mix_u64 = |o: u64, n: u64| -> u64 {
        (f64::from(alpha) * n as f64 + f64::from(1.0 - alpha) * o as f64).round() as u64
    };
    PassCost {
        cpu_us: mix_u32(old.cpu_us, fresh.cpu_us),
        gpu_us: mix_u32(old.gpu_us, fresh.gpu_us),
        memory_bytes: mix_u64(old.memory_bytes, fresh.memory_bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_is_taken_verbatim() {
        let mut p = PassCostProfiler::new();
        p.begin_pass("opaque");
        p.record_cpu_time(100);
        p.record_gpu_time(400);
        p.end_pass();
        let cost = p.updated_cost("opaque", PassCost::default());
        assert_eq!(cost.cpu_us, 100);
        assert_eq!(cost.gpu_us, 400);
    }

    #[test]
    fn ema_moves_a_tenth_toward_new_sample() {
        let mut p = PassCostProfiler::new();
        for gpu in [1000, 2000] {
            p.begin_pass("bloom");
            p.record_gpu_time(gpu);
            p.end_pass();
        }
        // 0.1 * 2000 + 0.9 * 1000 = 1100
        assert_eq!(p.updated_cost("bloom", PassCost::default()).gpu_us, 1100);
    }

    #[test]
    fn declared_estimate_used_without_samples() {
        let p = PassCostProfiler::new();
        let declared = PassCost {
            cpu_us: 7,
            gpu_us: 9,
            memory_bytes: 11,
        };
        assert_eq!(p.updated_cost("unseen", declared), declared);
    }

    #[test]
    fn smoothing_factor_is_clamped() {
        let mut p = PassCostProfiler::new();
        p.set_smoothing(3.0);
        assert!((p.smoothing() - 1.0).abs() < f32::EPSILON);
        p.set_smoothing(-1.0);
        assert!(p.smoothing().abs() < f32::EPSILON);
    }
}
