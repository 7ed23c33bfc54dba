use vigil_core::constants::{ADAPTIVE_THRESHOLD_FLOOR, BASELINE_MIN_SAMPLES};

/// Load-shedding thresholds. Heuristic, so both are operator-tunable.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Jobs are dropped while the queue is deeper than this.
    pub queue_depth_limit: i64,
    /// Jobs are dropped while p95 runtime exceeds this, provided the device
    /// already has a published decision to fall back on.
    pub p95_limit_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { queue_depth_limit: 1000, p95_limit_ms: 500 }
    }
}

/// p95 over a sample window: sort ascending, take `ceil(0.95 n) - 1`.
/// `None` when there are no samples.
pub fn p95(samples: &[u64]) -> Option<u64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let idx = ((0.95 * sorted.len() as f64).ceil() as usize).saturating_sub(1);
    Some(sorted[idx])
}

/// Per-device decision cutoff. Devices with an established baseline get
/// `mean - 2σ` (floored); everyone else gets the fixed default of 50.
pub fn adaptive_threshold(mean: f64, std: f64, count: u64) -> f64 {
    if count >= BASELINE_MIN_SAMPLES {
        ADAPTIVE_THRESHOLD_FLOOR.max(mean - 2.0 * std)
    } else {
        50.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p95_selects_the_right_rank() {
        assert_eq!(p95(&[]), None);
        assert_eq!(p95(&[120]), Some(120));
        // 20 samples: ceil(19) - 1 = index 18.
        let samples: Vec<u64> = (1..=20).map(|i| i * 10).collect();
        assert_eq!(p95(&samples), Some(190));
        // Order independent.
        let mut shuffled = samples.clone();
        shuffled.reverse();
        assert_eq!(p95(&shuffled), Some(190));
    }

    #[test]
    fn threshold_uses_default_until_baseline_established() {
        assert_eq!(adaptive_threshold(80.0, 5.0, 0), 50.0);
        assert_eq!(adaptive_threshold(80.0, 5.0, 9), 50.0);
        assert_eq!(adaptive_threshold(80.0, 5.0, 10), 70.0);
    }

    #[test]
    fn threshold_is_floored_at_30() {
        // A noisy baseline cannot push the cutoff arbitrarily low.
        assert_eq!(adaptive_threshold(40.0, 20.0, 50), 30.0);
        assert_eq!(adaptive_threshold(90.0, 10.0, 50), 70.0);
    }
}
