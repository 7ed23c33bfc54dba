/// Per-device running statistics over published trust scores, using
/// Welford's online algorithm: O(1) per update, no history re-read, and
/// numerically stable for long-lived devices.
///
/// Persisted as a coordination-store hash `{mean, m2, count, std}` so any
/// worker can pick up where the last one left off. Updates are
/// last-writer-wins per device; the statistic drifts slowly enough that
/// occasional lost updates do not matter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WelfordBaseline {
    pub mean: f64,
    pub m2: f64,
    pub count: u64,
}

impl WelfordBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from stored hash fields. Missing or garbled fields reset the
    /// baseline rather than poisoning future updates.
    pub fn from_fields(mean: Option<&str>, m2: Option<&str>, count: Option<&str>) -> Self {
        Self {
            mean: mean.and_then(|v| v.parse().ok()).unwrap_or(0.0),
            m2: m2.and_then(|v| v.parse().ok()).unwrap_or(0.0),
            count: count.and_then(|v| v.parse().ok()).unwrap_or(0),
        }
    }

    /// Fold one observation into the running statistics.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Population standard deviation; 0 until at least two observations.
    pub fn std(&self) -> f64 {
        if self.count > 1 {
            (self.m2 / self.count as f64).sqrt()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Direct two-pass mean / population std for cross-checking.
    fn two_pass(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn matches_two_pass_computation() {
        let scores = [82.0, 74.0, 91.0, 68.0, 77.0, 85.0, 60.0, 79.0];
        let mut b = WelfordBaseline::new();
        for s in scores {
            b.update(s);
        }
        let (mean, std) = two_pass(&scores);
        assert!((b.mean - mean).abs() < 1e-9);
        assert!((b.std() - std).abs() < 1e-9);
        assert_eq!(b.count, scores.len() as u64);
    }

    #[test]
    fn std_is_zero_below_two_samples() {
        let mut b = WelfordBaseline::new();
        assert_eq!(b.std(), 0.0);
        b.update(50.0);
        assert_eq!(b.std(), 0.0);
        assert_eq!(b.mean, 50.0);
    }

    #[test]
    fn garbled_fields_reset_cleanly() {
        let b = WelfordBaseline::from_fields(Some("not-a-number"), None, Some("3x"));
        assert_eq!(b, WelfordBaseline::default());

        let b = WelfordBaseline::from_fields(Some("72.5"), Some("10.0"), Some("4"));
        assert_eq!(b.mean, 72.5);
        assert_eq!(b.count, 4);
    }
}
