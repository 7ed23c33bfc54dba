use serde::{Deserialize, Serialize};

use vigil_core::constants::{EMA_ALPHA, RECENT_PAYLOAD_CAP};
use vigil_core::payload::SensorPayload;

/// Per-run diagnostics returned alongside the composite score. Published to
/// the coordination store so operators can see *why* a device scored low.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustDiagnostics {
    pub accel_ema: f64,
    pub gyro_ema: f64,
    pub accel_std: f64,
    pub gyro_std: f64,
    pub accel_z: f64,
    pub gyro_z: f64,
    /// Shannon entropy of the touch-event series, in bits (max 1).
    pub touch_entropy: f64,
    /// Pearson correlation of the accel and gyro magnitude series.
    pub accel_gyro_corr: f64,
    pub network_spike_score: i64,
}

/// Compute the composite trust score for `current` against the device's
/// recent history (newest first, capped at 100 samples).
///
/// Component weights: accel 40%, gyro 30%, touch entropy 15%, motion 15%.
/// Each component is clamped to [0, 100], so the composite is as well.
pub fn compute_trust_score(
    current: &SensorPayload,
    history: &[SensorPayload],
) -> (i64, TrustDiagnostics) {
    let window = &history[..history.len().min(RECENT_PAYLOAD_CAP)];

    let mut accel_series: Vec<f64> = window.iter().map(|p| p.accel_magnitude()).collect();
    accel_series.push(current.accel_magnitude());
    let mut gyro_series: Vec<f64> = window.iter().map(|p| p.gyro_magnitude()).collect();
    gyro_series.push(current.gyro_magnitude());

    let accel_ema = ema(&accel_series, EMA_ALPHA);
    let gyro_ema = ema(&gyro_series, EMA_ALPHA);
    let accel_std = population_std(&accel_series);
    let gyro_std = population_std(&gyro_series);

    let accel_z = z_score(*accel_series.last().unwrap_or(&0.0), accel_ema, accel_std);
    let gyro_z = z_score(*gyro_series.last().unwrap_or(&0.0), gyro_ema, gyro_std);

    let mut touches: Vec<bool> = window.iter().map(|p| p.touch_event).collect();
    touches.push(current.touch_event);
    let touch_entropy = bool_entropy(&touches);

    let accel_gyro_corr = pearson(&accel_series, &gyro_series);

    // Lower z means closer to the device's own rhythm, hence more trust.
    let accel_score = clamp_score(100 - (accel_z * 20.0).round().min(100.0) as i64);
    let gyro_score = clamp_score(100 - (gyro_z * 20.0).round().min(100.0) as i64);
    let touch_score = clamp_score(100 - (touch_entropy * 50.0).round() as i64);
    let network_spike_score = clamp_score((current.motion_delta * 100.0).round() as i64);

    let composite = (0.40 * accel_score as f64
        + 0.30 * gyro_score as f64
        + 0.15 * touch_score as f64
        + 0.15 * network_spike_score as f64)
        .round() as i64;

    let diagnostics = TrustDiagnostics {
        accel_ema,
        gyro_ema,
        accel_std,
        gyro_std,
        accel_z,
        gyro_z,
        touch_entropy,
        accel_gyro_corr,
        network_spike_score,
    };
    (composite, diagnostics)
}

// ── Series math ──────────────────────────────────────────────────────────────

/// Exponential moving average seeded with the first sample.
fn ema(values: &[f64], alpha: f64) -> f64 {
    let mut iter = values.iter();
    let Some(first) = iter.next() else { return 0.0 };
    iter.fold(*first, |acc, v| alpha * v + (1.0 - alpha) * acc)
}

/// Population standard deviation; 0 for fewer than two samples.
fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Distance from the EMA in standard deviations; raw distance when std is 0.
fn z_score(value: f64, ema: f64, std: f64) -> f64 {
    if std > 0.0 {
        (value - ema).abs() / std
    } else {
        (value - ema).abs()
    }
}

/// Shannon entropy of a boolean series, in bits. A device whose touch events
/// are all identical (all true or all false) has entropy 0; a 50/50 mix has 1.
fn bool_entropy(values: &[bool]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let total = values.len() as f64;
    let p_true = values.iter().filter(|v| **v).count() as f64 / total;
    [p_true, 1.0 - p_true]
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.log2())
        .sum()
}

/// Pearson correlation coefficient; 0 when degenerate (n < 2, unequal
/// lengths, or a zero denominator).
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 || x.len() != y.len() {
        return 0.0;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let num: f64 = x.iter().zip(y).map(|(a, b)| (a - mean_x) * (b - mean_y)).sum();
    let den_x: f64 = x.iter().map(|a| (a - mean_x).powi(2)).sum();
    let den_y: f64 = y.iter().map(|b| (b - mean_y).powi(2)).sum();
    let den = (den_x * den_y).sqrt();
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn clamp_score(v: i64) -> i64 {
    v.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(accel: [f64; 3], gyro: [f64; 3], touch: bool, motion: f64) -> SensorPayload {
        SensorPayload {
            accelerometer: accel,
            gyroscope: gyro,
            overlay: 0.1,
            proximity: 1.0,
            touch_event: touch,
            motion_delta: motion,
            device_admin_enabled: true,
            accessibility_enabled: true,
        }
    }

    #[test]
    fn stable_real_motion_scores_high() {
        let history: Vec<SensorPayload> = (0..20)
            .map(|_| payload([0.05, 0.04, 0.06], [0.05, 0.04, 0.06], false, 0.6))
            .collect();
        let current = payload([0.06, 0.04, 0.05], [0.04, 0.05, 0.06], false, 0.7);

        let (score, diag) = compute_trust_score(&current, &history);
        assert!(score >= 60, "expected >= 60, got {score}");
        assert_eq!(diag.touch_entropy, 0.0);
    }

    #[test]
    fn flat_motion_after_constant_touch_scores_low() {
        // 50 identical low-motion samples with the touch sensor pinned on,
        // then a perfectly still sample: the signature of replayed input.
        let history: Vec<SensorPayload> = (0..50)
            .map(|_| payload([0.01, 0.01, 0.01], [0.01, 0.01, 0.01], true, 0.01))
            .collect();
        let current = payload([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], false, 0.0);

        let (score, diag) = compute_trust_score(&current, &history);
        assert!(score < 50, "expected < 50, got {score}");
        assert!(diag.touch_entropy > 0.0);
    }

    #[test]
    fn composite_stays_in_bounds() {
        let extremes = [
            payload([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], false, 0.0),
            payload([1e9, -1e9, 1e9], [1e9, 1e9, 1e9], true, 1e6),
            payload([-5.0, 3.0, 0.1], [0.0, 0.0, 0.0], true, -4.0),
        ];
        for current in &extremes {
            for history in [&extremes[..], &[]] {
                let (score, _) = compute_trust_score(current, history);
                assert!((0..=100).contains(&score), "score {score} out of bounds");
            }
        }
    }

    #[test]
    fn empty_history_uses_current_only() {
        let current = payload([0.1, 0.1, 0.1], [0.1, 0.1, 0.1], false, 0.5);
        let (score, diag) = compute_trust_score(&current, &[]);
        // Single sample: EMA equals the sample, std 0, z 0.
        assert_eq!(diag.accel_z, 0.0);
        assert_eq!(diag.gyro_z, 0.0);
        assert!(score > 50);
    }

    #[test]
    fn entropy_peaks_at_even_split() {
        assert_eq!(bool_entropy(&[]), 0.0);
        assert_eq!(bool_entropy(&[true, true]), 0.0);
        let e = bool_entropy(&[true, false, true, false]);
        assert!((e - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_degenerate_cases_are_zero() {
        assert_eq!(pearson(&[1.0], &[1.0]), 0.0);
        assert_eq!(pearson(&[1.0, 2.0], &[1.0]), 0.0);
        // Constant series: zero denominator.
        assert_eq!(pearson(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
        // Perfectly correlated.
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn history_beyond_cap_is_ignored() {
        let mut history: Vec<SensorPayload> = (0..RECENT_PAYLOAD_CAP)
            .map(|_| payload([0.2, 0.2, 0.2], [0.2, 0.2, 0.2], false, 0.5))
            .collect();
        let (capped, _) = compute_trust_score(
            &payload([0.2, 0.2, 0.2], [0.2, 0.2, 0.2], false, 0.5),
            &history,
        );
        // Wildly different samples past the cap must not change the result.
        history.extend((0..50).map(|_| payload([9.0, 9.0, 9.0], [9.0, 9.0, 9.0], true, 0.0)));
        let (extended, _) = compute_trust_score(
            &payload([0.2, 0.2, 0.2], [0.2, 0.2, 0.2], false, 0.5),
            &history,
        );
        assert_eq!(capped, extended);
    }
}
