// Autocorrelation pitch estimation
// Finds the lag (period) at which a window best matches itself

use serde::{Deserialize, Serialize};

/// Configuration for the autocorrelation estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutocorrelationConfig {
    /// Lowest detectable frequency in Hz (sets the longest lag)
    pub min_frequency: f64,

    /// Highest detectable frequency in Hz (sets the shortest lag)
    pub max_frequency: f64,

    /// Remove the mean and normalize each lag by the window energies
    pub normalized: bool,

    /// Best correlation below this is rejected
    pub min_correlation: f32,
}

impl Default for AutocorrelationConfig {
    /// Full 88-key range (A0..C8), plain correlation
    fn default() -> Self {
        AutocorrelationConfig {
            min_frequency: 27.5,
            max_frequency: 4186.0,
            normalized: false,
            min_correlation: 0.0,
        }
    }
}

/// Pitch found in one analysis window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Fundamental frequency in Hz (sample_rate / period)
    pub frequency: f64,

    /// Winning lag in samples
    pub period: usize,

    /// Correlation at the winning lag
    pub correlation: f32,
}

/// Estimate the fundamental of a window
/// Returns `None` when no lag correlates above the configured floor
pub fn estimate_pitch(window: &[f32], sample_rate: u32, config: &AutocorrelationConfig) -> Option<PitchEstimate> {
    if window.len() < 2 || sample_rate == 0 || config.max_frequency <= 0.0 || config.min_frequency <= 0.0 {
        return None;
    }

    let min_period = ((sample_rate as f64 / config.max_frequency).floor() as usize).max(1);
    let max_period = ((sample_rate as f64 / config.min_frequency).floor() as usize).min(window.len() - 1);

    if min_period > max_period {
        return None;
    }

    let (period, correlation) = if config.normalized {
        best_normalized_lag(window, min_period, max_period)
    } else {
        best_plain_lag(window, min_period, max_period)
    }?;

    if correlation < config.min_correlation {
        return None;
    }

    Some(PitchEstimate {
        frequency: sample_rate as f64 / period as f64,
        period,
        correlation,
    })
}

/// Plain autocorrelation: sum of x[i] * x[i + p]
/// Only strictly positive correlations can win
fn best_plain_lag(window: &[f32], min_period: usize, max_period: usize) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    let mut best_correlation = 0.0f32;

    for period in min_period..=max_period {
        let correlation: f32 = window
            .iter()
            .zip(&window[period..])
            .map(|(a, b)| a * b)
            .sum();

        if correlation > best_correlation {
            best_correlation = correlation;
            best = Some((period, correlation));
        }
    }

    best
}

/// Mean-removed autocorrelation normalized to [-1, 1]
fn best_normalized_lag(window: &[f32], min_period: usize, max_period: usize) -> Option<(usize, f32)> {
    let mean = window.iter().sum::<f32>() / window.len() as f32;
    let centered: Vec<f32> = window.iter().map(|s| s - mean).collect();

    let mut best: Option<(usize, f32)> = None;

    for period in min_period..=max_period {
        let mut correlation = 0.0f32;
        let mut norm_head = 0.0f32;
        let mut norm_tail = 0.0f32;

        for (a, b) in centered.iter().zip(&centered[period..]) {
            correlation += a * b;
            norm_head += a * a;
            norm_tail += b * b;
        }

        let normalized = correlation / (norm_head * norm_tail + 1e-4).sqrt();

        if best.map_or(true, |(_, c)| normalized > c) {
            best = Some((period, normalized));
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::Note;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_silence_has_no_pitch() {
        let window = vec![0.0; 4096];
        assert!(estimate_pitch(&window, 44100, &AutocorrelationConfig::default()).is_none());

        let normalized = AutocorrelationConfig {
            normalized: true,
            min_correlation: 0.3,
            ..Default::default()
        };
        assert!(estimate_pitch(&window, 44100, &normalized).is_none());
    }

    #[test]
    fn test_a440_plain() {
        let window = sine(440.0, 44100, 4096);
        let estimate = estimate_pitch(&window, 44100, &AutocorrelationConfig::default()).unwrap();

        let midi = Note::from_frequency(estimate.frequency).unwrap().midi() as i32;
        assert!((midi - 69).abs() <= 1, "estimated {} Hz", estimate.frequency);
        assert_eq!(estimate.period, 100);
    }

    #[test]
    fn test_a440_normalized() {
        let window = sine(440.0, 44100, 8192);
        let config = AutocorrelationConfig {
            min_frequency: 60.0,
            max_frequency: 2500.0,
            normalized: true,
            min_correlation: 0.3,
        };
        let estimate = estimate_pitch(&window, 44100, &config).unwrap();

        assert!(estimate.correlation > 0.9);
        // Normalized scores do not decay with lag, so a whole multiple of the
        // true period can win
        let true_period = 44100.0 / 440.0;
        let multiple = (estimate.period as f64 / true_period).round();
        assert!(multiple >= 1.0);
        assert!((estimate.period as f64 - multiple * true_period).abs() < 1.0, "period {}", estimate.period);
    }

    #[test]
    fn test_low_note() {
        // A2 = 110 Hz
        let window = sine(110.0, 44100, 4096);
        let estimate = estimate_pitch(&window, 44100, &AutocorrelationConfig::default()).unwrap();
        assert_eq!(Note::from_frequency(estimate.frequency).unwrap().to_string(), "A2");
    }

    #[test]
    fn test_correlation_floor_rejects_weak_signal() {
        let window = sine(440.0, 44100, 4096)
            .into_iter()
            .map(|s| s * 1e-3)
            .collect::<Vec<_>>();
        let config = AutocorrelationConfig {
            min_correlation: 0.1,
            ..Default::default()
        };
        assert!(estimate_pitch(&window, 44100, &config).is_none());
    }

    #[test]
    fn test_tiny_window() {
        assert!(estimate_pitch(&[0.5], 44100, &AutocorrelationConfig::default()).is_none());
    }
}
