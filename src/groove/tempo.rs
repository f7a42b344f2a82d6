// Tempo Estimation - BPM from the median inter-onset interval
// Assumes onsets fall on a sixteenth-note grid

use serde::{Deserialize, Serialize};

/// Tempo estimation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Estimated beats per minute, clamped to the configured range
    pub bpm: u32,

    /// Median inter-onset interval in seconds (None when the default was used)
    pub median_interval: Option<f64>,

    /// Number of intervals the median was taken over
    pub interval_count: usize,
}

/// Configuration for tempo estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Minimum BPM reported
    pub min_bpm: u32,

    /// Maximum BPM reported
    pub max_bpm: u32,

    /// BPM used when there are too few onsets
    pub default_bpm: u32,

    /// Minimum number of onsets required for estimation
    pub min_onsets: usize,

    /// Only the first `max_onsets` onsets are considered
    pub max_onsets: usize,

    /// Onsets per beat the median interval is assumed to represent
    pub subdivisions: u32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            min_bpm: 60,
            max_bpm: 200,
            default_bpm: 120,
            min_onsets: 4,
            max_onsets: 50,
            subdivisions: 4,
        }
    }
}

/// Estimate tempo from onset times in seconds
pub fn estimate_tempo(onset_times: &[f64]) -> TempoEstimate {
    estimate_tempo_with_config(onset_times, &TempoConfig::default())
}

/// Estimate tempo with custom configuration
pub fn estimate_tempo_with_config(onset_times: &[f64], config: &TempoConfig) -> TempoEstimate {
    let fallback = TempoEstimate {
        bpm: config.default_bpm.clamp(config.min_bpm, config.max_bpm),
        median_interval: None,
        interval_count: 0,
    };

    if onset_times.len() < config.min_onsets {
        return fallback;
    }

    let considered = &onset_times[..onset_times.len().min(config.max_onsets)];
    let mut iois = compute_iois(considered);

    if iois.is_empty() {
        return fallback;
    }

    iois.sort_by(|a, b| a.total_cmp(b));
    let median = iois[iois.len() / 2];

    // Simultaneous onsets give a zero median; treat it as infinitely fast
    let raw_bpm = if median > 0.0 {
        60.0 / (median * config.subdivisions.max(1) as f64)
    } else {
        f64::INFINITY
    };

    let bpm = raw_bpm.clamp(config.min_bpm as f64, config.max_bpm as f64).round() as u32;

    log::debug!(
        "Tempo from {} intervals: median {:.4}s -> {:.1} BPM (reported {})",
        iois.len(),
        median,
        raw_bpm,
        bpm
    );

    TempoEstimate {
        bpm,
        median_interval: Some(median),
        interval_count: iois.len(),
    }
}

/// Compute inter-onset intervals (time between consecutive onsets)
fn compute_iois(times: &[f64]) -> Vec<f64> {
    times.windows(2).map(|w| w[1] - w[0]).collect()
}
