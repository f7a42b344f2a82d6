// Onset detection - energy-rise detector over a sliding window
// Fires when window energy jumps above a smoothed history of recent energy,
// so the threshold follows the overall loudness of the track

use serde::{Deserialize, Serialize};

use crate::audio::SampleBuffer;

/// Onset detection result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnsetMark {
    /// Time of the window start in seconds
    pub time: f64,

    /// Mean squared amplitude of the window that fired
    pub energy: f32,
}

/// Configuration for onset detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// Analysis window length in seconds
    pub window_secs: f64,

    /// Advance between windows in seconds
    pub hop_secs: f64,

    /// Energy must exceed `rise_ratio` times the smoothed previous energy
    pub rise_ratio: f32,

    /// Absolute energy floor; nothing at or below it is an onset
    pub min_energy: f32,

    /// Weight of the previous smoothed value in the running average
    pub smoothing: f32,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        OnsetConfig {
            window_secs: 0.05,
            hop_secs: 0.01,
            rise_ratio: 1.5,
            min_energy: 0.001,
            smoothing: 0.9,
        }
    }
}

/// Incremental onset scanner
///
/// `advance` processes a bounded number of windows per call so a host can
/// interleave onset detection with other work.
#[derive(Debug, Clone)]
pub struct OnsetDetector {
    config: OnsetConfig,
    window_size: usize,
    hop_size: usize,
    position: usize,
    smoothed_energy: f32,
}

impl OnsetDetector {
    pub fn new(config: OnsetConfig, sample_rate: u32) -> Self {
        let window_size = ((sample_rate as f64 * config.window_secs).floor() as usize).max(1);
        let hop_size = ((sample_rate as f64 * config.hop_secs).floor() as usize).max(1);

        OnsetDetector {
            config,
            window_size,
            hop_size,
            position: 0,
            smoothed_energy: 0.0,
        }
    }

    /// Total number of windows this detector will visit for `len` samples
    pub fn total_windows(&self, len: usize) -> usize {
        if len <= self.window_size {
            return 0;
        }
        (len - self.window_size - 1) / self.hop_size + 1
    }

    /// Windows processed so far
    pub fn visited_windows(&self) -> usize {
        self.position / self.hop_size
    }

    /// Whether every window of `samples` has been visited
    pub fn is_finished(&self, samples: &[f32]) -> bool {
        self.position + self.window_size >= samples.len()
    }

    /// Process up to `max_windows` windows, returning onsets found in them
    pub fn advance(&mut self, buffer: &SampleBuffer, max_windows: usize) -> Vec<OnsetMark> {
        let samples = buffer.samples();
        let mut onsets = Vec::new();
        let mut processed = 0;

        while processed < max_windows && !self.is_finished(samples) {
            let window = &samples[self.position..self.position + self.window_size];
            let energy = mean_square(window);

            if energy > self.smoothed_energy * self.config.rise_ratio && energy > self.config.min_energy {
                onsets.push(OnsetMark {
                    time: buffer.time_at(self.position),
                    energy,
                });
            }

            let w = self.config.smoothing;
            self.smoothed_energy = self.smoothed_energy * w + energy * (1.0 - w);

            self.position += self.hop_size;
            processed += 1;
        }

        onsets
    }
}

/// Detect every onset in a buffer
pub fn detect_onsets(buffer: &SampleBuffer, config: &OnsetConfig) -> Vec<OnsetMark> {
    let mut detector = OnsetDetector::new(config.clone(), buffer.sample_rate());
    detector.advance(buffer, usize::MAX)
}

/// Mean squared amplitude of a window
pub fn mean_square(window: &[f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().map(|v| v * v).sum::<f32>() / window.len() as f32
}
