// Live detection gate
// Runs the spectral detector on frames near known onsets, or on every
// frame when no onsets are known

use crate::pitch::{LiveDetectorConfig, LiveDifficulty, LiveNoteDetector, Note};

/// Half-width of the window around an onset in which frames are analysed
pub const ONSET_GATE_SECS: f64 = 0.05;

pub struct LiveTracker {
    detector: LiveNoteDetector,
    onset_times: Vec<f64>,
    gate_secs: f64,
    highlighted: Vec<Note>,
}

impl LiveTracker {
    pub fn new(sample_rate: u32, fft_size: usize, config: LiveDetectorConfig) -> Self {
        LiveTracker {
            detector: LiveNoteDetector::new(sample_rate, fft_size, config),
            onset_times: Vec::new(),
            gate_secs: ONSET_GATE_SECS,
            highlighted: Vec::new(),
        }
    }

    /// Restrict detection to frames near these times
    pub fn set_onsets(&mut self, mut times: Vec<f64>) {
        times.retain(|t| t.is_finite());
        times.sort_by(f64::total_cmp);
        self.onset_times = times;
    }

    pub fn onset_times(&self) -> &[f64] {
        &self.onset_times
    }

    pub fn set_difficulty(&mut self, difficulty: LiveDifficulty) {
        self.detector.set_difficulty(difficulty);
    }

    pub fn detector(&self) -> &LiveNoteDetector {
        &self.detector
    }

    /// Notes found by the last frame that was analysed
    pub fn highlighted(&self) -> &[Note] {
        &self.highlighted
    }

    /// Whether a frame at playback time `elapsed` should be analysed
    pub fn should_detect(&self, elapsed: Option<f64>) -> bool {
        if self.onset_times.is_empty() {
            return true;
        }
        let Some(t) = elapsed else {
            return false;
        };

        let idx = self.onset_times.partition_point(|&onset| onset < t);
        let near = |i: usize| {
            self.onset_times
                .get(i)
                .is_some_and(|&onset| (onset - t).abs() < self.gate_secs)
        };

        near(idx) || (idx > 0 && near(idx - 1))
    }

    /// Analyse a frame if the gate is open
    ///
    /// Returns the notes found, or `None` when the frame was skipped; a
    /// skipped frame leaves the previous highlight in place.
    pub fn process(&mut self, elapsed: Option<f64>, frame: &[u8]) -> Option<&[Note]> {
        if !self.should_detect(elapsed) {
            return None;
        }

        self.highlighted = self.detector.detect(frame);
        Some(&self.highlighted)
    }

    pub fn clear(&mut self) {
        self.highlighted.clear();
    }
}
