// Sample buffer - immutable mono PCM at a fixed sample rate
// Every processing stage produces a new buffer instead of mutating its input

use std::sync::Arc;

use crate::audio::AudioError;

/// Mono audio samples in [-1.0, 1.0] plus their sample rate
///
/// Samples are held behind an `Arc` so clones are cheap and the engine can
/// hand the same buffer to several stages without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create a buffer from raw samples
    /// Empty buffers are allowed here; analysis rejects them later
    pub fn new(sample_rate: u32, samples: impl Into<Arc<[f32]>>) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(sample_rate));
        }

        Ok(SampleBuffer {
            samples: samples.into(),
            sample_rate,
        })
    }

    /// Build a new buffer with the same sample rate
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        SampleBuffer {
            samples: samples.into(),
            sample_rate: self.sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert a time in seconds to a sample index (floored)
    pub fn sample_at(&self, time_secs: f64) -> usize {
        (time_secs.max(0.0) * self.sample_rate as f64).floor() as usize
    }

    /// Convert a sample index to seconds
    pub fn time_at(&self, sample: usize) -> f64 {
        sample as f64 / self.sample_rate as f64
    }

    /// Number of samples covering `secs` seconds (floored)
    pub fn samples_for(&self, secs: f64) -> usize {
        (self.sample_rate as f64 * secs).floor() as usize
    }
}
