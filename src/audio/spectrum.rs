// Live spectrum analyser
// Produces byte-scaled magnitude frames (0-255) for the real-time note detector

use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::sync::Arc;

/// Configuration for the spectrum analyser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// FFT size in samples (power of 2)
    pub fft_size: usize,

    /// Weight of the previous frame when smoothing magnitudes [0.0, 1.0)
    pub smoothing: f32,

    /// Level mapped to byte 0
    pub min_db: f32,

    /// Level mapped to byte 255
    pub max_db: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        SpectrumConfig {
            fft_size: 8192,
            smoothing: 0.75,
            min_db: -85.0,
            max_db: -15.0,
        }
    }
}

/// Stateful analyser: smoothing carries over between frames
pub struct SpectrumAnalyser {
    config: SpectrumConfig,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(config: SpectrumConfig) -> Self {
        let fft_size = config.fft_size.max(2);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        SpectrumAnalyser {
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            fft,
            config: SpectrumConfig { fft_size, ..config },
        }
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    /// Number of magnitude bins per frame
    pub fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Width of one bin in Hz
    pub fn bin_width(&self, sample_rate: u32) -> f32 {
        sample_rate as f32 / self.config.fft_size as f32
    }

    /// Analyse the most recent `fft_size` samples and return a byte frame
    /// Shorter input is zero-padded at the front
    pub fn frame(&mut self, recent: &[f32]) -> Vec<u8> {
        let n = self.config.fft_size;
        let mut input = vec![0.0f32; n];
        let take = recent.len().min(n);
        input[n - take..].copy_from_slice(&recent[recent.len() - take..]);

        for (sample, w) in input.iter_mut().zip(&self.window) {
            *sample *= w;
        }

        let mut spectrum = self.fft.make_output_vec();
        if self.fft.process(&mut input, &mut spectrum).is_err() {
            // Buffer lengths come from the planner, so this only guards against misuse
            return vec![0; self.bin_count()];
        }

        let tau = self.config.smoothing.clamp(0.0, 0.999);
        let range = (self.config.max_db - self.config.min_db).max(f32::EPSILON);

        self.smoothed
            .iter_mut()
            .zip(spectrum.iter())
            .map(|(prev, c)| {
                let magnitude = c.norm() / n as f32;
                *prev = tau * *prev + (1.0 - tau) * magnitude;

                let db = 20.0 * prev.max(1e-12).log10();
                let scaled = 255.0 * (db - self.config.min_db) / range;
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Forget smoothing history (e.g. when playback restarts)
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// Blackman window of length `n`
fn blackman_window(n: usize) -> Vec<f32> {
    let a0 = 0.42;
    let a1 = 0.5;
    let a2 = 0.08;

    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}
