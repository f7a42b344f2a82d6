// Preprocessing - band-limit and loudness-normalize samples before analysis
// One-pole IIR high-pass and low-pass followed by RMS normalization

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::audio::{AudioError, SampleBuffer};

/// Configuration for the preprocessing chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// High-pass cutoff in Hz (removes rumble and DC)
    pub high_pass_hz: f64,

    /// Low-pass cutoff in Hz (removes hiss above the piano range)
    pub low_pass_hz: f64,

    /// RMS level the filtered signal is scaled to
    pub target_rms: f32,

    /// Added to the measured RMS so silent input does not divide by zero
    pub epsilon: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        PreprocessConfig {
            high_pass_hz: 70.0,
            low_pass_hz: 12000.0,
            target_rms: 0.1,
            epsilon: 1e-4,
        }
    }
}

/// Filter and normalize a buffer
/// Output has the same length and sample rate as the input
pub fn preprocess(buffer: &SampleBuffer, config: &PreprocessConfig) -> Result<SampleBuffer, AudioError> {
    if buffer.is_empty() {
        return Err(AudioError::InvalidInput("empty audio buffer".to_string()));
    }

    let sample_rate = buffer.sample_rate();
    let filtered = high_pass(buffer.samples(), sample_rate, config.high_pass_hz);
    let filtered = low_pass(&filtered, sample_rate, config.low_pass_hz);
    let normalized = normalize_rms(&filtered, config.target_rms, config.epsilon);

    Ok(buffer.with_samples(normalized))
}

/// One-pole high-pass: y[i] = a * (y[i-1] + x[i] - x[i-1])
pub fn high_pass(data: &[f32], sample_rate: u32, cutoff_hz: f64) -> Vec<f32> {
    if data.is_empty() {
        return Vec::new();
    }

    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let dt = 1.0 / sample_rate as f64;
    let alpha = (rc / (rc + dt)) as f32;

    let mut filtered = Vec::with_capacity(data.len());
    filtered.push(data[0]);

    for i in 1..data.len() {
        let y = alpha * (filtered[i - 1] + data[i] - data[i - 1]);
        filtered.push(y);
    }

    filtered
}

/// One-pole low-pass: y[i] = y[i-1] + a * (x[i] - y[i-1])
pub fn low_pass(data: &[f32], sample_rate: u32, cutoff_hz: f64) -> Vec<f32> {
    if data.is_empty() {
        return Vec::new();
    }

    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let dt = 1.0 / sample_rate as f64;
    let alpha = (dt / (rc + dt)) as f32;

    let mut filtered = Vec::with_capacity(data.len());
    filtered.push(data[0]);

    for i in 1..data.len() {
        let y = filtered[i - 1] + alpha * (data[i] - filtered[i - 1]);
        filtered.push(y);
    }

    filtered
}

/// Root mean square of a signal (0.0 for empty input)
pub fn rms(data: &[f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }

    let sum: f64 = data.iter().map(|&v| (v as f64) * (v as f64)).sum();
    (sum / data.len() as f64).sqrt() as f32
}

/// Scale a signal so its RMS approaches `target_rms`
fn normalize_rms(data: &[f32], target_rms: f32, epsilon: f32) -> Vec<f32> {
    let gain = target_rms / (rms(data) + epsilon);
    data.iter().map(|v| v * gain).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_preprocess_preserves_shape() {
        for len in [1usize, 2, 17, 4410] {
            let buffer = SampleBuffer::new(44100, sine(440.0, 44100, len, 0.5)).unwrap();
            let cleaned = preprocess(&buffer, &PreprocessConfig::default()).unwrap();

            assert_eq!(cleaned.len(), buffer.len());
            assert_eq!(cleaned.sample_rate(), buffer.sample_rate());
        }
    }

    #[test]
    fn test_empty_buffer_is_invalid_input() {
        let buffer = SampleBuffer::new(44100, Vec::<f32>::new()).unwrap();
        let result = preprocess(&buffer, &PreprocessConfig::default());
        assert!(matches!(result, Err(AudioError::InvalidInput(_))));
    }

    #[test]
    fn test_silence_stays_silent() {
        let buffer = SampleBuffer::new(44100, vec![0.0; 1000]).unwrap();
        let cleaned = preprocess(&buffer, &PreprocessConfig::default()).unwrap();
        assert!(cleaned.samples().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_normalizes_to_target_rms() {
        let buffer = SampleBuffer::new(44100, sine(440.0, 44100, 44100, 0.8)).unwrap();
        let cleaned = preprocess(&buffer, &PreprocessConfig::default()).unwrap();

        let level = rms(cleaned.samples());
        assert!((level - 0.1).abs() < 0.001, "rms was {}", level);
    }

    #[test]
    fn test_high_pass_removes_dc() {
        let dc = vec![0.5f32; 44100];
        let filtered = high_pass(&dc, 44100, 70.0);

        // First sample passes through, tail decays toward zero
        assert_eq!(filtered[0], 0.5);
        assert!(filtered[44099].abs() < 1e-3);
    }

    #[test]
    fn test_low_pass_attenuates_nyquist() {
        let alternating: Vec<f32> = (0..4410).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let filtered = low_pass(&alternating, 44100, 1000.0);

        let tail_peak = filtered[4000..].iter().fold(0.0f32, |m, v| m.max(v.abs()));
        assert!(tail_peak < 0.2, "tail peak was {}", tail_peak);
    }
}
