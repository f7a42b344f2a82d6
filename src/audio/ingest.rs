// Audio ingestion module
// Decodes WAV bytes into a SampleBuffer for the analysis pipeline

use hound::{SampleFormat, WavReader};
use std::io::Cursor;

use crate::audio::{AudioError, SampleBuffer};

/// Header metadata of an ingested WAV file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub frame_count: usize,
}

/// Ingest a WAV file from raw bytes
/// Returns the first channel normalized to f32 [-1.0, 1.0]
pub fn ingest_wav(data: &[u8]) -> Result<SampleBuffer, AudioError> {
    ingest_wav_with_info(data).map(|(buffer, _)| buffer)
}

/// Ingest a WAV file and also return its header metadata
pub fn ingest_wav_with_info(data: &[u8]) -> Result<(SampleBuffer, WavInfo), AudioError> {
    let mut reader = WavReader::new(Cursor::new(data))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    // Read and normalize interleaved samples to f32 [-1.0, 1.0]
    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 128.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 8388608.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 2147483648.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} {}-bit audio",
                format, bits
            )));
        }
    };

    // Analysis runs on the first channel only
    let first_channel: Vec<f32> = interleaved.iter().step_by(channels).copied().collect();

    let info = WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bit_depth: spec.bits_per_sample,
        frame_count: first_channel.len(),
    };

    log::debug!(
        "Ingested WAV: {} Hz, {} channels, {} bit, {} frames",
        info.sample_rate,
        info.channels,
        info.bit_depth,
        info.frame_count
    );

    let buffer = SampleBuffer::new(spec.sample_rate, first_channel)?;
    Ok((buffer, info))
}
