// Audio processing module
// Sample buffers, WAV ingestion, preprocessing, onset detection and live spectra

pub mod buffer;
pub mod ingest;
pub mod onset;
pub mod preprocess;
pub mod spectrum;

use thiserror::Error;

pub use buffer::SampleBuffer;
pub use ingest::{ingest_wav, ingest_wav_with_info, WavInfo};
pub use onset::{detect_onsets, OnsetConfig, OnsetDetector, OnsetMark};
pub use preprocess::{preprocess, PreprocessConfig};
pub use spectrum::{SpectrumAnalyser, SpectrumConfig};

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    #[error("Failed to read WAV file: {0}")]
    WavRead(#[from] hound::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}
