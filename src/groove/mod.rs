// Groove - tempo, time signature and grid quantization

pub mod grid;
pub mod quantize;
pub mod tempo;

pub use grid::{beat_secs, sixteenth_secs, TimeSignature, TimeSignatureError};
pub use quantize::{quantize_events, quantize_time, QuantizeSettings, Quantized};
pub use tempo::{estimate_tempo, estimate_tempo_with_config, TempoConfig, TempoEstimate};
