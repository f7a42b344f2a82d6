// Pitch estimation - note naming, offline autocorrelation, live peak picking

pub mod autocorrelation;
pub mod live;
pub mod note;

pub use autocorrelation::{estimate_pitch, AutocorrelationConfig, PitchEstimate};
pub use live::{LiveDetectorConfig, LiveDifficulty, LiveNoteDetector, LivePolicy, SpectralPeak};
pub use note::{frequency_to_midi, Note, NoteParseError};
