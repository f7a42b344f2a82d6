// Notefall - audio to falling-note transcription and playback sync
// Module declarations

//! Turns a sample buffer into time-ordered note events, reduces them to a
//! learner's difficulty, and schedules falling-note cues against an external
//! playback clock.
//!
//! ```no_run
//! use notefall::{Difficulty, PlaybackSession, SampleBuffer, SessionConfig, TranscriptionEngine};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let buffer = SampleBuffer::new(44100, vec![0.0f32; 44100])?;
//! let result = TranscriptionEngine::default().transcribe(&buffer, Difficulty::Intermediate)?;
//!
//! let mut session = PlaybackSession::new(result, Difficulty::Intermediate, SessionConfig::default());
//! session.play(0.0)?;
//! for spawn in session.tick(0.016) {
//!     println!("spawn {} ({:.2}s ahead)", spawn.event.note, spawn.lead_secs);
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod events;
pub mod groove;
pub mod pipeline;
pub mod pitch;
pub mod playback;

pub use audio::{ingest_wav, AudioError, SampleBuffer};
pub use config::{ConfigError, EngineConfig};
pub use events::{
    filter_by_difficulty, BackendChain, Difficulty, NoteEvent, RawTranscription, TranscriptionBackend,
    TranscriptionError, TranscriptionResult,
};
pub use groove::TimeSignature;
pub use pipeline::{AnalysisConfig, AnalysisJob, AnalysisMode, CancelFlag, JobStatus, ProgressSink, TranscriptionEngine};
pub use pitch::{LiveDifficulty, LiveNoteDetector, Note};
pub use playback::{NoteScheduler, PlaybackSession, SchedulerConfig, SessionConfig, SpawnEvent};
