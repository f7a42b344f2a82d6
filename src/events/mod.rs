// Note event module
// Event types, refinement, difficulty filtering and transcription backends

pub mod adapters;
pub mod backend;
pub mod difficulty;
pub mod refine;
pub mod types;

pub use adapters::{sanitize_events, NoteSequence, ServiceReply};
pub use backend::{
    finalize, BackendChain, BackendContext, ModelBackend, ServiceBackend, TranscriptionBackend, TranscriptionError,
};
pub use difficulty::{filter_by_difficulty, melodic_order, Difficulty};
pub use refine::{estimate_duration, refine_events, DurationConfig, RefineConfig};
pub use types::{velocity_from_energy, EventKey, NoteEvent, RawTranscription, TranscriptionResult};
