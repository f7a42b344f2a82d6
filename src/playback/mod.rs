// Playback module
// Clock-driven note spawning, live detection gating and practice stepping

pub mod cue;
pub mod live;
pub mod practice;
pub mod scheduler;
pub mod session;

pub use cue::{falling_notes, FallingNote};
pub use live::{LiveTracker, ONSET_GATE_SECS};
pub use practice::PracticeCursor;
pub use scheduler::{NoteScheduler, SchedulerConfig, SchedulerError, SchedulerState, SpawnEvent};
pub use session::{PlaybackSession, SessionConfig};
