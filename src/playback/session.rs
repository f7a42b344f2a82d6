// Playback session
// Owns the clock-facing state for one transcription: scheduler, live
// detection and practice stepping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::audio::{SpectrumAnalyser, SpectrumConfig};
use crate::events::{filter_by_difficulty, Difficulty, NoteEvent, TranscriptionResult};
use crate::pitch::{LiveDetectorConfig, LiveDifficulty, Note};
use crate::playback::cue::{falling_notes, FallingNote};
use crate::playback::live::LiveTracker;
use crate::playback::practice::PracticeCursor;
use crate::playback::scheduler::{NoteScheduler, SchedulerConfig, SchedulerError, SchedulerState, SpawnEvent};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub scheduler: SchedulerConfig,
    pub live: LiveDetectorConfig,
    pub spectrum: SpectrumConfig,

    /// Sample rate of the audio fed to live detection
    pub sample_rate: u32,

    /// Only run live detection near the schedule's note starts
    pub gate_to_onsets: bool,

    /// Drive the live thresholds from the schedule difficulty instead of
    /// `live.difficulty`
    pub link_live_difficulty: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            scheduler: SchedulerConfig::default(),
            live: LiveDetectorConfig::default(),
            spectrum: SpectrumConfig::default(),
            sample_rate: 44100,
            gate_to_onsets: true,
            link_live_difficulty: false,
        }
    }
}

pub struct PlaybackSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    config: SessionConfig,
    transcription: TranscriptionResult,
    difficulty: Difficulty,
    schedule: Arc<[NoteEvent]>,
    scheduler: NoteScheduler,
    tracker: LiveTracker,
    analyser: SpectrumAnalyser,
    practice: Option<PracticeCursor>,
}

impl PlaybackSession {
    pub fn new(transcription: TranscriptionResult, difficulty: Difficulty, config: SessionConfig) -> Self {
        let analyser = SpectrumAnalyser::new(config.spectrum.clone());
        let tracker = LiveTracker::new(config.sample_rate, analyser.fft_size(), config.live.clone());

        let mut session = PlaybackSession {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            scheduler: NoteScheduler::new(config.scheduler.clone()),
            config,
            transcription,
            difficulty,
            schedule: Arc::from(Vec::new()),
            tracker,
            analyser,
            practice: None,
        };
        session.apply_difficulty(difficulty);

        log::info!(
            "Created playback session {} with {} of {} events",
            session.id,
            session.schedule.len(),
            session.transcription.all_events.len()
        );
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn transcription(&self) -> &TranscriptionResult {
        &self.transcription
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Events the learner is asked to play at the current difficulty
    pub fn schedule(&self) -> &[NoteEvent] {
        &self.schedule
    }

    pub fn live_difficulty(&self) -> LiveDifficulty {
        self.tracker.detector().config().difficulty
    }

    /// Set the live thresholds; `set_difficulty` overrides this when `link_live_difficulty` is on
    pub fn set_live_difficulty(&mut self, difficulty: LiveDifficulty) {
        self.tracker.set_difficulty(difficulty);
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn elapsed(&self, clock: f64) -> Option<f64> {
        self.scheduler.elapsed(clock)
    }

    /// Start playback with `clock` as time zero; leaves practice mode
    pub fn play(&mut self, clock: f64) -> Result<(), SchedulerError> {
        self.practice = None;
        self.tracker.clear();
        self.scheduler.start(clock)
    }

    pub fn pause(&mut self, clock: f64) -> Result<(), SchedulerError> {
        self.scheduler.pause(clock)
    }

    pub fn resume(&mut self, clock: f64) -> Result<(), SchedulerError> {
        self.scheduler.resume(clock)
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
        self.tracker.clear();
        self.analyser.reset();
        self.practice = None;
        log::info!("Stopped playback session {}", self.id);
    }

    /// Advance to `clock`, returning cues to spawn this frame
    pub fn tick(&mut self, clock: f64) -> Vec<SpawnEvent> {
        self.scheduler.tick(clock)
    }

    /// Re-filter the full transcription; safe while playing
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        if difficulty == self.difficulty {
            return;
        }
        log::info!("Session {} difficulty {:?} -> {:?}", self.id, self.difficulty, difficulty);
        self.apply_difficulty(difficulty);
    }

    fn apply_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.schedule = Arc::from(filter_by_difficulty(&self.transcription.all_events, difficulty));
        self.scheduler.load(Arc::clone(&self.schedule));

        if self.config.link_live_difficulty {
            self.tracker.set_difficulty(difficulty.into());
        }
        if self.config.gate_to_onsets {
            self.tracker.set_onsets(self.schedule.iter().map(|e| e.start).collect());
        }

        if self.practice.is_some() {
            self.practice = Some(PracticeCursor::new(Arc::clone(&self.schedule)));
        }
    }

    /// Run live detection on a byte magnitude frame
    /// `None` when the frame fell outside the onset gate
    pub fn live_frame(&mut self, clock: f64, frame: &[u8]) -> Option<Vec<Note>> {
        let elapsed = self.scheduler.elapsed(clock);
        self.tracker.process(elapsed, frame).map(<[Note]>::to_vec)
    }

    /// Run live detection on the most recent time-domain samples
    pub fn live_samples(&mut self, clock: f64, recent: &[f32]) -> Option<Vec<Note>> {
        let frame = self.analyser.frame(recent);
        self.live_frame(clock, &frame)
    }

    pub fn highlighted(&self) -> &[Note] {
        self.tracker.highlighted()
    }

    /// Stop playback and step through the schedule chord by chord
    pub fn start_practice(&mut self) -> &mut PracticeCursor {
        self.scheduler.stop();
        self.tracker.clear();
        self.practice.insert(PracticeCursor::new(Arc::clone(&self.schedule)))
    }

    pub fn practice(&self) -> Option<&PracticeCursor> {
        self.practice.as_ref()
    }

    pub fn practice_mut(&mut self) -> Option<&mut PracticeCursor> {
        self.practice.as_mut()
    }

    /// Renderer descriptors for the whole schedule
    pub fn falling_notes(&self) -> Vec<FallingNote> {
        falling_notes(&self.schedule)
    }
}
