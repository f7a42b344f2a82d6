// Note scheduler
// Emits one spawn per event, `fall_duration_secs` before the event sounds,
// driven entirely by clock readings the host passes in

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::events::{EventKey, NoteEvent};
use crate::playback::cue::FallingNote;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("Clock reading is not finite: {0}")]
    InvalidClock(f64),

    #[error("Scheduler is not running")]
    NotRunning,

    #[error("Scheduler is not paused")]
    NotPaused,
}

/// Spawn timing
///
/// Without `catch_up` every tick only looks at `(horizon - poll_window, horizon]`,
/// so events starting earlier than `fall_duration_secs - poll_window_secs`
/// after playback begins are never spawned. Hosts that need cues for the
/// opening notes should enable `catch_up` or delay the audio by the fall
/// duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Lead time between a spawn and the event's start
    pub fall_duration_secs: f64,

    /// Width of each tick's spawn window; should cover one frame interval
    pub poll_window_secs: f64,

    /// Extend each window back to the previous tick so slow frames never skip events
    pub catch_up: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            fall_duration_secs: 2.0,
            poll_window_secs: 0.05,
            catch_up: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
    Paused,
}

/// Notification that an event's cue should begin falling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnEvent {
    pub event: NoteEvent,

    /// Playback time (seconds since start) of the tick that spawned it
    pub elapsed: f64,

    /// Seconds until the event sounds; at most the fall duration
    pub lead_secs: f64,
}

impl SpawnEvent {
    pub fn cue(&self) -> Option<FallingNote> {
        FallingNote::from_event(&self.event)
    }
}

/// Clock-driven spawn state machine
///
/// Idle -> Running -> (Paused <-> Running) -> Idle. The event list is shared,
/// the scheduler only owns its spawned-set bookkeeping.
#[derive(Debug, Clone)]
pub struct NoteScheduler {
    config: SchedulerConfig,
    schedule: Arc<[NoteEvent]>,
    spawned: HashSet<EventKey>,
    state: SchedulerState,
    reference_clock: f64,
    paused_at: Option<f64>,
    last_horizon: Option<f64>,
}

impl NoteScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        NoteScheduler {
            config,
            schedule: Arc::from(Vec::new()),
            spawned: HashSet::new(),
            state: SchedulerState::Idle,
            reference_clock: 0.0,
            paused_at: None,
            last_horizon: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn schedule(&self) -> &Arc<[NoteEvent]> {
        &self.schedule
    }

    /// Replace the event list
    ///
    /// Events already spawned stay spawned, so swapping in a re-filtered
    /// version of the same transcription mid-playback never repeats a cue.
    pub fn load(&mut self, schedule: Arc<[NoteEvent]>) {
        self.schedule = schedule;
    }

    /// Begin a new run with `clock` as playback time zero
    pub fn start(&mut self, clock: f64) -> Result<(), SchedulerError> {
        check_clock(clock)?;

        self.spawned.clear();
        self.reference_clock = clock;
        self.paused_at = None;
        self.last_horizon = None;
        self.state = SchedulerState::Running;

        log::info!("Scheduler started at clock {:.3} with {} events", clock, self.schedule.len());
        Ok(())
    }

    /// Freeze playback time at `clock`
    pub fn pause(&mut self, clock: f64) -> Result<(), SchedulerError> {
        check_clock(clock)?;
        if self.state != SchedulerState::Running {
            return Err(SchedulerError::NotRunning);
        }

        self.paused_at = Some(clock);
        self.state = SchedulerState::Paused;
        log::debug!("Scheduler paused at elapsed {:.3}", clock - self.reference_clock);
        Ok(())
    }

    /// Continue from where `pause` left off
    pub fn resume(&mut self, clock: f64) -> Result<(), SchedulerError> {
        check_clock(clock)?;
        let Some(paused_at) = self.paused_at.take() else {
            return Err(SchedulerError::NotPaused);
        };

        // Shift the reference so the paused interval does not count
        self.reference_clock += clock - paused_at;
        self.state = SchedulerState::Running;
        log::debug!("Scheduler resumed after {:.3}s pause", clock - paused_at);
        Ok(())
    }

    /// Return to Idle and forget everything spawned
    pub fn stop(&mut self) {
        if self.state != SchedulerState::Idle {
            log::info!("Scheduler stopped after {} spawns", self.spawned.len());
        }

        self.spawned.clear();
        self.paused_at = None;
        self.last_horizon = None;
        self.state = SchedulerState::Idle;
    }

    /// Playback time at `clock`, frozen while paused
    pub fn elapsed(&self, clock: f64) -> Option<f64> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Running => Some(clock - self.reference_clock),
            SchedulerState::Paused => self.paused_at.map(|p| p - self.reference_clock),
        }
    }

    /// Spawn every unspawned event whose start falls in this tick's window
    pub fn tick(&mut self, clock: f64) -> Vec<SpawnEvent> {
        if self.state != SchedulerState::Running {
            return Vec::new();
        }
        if !clock.is_finite() {
            log::warn!("Ignoring tick with non-finite clock {}", clock);
            return Vec::new();
        }

        let elapsed = clock - self.reference_clock;
        let horizon = elapsed + self.config.fall_duration_secs;
        let window_floor = horizon - self.config.poll_window_secs;

        let lower = if self.config.catch_up {
            self.last_horizon.unwrap_or(f64::NEG_INFINITY).min(window_floor)
        } else {
            window_floor
        };

        let mut spawns = Vec::new();
        for event in self.schedule.iter() {
            if event.start > lower && event.start <= horizon && self.spawned.insert(event.key()) {
                spawns.push(SpawnEvent {
                    event: *event,
                    elapsed,
                    lead_secs: event.start - elapsed,
                });
            }
        }

        self.last_horizon = Some(self.last_horizon.map_or(horizon, |h| h.max(horizon)));

        for spawn in &spawns {
            log::debug!("Spawned {} at elapsed {:.3} (lead {:.3}s)", spawn.event.note, elapsed, spawn.lead_secs);
        }

        spawns
    }

    pub fn spawned_count(&self) -> usize {
        self.spawned.len()
    }

    pub fn is_spawned(&self, event: &NoteEvent) -> bool {
        self.spawned.contains(&event.key())
    }

    /// Whether every scheduled event has been spawned
    pub fn is_exhausted(&self) -> bool {
        self.schedule.iter().all(|e| self.spawned.contains(&e.key()))
    }
}

impl Default for NoteScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

fn check_clock(clock: f64) -> Result<(), SchedulerError> {
    if clock.is_finite() {
        Ok(())
    } else {
        Err(SchedulerError::InvalidClock(clock))
    }
}
