// Event refinement - duration estimation and cleanup of raw detections

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::audio::SampleBuffer;
use crate::events::types::NoteEvent;
use crate::pitch::Note;

/// Configuration for refinement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Events closer than this to the previous same-pitch event are dropped
    pub min_gap_secs: f64,

    /// Events shorter than this are dropped
    pub min_duration_secs: f64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        RefineConfig {
            min_gap_secs: 0.025,
            min_duration_secs: 0.025,
        }
    }
}

/// Configuration for note duration estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationConfig {
    /// A block whose peak amplitude is below this ends the note
    pub silence_threshold: f32,

    /// Longest duration reported
    pub max_secs: f64,

    /// Used when no decay is found or the note is silent from the start
    pub default_secs: f64,

    /// Envelope block length; peaks are taken per block so that zero
    /// crossings inside a sounding note do not end it
    pub envelope_window_secs: f64,
}

impl Default for DurationConfig {
    fn default() -> Self {
        DurationConfig {
            silence_threshold: 0.001,
            max_secs: 2.0,
            default_secs: 0.2,
            envelope_window_secs: 0.02,
        }
    }
}

/// Drop near-duplicate and too-short events
///
/// Each event is compared with the previous event of the same pitch in
/// input order, whether or not that one was kept, so a run of repeated
/// detections collapses to its first member.
pub fn refine_events(events: &[NoteEvent], config: &RefineConfig) -> Vec<NoteEvent> {
    let mut last_seen: HashMap<Note, f64> = HashMap::new();
    let mut refined = Vec::with_capacity(events.len());

    for event in events {
        let previous = last_seen.insert(event.note, event.start);

        if let Some(prev_start) = previous {
            if (event.start - prev_start).abs() < config.min_gap_secs {
                continue;
            }
        }

        if event.duration < config.min_duration_secs {
            continue;
        }

        refined.push(*event);
    }

    if refined.len() != events.len() {
        log::debug!("Refinement kept {} of {} events", refined.len(), events.len());
    }

    refined
}

/// Estimate how long a note starting at `start_sample` rings
pub fn estimate_duration(buffer: &SampleBuffer, start_sample: usize, config: &DurationConfig) -> f64 {
    let samples = buffer.samples();
    if start_sample >= samples.len() {
        return config.default_secs;
    }

    let block = buffer.samples_for(config.envelope_window_secs).max(1);
    let limit = (start_sample + buffer.samples_for(config.max_secs)).min(samples.len());

    let mut offset = start_sample;
    while offset < limit {
        let end = (offset + block).min(limit);
        let peak = samples[offset..end].iter().fold(0.0f32, |m, v| m.max(v.abs()));

        if peak < config.silence_threshold {
            if offset == start_sample {
                return config.default_secs;
            }
            return buffer.time_at(offset - start_sample);
        }

        offset = end;
    }

    config.default_secs
}
