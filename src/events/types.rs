// Note event types
// Events, transcription results and the raw backend output they are built from

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::groove::TimeSignature;
use crate::pitch::Note;

/// A single transcribed note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    /// Pitch, serialized by name ("C#4")
    pub note: Note,

    /// Onset in seconds from the start of the audio
    pub start: f64,

    /// Length in seconds
    pub duration: f64,

    /// Loudness [0, 127]
    pub velocity: u8,
}

/// Identity used to tell events apart: pitch plus exact start time
pub type EventKey = (Note, u64);

impl NoteEvent {
    pub fn new(note: Note, start: f64, duration: f64, velocity: u8) -> Self {
        NoteEvent {
            note,
            start,
            duration,
            velocity: velocity.min(127),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn key(&self) -> EventKey {
        (self.note, self.start.to_bits())
    }

    /// Order by start time, then by pitch
    pub fn chronological(a: &NoteEvent, b: &NoteEvent) -> Ordering {
        a.start.total_cmp(&b.start).then(a.note.cmp(&b.note))
    }
}

/// Velocity from a window energy: floor(energy * scale), capped at 127
pub fn velocity_from_energy(energy: f32, scale: f32) -> u8 {
    let v = (energy * scale).floor();
    if v.is_nan() || v <= 0.0 {
        0
    } else {
        v.min(127.0) as u8
    }
}

/// Output of a transcription backend before difficulty filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTranscription {
    pub tempo: u32,
    pub time_signature: TimeSignature,
    pub events: Vec<NoteEvent>,
    pub sync_offset_ms: i64,
}

impl RawTranscription {
    /// An empty transcription at the default tempo
    pub fn empty() -> Self {
        RawTranscription {
            tempo: 120,
            time_signature: TimeSignature::COMMON,
            events: Vec::new(),
            sync_offset_ms: 0,
        }
    }
}

/// Final transcription handed to playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    /// Tempo in BPM [60, 200]
    pub tempo: u32,

    pub time_signature: TimeSignature,

    /// Difficulty-filtered events, ordered by start
    pub events: Vec<NoteEvent>,

    /// Every detected event, ordered by start
    pub all_events: Vec<NoteEvent>,

    pub sync_offset_ms: i64,

    /// Name of the backend that produced this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

impl TranscriptionResult {
    pub fn is_empty(&self) -> bool {
        self.all_events.is_empty()
    }

    /// End time of the last event in seconds
    pub fn duration_secs(&self) -> f64 {
        self.all_events.iter().map(NoteEvent::end).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(name: &str) -> Note {
        name.parse().unwrap()
    }

    #[test]
    fn test_event_json_shape() {
        let event = NoteEvent::new(note("C#4"), 1.25, 0.5, 90);
        let json = serde_json::to_value(event).unwrap();

        assert_eq!(json["note"], "C#4");
        assert_eq!(json["start"], 1.25);
        assert_eq!(json["duration"], 0.5);
        assert_eq!(json["velocity"], 90);
    }

    #[test]
    fn test_velocity_capped() {
        assert_eq!(NoteEvent::new(note("A4"), 0.0, 0.1, 200).velocity, 127);
        assert_eq!(velocity_from_energy(0.1, 500.0), 50);
        assert_eq!(velocity_from_energy(1.0, 500.0), 127);
        assert_eq!(velocity_from_energy(0.0, 500.0), 0);
        assert_eq!(velocity_from_energy(f32::NAN, 500.0), 0);
    }

    #[test]
    fn test_key_distinguishes_pitch_and_start() {
        let a = NoteEvent::new(note("C4"), 1.0, 0.2, 80);
        let b = NoteEvent::new(note("C4"), 1.0, 0.4, 60);
        let c = NoteEvent::new(note("D4"), 1.0, 0.2, 80);

        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_result_round_trip() {
        let result = TranscriptionResult {
            tempo: 96,
            time_signature: TimeSignature::COMMON,
            events: vec![NoteEvent::new(note("E4"), 0.5, 0.25, 70)],
            all_events: vec![
                NoteEvent::new(note("C4"), 0.5, 0.25, 60),
                NoteEvent::new(note("E4"), 0.5, 0.25, 70),
            ],
            sync_offset_ms: 0,
            backend: Some("dsp".to_string()),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["timeSignature"], serde_json::json!([4, 4]));
        assert_eq!(json["allEvents"].as_array().unwrap().len(), 2);
        assert_eq!(json["syncOffsetMs"], 0);

        let back: TranscriptionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
        assert!((back.duration_secs() - 0.75).abs() < 1e-9);
    }
}
