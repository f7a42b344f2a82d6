// Adapters from external transcription output to RawTranscription
// A conversion service replies with named notes; note models emit MIDI pitches

use serde::Deserialize;

use crate::events::types::{NoteEvent, RawTranscription};
use crate::groove::TimeSignature;
use crate::pitch::Note;

const DEFAULT_TEMPO: u32 = 120;
const DEFAULT_VELOCITY: u8 = 80;
const MIN_TEMPO: f64 = 60.0;
const MAX_TEMPO: f64 = 200.0;

/// JSON body returned by a conversion service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceReply {
    #[serde(default)]
    pub tempo: Option<f64>,

    #[serde(default)]
    pub time_signature: Option<TimeSignature>,

    #[serde(default)]
    pub events: Vec<ServiceEvent>,

    #[serde(default)]
    pub sync_offset_ms: Option<i64>,

    /// Set when the service could not transcribe
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEvent {
    pub note: Note,
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub velocity: Option<u8>,
}

impl ServiceReply {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Convert to a raw transcription, or the service's error text
    pub fn into_raw(self) -> Result<RawTranscription, String> {
        if let Some(error) = self.error {
            return Err(match self.message {
                Some(message) => format!("{}: {}", error, message),
                None => error,
            });
        }

        let events = self
            .events
            .into_iter()
            .map(|e| NoteEvent::new(e.note, e.start, e.duration, e.velocity.unwrap_or(DEFAULT_VELOCITY)))
            .collect();

        Ok(RawTranscription {
            tempo: clamp_tempo(self.tempo),
            time_signature: self.time_signature.unwrap_or_default(),
            events: sanitize_events(events),
            sync_offset_ms: self.sync_offset_ms.unwrap_or(0),
        })
    }
}

/// Note sequence produced by a transcription model
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSequence {
    #[serde(default)]
    pub notes: Vec<SequenceNote>,

    #[serde(default)]
    pub tempos: Vec<SequenceTempo>,

    #[serde(default)]
    pub time_signatures: Vec<SequenceTimeSignature>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceNote {
    pub pitch: u8,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub velocity: Option<u8>,
    /// Some models report loudness as amplitude [0, 1] instead of velocity
    #[serde(default)]
    pub amplitude: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceTempo {
    pub qpm: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceTimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl NoteSequence {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn into_raw(self) -> RawTranscription {
        let events = self
            .notes
            .iter()
            .filter_map(|n| {
                let note = Note::from_midi(n.pitch)?;
                let velocity = match (n.velocity, n.amplitude) {
                    (Some(v), _) if v > 0 => v,
                    (_, Some(a)) => (a.clamp(0.0, 1.0) * 127.0).floor() as u8,
                    _ => DEFAULT_VELOCITY,
                };
                Some(NoteEvent::new(note, n.start_time, n.end_time - n.start_time, velocity))
            })
            .collect();

        let time_signature = self
            .time_signatures
            .first()
            .and_then(|ts| TimeSignature::new(ts.numerator, ts.denominator).ok())
            .unwrap_or_default();

        RawTranscription {
            tempo: clamp_tempo(self.tempos.first().map(|t| t.qpm)),
            time_signature,
            events: sanitize_events(events),
            sync_offset_ms: 0,
        }
    }
}

fn clamp_tempo(tempo: Option<f64>) -> u32 {
    match tempo {
        Some(t) if t.is_finite() && t > 0.0 => t.clamp(MIN_TEMPO, MAX_TEMPO).round() as u32,
        _ => DEFAULT_TEMPO,
    }
}

/// Sort, then drop invalid events and exact (note, start) duplicates
pub fn sanitize_events(mut events: Vec<NoteEvent>) -> Vec<NoteEvent> {
    events.retain(|e| e.start.is_finite() && e.start >= 0.0 && e.duration.is_finite() && e.duration > 0.0);
    events.sort_by(NoteEvent::chronological);
    events.dedup_by_key(|e| e.key());
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_reply_defaults() {
        let body = r#"{"events":[{"note":"E4","start":0.5,"duration":0.25},{"note":"C4","start":0.1,"duration":0.3,"velocity":64}]}"#;
        let raw = ServiceReply::from_json(body).unwrap().into_raw().unwrap();

        assert_eq!(raw.tempo, 120);
        assert_eq!(raw.time_signature, TimeSignature::COMMON);
        assert_eq!(raw.sync_offset_ms, 0);
        assert_eq!(raw.events.len(), 2);
        // Sorted by start
        assert_eq!(raw.events[0].note.to_string(), "C4");
        assert_eq!(raw.events[0].velocity, 64);
        assert_eq!(raw.events[1].velocity, 80);
    }

    #[test]
    fn test_service_reply_error() {
        let body = r#"{"error":"Basic Pitch not installed","message":"try later"}"#;
        let err = ServiceReply::from_json(body).unwrap().into_raw().unwrap_err();
        assert!(err.contains("not installed"));
        assert!(err.contains("try later"));
    }

    #[test]
    fn test_service_reply_rejects_bad_note_name() {
        let body = r#"{"events":[{"note":"C2147483647","start":0.0,"duration":0.5}]}"#;
        assert!(ServiceReply::from_json(body).is_err());
    }

    #[test]
    fn test_service_reply_full() {
        let body = r#"{"tempo":96,"timeSignature":[3,4],"syncOffsetMs":-20,"events":[]}"#;
        let raw = ServiceReply::from_json(body).unwrap().into_raw().unwrap();
        assert_eq!(raw.tempo, 96);
        assert_eq!(raw.time_signature.beats_per_bar(), 3);
        assert_eq!(raw.sync_offset_ms, -20);
        assert!(raw.events.is_empty());
    }

    #[test]
    fn test_note_sequence() {
        let body = r#"{
            "notes": [
                {"pitch": 64, "startTime": 1.0, "endTime": 1.5},
                {"pitch": 60, "startTime": 0.0, "endTime": 0.5, "velocity": 100},
                {"pitch": 67, "startTime": 2.0, "endTime": 2.1, "amplitude": 0.5},
                {"pitch": 62, "startTime": 3.0, "endTime": 3.0}
            ],
            "tempos": [{"qpm": 400.0}]
        }"#;
        let raw = NoteSequence::from_json(body).unwrap().into_raw();

        assert_eq!(raw.tempo, 200);
        let names: Vec<_> = raw.events.iter().map(|e| e.note.to_string()).collect();
        // Zero-length D4 dropped
        assert_eq!(names, vec!["C4", "E4", "G4"]);
        assert_eq!(raw.events[0].velocity, 100);
        assert_eq!(raw.events[1].velocity, 80);
        assert_eq!(raw.events[2].velocity, 63);
        assert!((raw.events[1].duration - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sanitize_drops_duplicates_and_negatives() {
        let c4: Note = "C4".parse().unwrap();
        let events = vec![
            NoteEvent::new(c4, 1.0, 0.2, 80),
            NoteEvent::new(c4, 1.0, 0.4, 90),
            NoteEvent::new(c4, -0.1, 0.2, 80),
            NoteEvent::new(c4, 0.5, 0.2, 80),
        ];
        let clean = sanitize_events(events);
        assert_eq!(clean.len(), 2);
        assert_eq!(clean[0].start, 0.5);
        assert_eq!(clean[1].start, 1.0);
    }
}
