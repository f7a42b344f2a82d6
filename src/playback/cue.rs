// Falling-note descriptors handed to a renderer

use serde::{Deserialize, Serialize};

use crate::events::NoteEvent;

/// One bar of the falling-notes view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallingNote {
    /// Key on an 88-key keyboard, A0 = 0
    pub key_index: u8,

    pub start: f64,
    pub duration: f64,

    /// velocity / 127
    pub brightness: f32,
}

impl FallingNote {
    /// `None` for pitches off the keyboard
    pub fn from_event(event: &NoteEvent) -> Option<Self> {
        Some(FallingNote {
            key_index: event.note.key_index()?,
            start: event.start,
            duration: event.duration,
            brightness: event.velocity as f32 / 127.0,
        })
    }
}

/// Descriptors for every drawable event, in input order
pub fn falling_notes(events: &[NoteEvent]) -> Vec<FallingNote> {
    events.iter().filter_map(FallingNote::from_event).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::Note;

    #[test]
    fn test_descriptor() {
        let event = NoteEvent::new("C4".parse().unwrap(), 1.5, 0.25, 127);
        let cue = FallingNote::from_event(&event).unwrap();
        assert_eq!(cue.key_index, 39);
        assert_eq!(cue.start, 1.5);
        assert_eq!(cue.duration, 0.25);
        assert_eq!(cue.brightness, 1.0);
    }

    #[test]
    fn test_off_keyboard_skipped() {
        let low = NoteEvent::new(Note::from_midi(12).unwrap(), 0.0, 0.2, 64);
        let a0 = NoteEvent::new(Note::from_midi(21).unwrap(), 0.5, 0.2, 0);
        let cues = falling_notes(&[low, a0]);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].key_index, 0);
        assert_eq!(cues[0].brightness, 0.0);
    }
}
