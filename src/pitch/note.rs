// Note naming - MIDI pitch numbers, scientific pitch names and frequencies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Lowest piano key (A0)
pub const PIANO_LOWEST: u8 = 21;

/// Highest piano key (C8)
pub const PIANO_HIGHEST: u8 = 108;

/// Frequencies below this are never mapped to a note
pub const MIN_NOTE_FREQUENCY: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteParseError {
    #[error("Invalid note name: {0:?}")]
    InvalidName(String),

    #[error("Note out of MIDI range: {0:?}")]
    OutOfRange(String),
}

/// A pitch identified by its MIDI note number (60 = C4)
///
/// Serializes as its name ("C#4") so event lists read naturally in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Note(u8);

impl Note {
    /// Create from a MIDI number; `None` above 127
    pub fn from_midi(midi: u8) -> Option<Self> {
        (midi <= 127).then_some(Note(midi))
    }

    pub fn midi(self) -> u8 {
        self.0
    }

    /// Octave in scientific pitch notation (C4 = middle C)
    pub fn octave(self) -> i32 {
        self.0 as i32 / 12 - 1
    }

    /// Pitch class name without octave ("C#")
    pub fn pitch_class(self) -> &'static str {
        NOTE_NAMES[(self.0 % 12) as usize]
    }

    /// Equal-tempered frequency with A4 = 440 Hz
    pub fn frequency(self) -> f64 {
        440.0 * 2f64.powf((self.0 as f64 - 69.0) / 12.0)
    }

    /// Whether this pitch is one of the 88 piano keys
    pub fn is_piano_key(self) -> bool {
        (PIANO_LOWEST..=PIANO_HIGHEST).contains(&self.0)
    }

    /// Index on an 88-key keyboard (A0 = 0), if on the keyboard
    pub fn key_index(self) -> Option<u8> {
        self.is_piano_key().then(|| self.0 - PIANO_LOWEST)
    }

    /// Nearest piano key for a frequency
    ///
    /// Rejects frequencies below 20 Hz, octaves outside 0..=8 and pitches
    /// that fall off the keyboard.
    pub fn from_frequency(frequency: f64) -> Option<Self> {
        if !frequency.is_finite() || frequency < MIN_NOTE_FREQUENCY {
            return None;
        }

        let midi = frequency_to_midi(frequency);
        if !(0.0..=127.0).contains(&midi) {
            return None;
        }

        let note = Note(midi as u8);
        if !(0..=8).contains(&note.octave()) || !note.is_piano_key() {
            return None;
        }

        Some(note)
    }
}

/// Continuous-to-discrete pitch: round(69 + 12 * log2(f / 440))
pub fn frequency_to_midi(frequency: f64) -> f64 {
    (69.0 + 12.0 * (frequency / 440.0).log2()).round()
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

impl FromStr for Note {
    type Err = NoteParseError;

    /// Parse "C4", "F#3", "Bb2" or "C-1"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NoteParseError::InvalidName(s.to_string());

        let mut chars = s.trim().chars();
        let letter = chars.next().ok_or_else(invalid)?;
        let base: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };

        let rest = chars.as_str();
        let (accidental, octave_str) = if let Some(r) = rest.strip_prefix('#') {
            (1, r)
        } else if let Some(r) = rest.strip_prefix('b') {
            (-1, r)
        } else {
            (0, rest)
        };

        let octave: i32 = octave_str.parse().map_err(|_| invalid())?;
        if !(-1..=9).contains(&octave) {
            return Err(NoteParseError::OutOfRange(s.to_string()));
        }
        let midi = (octave + 1) * 12 + base + accidental;

        u8::try_from(midi)
            .ok()
            .and_then(Note::from_midi)
            .ok_or_else(|| NoteParseError::OutOfRange(s.to_string()))
    }
}

impl TryFrom<String> for Note {
    type Error = NoteParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(Note::from_midi(60).unwrap().to_string(), "C4");
        assert_eq!(Note::from_midi(69).unwrap().to_string(), "A4");
        assert_eq!(Note::from_midi(21).unwrap().to_string(), "A0");
        assert_eq!(Note::from_midi(108).unwrap().to_string(), "C8");
        assert_eq!(Note::from_midi(61).unwrap().to_string(), "C#4");
        assert_eq!(Note::from_midi(0).unwrap().to_string(), "C-1");
        assert!(Note::from_midi(128).is_none());
    }

    #[test]
    fn test_parse() {
        assert_eq!("C#4".parse::<Note>().unwrap().midi(), 61);
        assert_eq!("Db4".parse::<Note>().unwrap().midi(), 61);
        assert_eq!("A0".parse::<Note>().unwrap().midi(), 21);
        assert_eq!("C-1".parse::<Note>().unwrap().midi(), 0);
        assert!(matches!("H2".parse::<Note>(), Err(NoteParseError::InvalidName(_))));
        assert!(matches!("C".parse::<Note>(), Err(NoteParseError::InvalidName(_))));
        assert!(matches!("A9".parse::<Note>(), Err(NoteParseError::OutOfRange(_))));
    }

    #[test]
    fn test_parse_huge_octave() {
        assert!(matches!("C2147483647".parse::<Note>(), Err(NoteParseError::OutOfRange(_))));
        assert!(matches!("B-2147483648".parse::<Note>(), Err(NoteParseError::OutOfRange(_))));
        assert!(matches!("Cb-1".parse::<Note>(), Err(NoteParseError::OutOfRange(_))));
        assert_eq!("G9".parse::<Note>().unwrap().midi(), 127);
    }

    #[test]
    fn test_all_piano_keys_round_trip_through_frequency() {
        for midi in PIANO_LOWEST..=PIANO_HIGHEST {
            let name = Note::from_midi(midi).unwrap().to_string();
            let parsed: Note = name.parse().unwrap();
            let back = Note::from_frequency(parsed.frequency()).unwrap();
            assert_eq!(back.to_string(), name);
        }
    }

    #[test]
    fn test_from_frequency_rejects_out_of_range() {
        assert!(Note::from_frequency(19.9).is_none());
        assert!(Note::from_frequency(0.0).is_none());
        assert!(Note::from_frequency(f64::NAN).is_none());
        // Below A0 but above 20 Hz
        assert!(Note::from_frequency(24.0).is_none());
        // Above C8
        assert!(Note::from_frequency(4700.0).is_none());
        assert_eq!(Note::from_frequency(441.0).unwrap().to_string(), "A4");
    }

    #[test]
    fn test_key_index() {
        assert_eq!(Note::from_midi(21).unwrap().key_index(), Some(0));
        assert_eq!(Note::from_midi(108).unwrap().key_index(), Some(87));
        assert_eq!(Note::from_midi(20).unwrap().key_index(), None);
    }

    #[test]
    fn test_serde_as_name() {
        let note: Note = "G#3".parse().unwrap();
        let json = serde_json::to_string(&note).unwrap();
        assert_eq!(json, "\"G#3\"");

        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
        assert!(serde_json::from_str::<Note>("\"X9\"").is_err());
    }
}
