// Musical grid - time signature and beat arithmetic

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeSignatureError {
    #[error("Beats per bar must be positive")]
    ZeroBeats,

    #[error("Beat unit must be a power of two, got {0}")]
    InvalidBeatUnit(u32),
}

/// Musical time signature
///
/// Serialized as a two-element array (`[4, 4]`) to match what external
/// transcription services send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 2]", into = "[u32; 2]")]
pub struct TimeSignature {
    beats_per_bar: u32,
    beat_unit: u32,
}

impl TimeSignature {
    /// 4/4
    pub const COMMON: TimeSignature = TimeSignature {
        beats_per_bar: 4,
        beat_unit: 4,
    };

    pub fn new(beats_per_bar: u32, beat_unit: u32) -> Result<Self, TimeSignatureError> {
        if beats_per_bar == 0 {
            return Err(TimeSignatureError::ZeroBeats);
        }
        if !beat_unit.is_power_of_two() {
            return Err(TimeSignatureError::InvalidBeatUnit(beat_unit));
        }
        Ok(TimeSignature { beats_per_bar, beat_unit })
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    /// The note value that gets one beat (4 = quarter note)
    pub fn beat_unit(&self) -> u32 {
        self.beat_unit
    }

    /// Length of one bar in seconds at `bpm` quarter-note beats per minute
    pub fn bar_secs(&self, bpm: u32) -> f64 {
        beat_secs(bpm) * self.beats_per_bar as f64 * 4.0 / self.beat_unit as f64
    }

    /// Bar (0-indexed) that contains `time`
    pub fn bar_at(&self, time: f64, bpm: u32) -> u32 {
        let bar = self.bar_secs(bpm);
        if bar <= 0.0 || time <= 0.0 {
            return 0;
        }
        (time / bar).floor() as u32
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::COMMON
    }
}

impl TryFrom<[u32; 2]> for TimeSignature {
    type Error = TimeSignatureError;

    fn try_from(value: [u32; 2]) -> Result<Self, Self::Error> {
        TimeSignature::new(value[0], value[1])
    }
}

impl From<TimeSignature> for [u32; 2] {
    fn from(ts: TimeSignature) -> Self {
        [ts.beats_per_bar, ts.beat_unit]
    }
}

/// Length of one quarter-note beat in seconds
pub fn beat_secs(bpm: u32) -> f64 {
    if bpm == 0 {
        return 0.0;
    }
    60.0 / bpm as f64
}

/// Length of one sixteenth note in seconds
pub fn sixteenth_secs(bpm: u32) -> f64 {
    beat_secs(bpm) / 4.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_pair() {
        let json = serde_json::to_string(&TimeSignature::COMMON).unwrap();
        assert_eq!(json, "[4,4]");

        let parsed: TimeSignature = serde_json::from_str("[3,4]").unwrap();
        assert_eq!(parsed.beats_per_bar(), 3);
        assert_eq!(parsed.beat_unit(), 4);

        assert!(serde_json::from_str::<TimeSignature>("[0,4]").is_err());
        assert!(serde_json::from_str::<TimeSignature>("[4,3]").is_err());
    }

    #[test]
    fn test_beat_lengths() {
        assert!((beat_secs(120) - 0.5).abs() < 1e-9);
        assert!((sixteenth_secs(120) - 0.125).abs() < 1e-9);
        assert_eq!(beat_secs(0), 0.0);
    }

    #[test]
    fn test_bars() {
        let waltz = TimeSignature::new(3, 4).unwrap();
        assert!((TimeSignature::COMMON.bar_secs(120) - 2.0).abs() < 1e-9);
        assert!((waltz.bar_secs(120) - 1.5).abs() < 1e-9);

        assert_eq!(TimeSignature::COMMON.bar_at(3.9, 120), 1);
        assert_eq!(waltz.bar_at(3.1, 120), 2);
        assert_eq!(waltz.bar_at(-1.0, 120), 0);
    }
}
