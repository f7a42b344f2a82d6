// Quantization - snaps event start times to a fixed time grid
// Pitch, duration and velocity pass through untouched

use serde::{Deserialize, Serialize};

use crate::events::NoteEvent;

/// Settings for quantization behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeSettings {
    /// Grid steps per second (100 = 10ms grid)
    pub resolution_hz: f64,

    /// Offset applied to the output for audio/visual sync, in milliseconds
    pub sync_offset_ms: i64,
}

impl Default for QuantizeSettings {
    fn default() -> Self {
        QuantizeSettings {
            resolution_hz: 100.0,
            sync_offset_ms: 0,
        }
    }
}

/// Quantized event list plus the sync offset that accompanies it
#[derive(Debug, Clone, PartialEq)]
pub struct Quantized {
    pub events: Vec<NoteEvent>,
    pub sync_offset_ms: i64,
}

/// Snap a single time to the grid
pub fn quantize_time(time: f64, settings: &QuantizeSettings) -> f64 {
    if settings.resolution_hz <= 0.0 {
        return time;
    }
    (time * settings.resolution_hz).round() / settings.resolution_hz
}

/// Quantize a list of events to the grid, keeping their order
pub fn quantize_events(events: &[NoteEvent], settings: &QuantizeSettings) -> Quantized {
    let events = events
        .iter()
        .map(|event| NoteEvent {
            start: quantize_time(event.start, settings).max(0.0),
            ..*event
        })
        .collect();

    Quantized {
        events,
        sync_offset_ms: settings.sync_offset_ms,
    }
}
