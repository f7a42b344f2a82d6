// Practice stepping - walk a schedule one chord at a time

use std::sync::Arc;

use crate::events::difficulty::CHORD_WINDOW_SECS;
use crate::events::NoteEvent;
use crate::pitch::Note;

/// Position in a step-through of a sorted event list
///
/// A step is every event starting within 50ms of the event at the cursor.
#[derive(Debug, Clone)]
pub struct PracticeCursor {
    events: Arc<[NoteEvent]>,
    position: usize,
}

impl PracticeCursor {
    pub fn new(events: Arc<[NoteEvent]>) -> Self {
        PracticeCursor { events, position: 0 }
    }

    /// Index of the event the current step is anchored on
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn total(&self) -> usize {
        self.events.len()
    }

    pub fn is_complete(&self) -> bool {
        self.position >= self.events.len()
    }

    /// Events to play at this step; empty once complete
    pub fn current(&self) -> Vec<NoteEvent> {
        let Some(anchor) = self.events.get(self.position) else {
            return Vec::new();
        };

        self.events
            .iter()
            .filter(|e| (e.start - anchor.start).abs() < CHORD_WINDOW_SECS)
            .copied()
            .collect()
    }

    pub fn current_notes(&self) -> Vec<Note> {
        self.current().into_iter().map(|e| e.note).collect()
    }

    /// Move past every event of the current step
    pub fn advance(&mut self) -> bool {
        let Some(anchor) = self.events.get(self.position).map(|e| e.start) else {
            return false;
        };

        self.position += 1;
        while self
            .events
            .get(self.position)
            .is_some_and(|e| (e.start - anchor).abs() < CHORD_WINDOW_SECS)
        {
            self.position += 1;
        }

        log::debug!("Practice step {}/{}", self.position.min(self.events.len()), self.events.len());
        true
    }

    /// Step back to the previous chord
    pub fn back(&mut self) -> bool {
        if self.position == 0 {
            return false;
        }

        // Land on the first event of the previous chord
        self.position = self.position.min(self.events.len()) - 1;
        let landed = self.events[self.position].start;
        while self.position > 0 && (landed - self.events[self.position - 1].start).abs() < CHORD_WINDOW_SECS {
            self.position -= 1;
        }

        true
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }
}
