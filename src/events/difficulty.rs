// Difficulty filter - reduces a full transcription to a playable subset

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::events::types::NoteEvent;
use crate::pitch::LiveDifficulty;

/// Events starting within this many seconds of a cluster's first event are
/// treated as simultaneous
pub const CHORD_WINDOW_SECS: f64 = 0.05;

/// Minimum spacing between notes kept for beginners
pub const BEGINNER_GAP_SECS: f64 = 0.08;

/// Intermediate bucket length (100ms)
const BUCKETS_PER_SEC: f64 = 10.0;

const TIME_EPSILON: f64 = 1e-9;

/// How much of a transcription the player is asked to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Single melodic line
    Beginner,

    /// Melody, bass and one inner voice
    #[default]
    Intermediate,

    /// Everything
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Beginner, Difficulty::Intermediate, Difficulty::Advanced];
}

impl From<Difficulty> for LiveDifficulty {
    fn from(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Beginner => LiveDifficulty::Easy,
            Difficulty::Intermediate => LiveDifficulty::Medium,
            Difficulty::Advanced => LiveDifficulty::Advanced,
        }
    }
}

/// Filter events for a difficulty level
/// Output is always ordered by start time
pub fn filter_by_difficulty(events: &[NoteEvent], difficulty: Difficulty) -> Vec<NoteEvent> {
    if events.is_empty() {
        return Vec::new();
    }

    let ordered = melodic_order(events);

    let mut filtered = match difficulty {
        Difficulty::Beginner => melody_line(&ordered),
        Difficulty::Intermediate => outer_voices(&ordered),
        Difficulty::Advanced => ordered,
    };

    filtered.sort_by(|a, b| a.start.total_cmp(&b.start));

    log::debug!(
        "{:?} filter kept {} of {} events",
        difficulty,
        filtered.len(),
        events.len()
    );

    filtered
}

/// Order by start, with near-simultaneous events highest pitch first
///
/// Clusters are anchored on their first event so the ordering stays
/// transitive for long runs of closely spaced notes.
pub fn melodic_order(events: &[NoteEvent]) -> Vec<NoteEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by(NoteEvent::chronological);

    let mut ordered = Vec::with_capacity(sorted.len());
    let mut cluster: Vec<NoteEvent> = Vec::new();

    for event in sorted {
        if let Some(first) = cluster.first() {
            if event.start - first.start >= CHORD_WINDOW_SECS {
                flush_cluster(&mut cluster, &mut ordered);
            }
        }
        cluster.push(event);
    }
    flush_cluster(&mut cluster, &mut ordered);

    ordered
}

fn flush_cluster(cluster: &mut Vec<NoteEvent>, out: &mut Vec<NoteEvent>) {
    cluster.sort_by(|a, b| b.note.cmp(&a.note));
    out.append(cluster);
}

/// Greedy single line: keep an event when it is at least 80ms after the
/// last kept one
fn melody_line(ordered: &[NoteEvent]) -> Vec<NoteEvent> {
    let mut kept: Vec<NoteEvent> = Vec::new();
    let mut last_start: Option<f64> = None;

    for event in ordered {
        let far_enough = last_start.map_or(true, |t| event.start - t >= BEGINNER_GAP_SECS - TIME_EPSILON);
        if far_enough {
            kept.push(*event);
            last_start = Some(event.start);
        }
    }

    kept
}

/// Per 100ms bucket keep the highest, middle and lowest pitch
fn outer_voices(ordered: &[NoteEvent]) -> Vec<NoteEvent> {
    let mut bucket_order: Vec<i64> = Vec::new();
    let mut buckets: HashMap<i64, Vec<NoteEvent>> = HashMap::new();

    for event in ordered {
        let key = (event.start * BUCKETS_PER_SEC).floor() as i64;
        buckets
            .entry(key)
            .or_insert_with(|| {
                bucket_order.push(key);
                Vec::new()
            })
            .push(*event);
    }

    let mut kept = Vec::new();

    for key in bucket_order {
        let Some(mut group) = buckets.remove(&key) else {
            continue;
        };

        if group.len() <= 2 {
            kept.extend(group);
            continue;
        }

        group.sort_by(|a, b| b.note.cmp(&a.note));
        kept.push(group[0]);
        kept.push(group[group.len() / 2]);
        kept.push(group[group.len() - 1]);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(name: &str, start: f64) -> NoteEvent {
        NoteEvent::new(name.parse().unwrap(), start, 0.3, 80)
    }

    fn names(events: &[NoteEvent]) -> Vec<String> {
        events.iter().map(|e| e.note.to_string()).collect()
    }

    fn is_sorted(events: &[NoteEvent]) -> bool {
        events.windows(2).all(|w| w[0].start <= w[1].start)
    }

    #[test]
    fn test_empty_input() {
        for d in Difficulty::ALL {
            assert!(filter_by_difficulty(&[], d).is_empty());
        }
    }

    #[test]
    fn test_intermediate_keeps_three_of_four() {
        let chord = vec![ev("C4", 1.00), ev("E4", 1.01), ev("G4", 1.02), ev("C5", 1.03)];
        let filtered = filter_by_difficulty(&chord, Difficulty::Intermediate);

        assert_eq!(filtered.len(), 3);
        let mut kept = names(&filtered);
        kept.sort();
        // Highest, index len/2 of the descending order, lowest
        assert_eq!(kept, vec!["C4", "C5", "E4"]);
        assert!(is_sorted(&filtered));
    }

    #[test]
    fn test_intermediate_simultaneous_chord() {
        // Equal starts: only pitch decides which tones survive
        let chord = vec![ev("E4", 0.0), ev("C4", 0.0), ev("C5", 0.0), ev("G4", 0.0)];
        let filtered = filter_by_difficulty(&chord, Difficulty::Intermediate);

        assert_eq!(names(&filtered), vec!["C5", "E4", "C4"]);
        assert!(filtered.iter().all(|e| e.start == 0.0));
    }

    #[test]
    fn test_intermediate_small_buckets_pass_through() {
        let events = vec![ev("C4", 0.00), ev("E4", 0.05), ev("G4", 0.25)];
        assert_eq!(filter_by_difficulty(&events, Difficulty::Intermediate).len(), 3);
    }

    #[test]
    fn test_beginner_takes_top_of_chord() {
        let events = vec![ev("C4", 1.00), ev("G4", 1.02), ev("E4", 1.01), ev("D5", 2.0), ev("A3", 2.0)];
        let filtered = filter_by_difficulty(&events, Difficulty::Beginner);
        assert_eq!(names(&filtered), vec!["G4", "D5"]);
    }

    #[test]
    fn test_beginner_spacing() {
        let events = vec![ev("C4", 0.0), ev("D4", 0.05), ev("E4", 0.08), ev("F4", 0.12), ev("G4", 0.2)];
        let filtered = filter_by_difficulty(&events, Difficulty::Beginner);
        // 0.0 kept, 0.05 too close, 0.08 exactly 80ms later kept, 0.12 too close, 0.2 kept
        assert_eq!(names(&filtered), vec!["C4", "E4", "G4"]);
    }

    #[test]
    fn test_advanced_is_everything_sorted() {
        let events = vec![ev("C4", 2.0), ev("E4", 0.5), ev("G4", 1.0)];
        let filtered = filter_by_difficulty(&events, Difficulty::Advanced);
        assert_eq!(filtered.len(), 3);
        assert!(is_sorted(&filtered));
    }

    #[test]
    fn test_sizes_are_monotonic() {
        // Dense pseudo-random texture
        let names_pool = ["C3", "E3", "G3", "C4", "E4", "G4", "B4", "D5"];
        let mut state: u32 = 7;
        let mut events = Vec::new();
        for i in 0..200 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let name = names_pool[(state >> 16) as usize % names_pool.len()];
            let jitter = ((state >> 8) % 40) as f64 / 1000.0;
            events.push(ev(name, i as f64 * 0.03 + jitter));
        }

        let beginner = filter_by_difficulty(&events, Difficulty::Beginner);
        let intermediate = filter_by_difficulty(&events, Difficulty::Intermediate);
        let advanced = filter_by_difficulty(&events, Difficulty::Advanced);

        assert!(!beginner.is_empty());
        assert!(beginner.len() <= intermediate.len());
        assert!(intermediate.len() <= advanced.len());
        assert_eq!(advanced.len(), events.len());

        for filtered in [&beginner, &intermediate, &advanced] {
            assert!(is_sorted(filtered));
            // Every kept event came from the input
            assert!(filtered.iter().all(|e| events.contains(e)));
        }
    }

    #[test]
    fn test_melodic_order_is_anchored() {
        // 0.00, 0.04, 0.08: the third is 80ms after the anchor so it starts a new cluster
        let events = vec![ev("C4", 0.00), ev("E4", 0.04), ev("G5", 0.08)];
        let ordered = melodic_order(&events);
        assert_eq!(names(&ordered), vec!["E4", "C4", "G5"]);
    }

    #[test]
    fn test_live_difficulty_mapping() {
        assert_eq!(LiveDifficulty::from(Difficulty::Beginner), LiveDifficulty::Easy);
        assert_eq!(LiveDifficulty::from(Difficulty::Intermediate), LiveDifficulty::Medium);
        assert_eq!(LiveDifficulty::from(Difficulty::Advanced), LiveDifficulty::Advanced);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Difficulty::Beginner).unwrap(), "\"beginner\"");
        let parsed: Difficulty = serde_json::from_str("\"advanced\"").unwrap();
        assert_eq!(parsed, Difficulty::Advanced);
    }
}
