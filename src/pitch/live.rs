// Real-time note detector
// Picks clear spectral peaks out of a byte-scaled magnitude frame and maps
// them to piano notes, rejecting overtones of notes already accepted

use serde::{Deserialize, Serialize};

use crate::pitch::note::Note;

/// Strictness of the live detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveDifficulty {
    Easy,
    Medium,
    Advanced,
}

impl Default for LiveDifficulty {
    fn default() -> Self {
        LiveDifficulty::Medium
    }
}

/// Selection thresholds for one difficulty level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivePolicy {
    /// Maximum simultaneous notes reported per frame
    pub max_notes: usize,

    /// Minimum magnitude relative to the loudest peak
    pub min_magnitude_ratio: f32,

    /// Minimum clarity relative to the clearest peak
    pub min_clarity_ratio: f32,

    /// Minimum absolute magnitude (0-255 scale)
    pub min_magnitude: f32,
}

impl LiveDifficulty {
    pub fn policy(self) -> LivePolicy {
        match self {
            LiveDifficulty::Easy => LivePolicy {
                max_notes: 1,
                min_magnitude_ratio: 0.85,
                min_clarity_ratio: 0.85,
                min_magnitude: 100.0,
            },
            LiveDifficulty::Medium => LivePolicy {
                max_notes: 2,
                min_magnitude_ratio: 0.70,
                min_clarity_ratio: 0.65,
                min_magnitude: 95.0,
            },
            LiveDifficulty::Advanced => LivePolicy {
                max_notes: 3,
                min_magnitude_ratio: 0.60,
                min_clarity_ratio: 0.55,
                min_magnitude: 90.0,
            },
        }
    }
}

/// Configuration for the live detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveDetectorConfig {
    pub difficulty: LiveDifficulty,

    /// Bins at or below this magnitude are never peaks
    pub peak_threshold: u8,

    /// Peak must be a strict maximum over +/- this many bins
    pub neighborhood: usize,

    /// Top-ranked peak is accepted outright above this clarity
    pub first_peak_clarity: f32,

    /// Clarity differences up to this are ranked by magnitude instead
    pub clarity_tie: f32,

    /// Only this many ranked peaks are considered
    pub max_candidates: usize,

    /// Secondary peaks need magnitude above `min_magnitude * secondary_factor`
    pub secondary_factor: f32,

    /// Distance from an integer ratio that counts as a harmonic
    pub harmonic_tolerance: f64,

    /// Also require energy at 2x or 3x the peak bin
    pub require_overtones: bool,

    pub min_frequency: f64,
    pub max_frequency: f64,
}

impl Default for LiveDetectorConfig {
    fn default() -> Self {
        LiveDetectorConfig {
            difficulty: LiveDifficulty::default(),
            peak_threshold: 85,
            neighborhood: 5,
            first_peak_clarity: 1.4,
            clarity_tie: 0.5,
            max_candidates: 8,
            secondary_factor: 0.8,
            harmonic_tolerance: 0.15,
            require_overtones: false,
            min_frequency: 27.5,
            max_frequency: 4186.0,
        }
    }
}

/// A local maximum in a magnitude frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    pub bin: usize,
    pub frequency: f64,
    pub magnitude: f32,
    pub clarity: f32,
}

/// Peak-picking note detector for byte magnitude frames
#[derive(Debug, Clone)]
pub struct LiveNoteDetector {
    config: LiveDetectorConfig,
    bin_width: f64,
}

impl LiveNoteDetector {
    pub fn new(sample_rate: u32, fft_size: usize, config: LiveDetectorConfig) -> Self {
        LiveNoteDetector {
            bin_width: sample_rate as f64 / fft_size.max(1) as f64,
            config,
        }
    }

    pub fn config(&self) -> &LiveDetectorConfig {
        &self.config
    }

    pub fn set_difficulty(&mut self, difficulty: LiveDifficulty) {
        self.config.difficulty = difficulty;
    }

    /// Distinct notes present in a frame, best first
    pub fn detect(&self, frame: &[u8]) -> Vec<Note> {
        let peaks = self.ranked_peaks(frame);
        if peaks.is_empty() {
            return Vec::new();
        }

        let policy = self.config.difficulty.policy();

        let loudest = peaks.iter().map(|p| p.magnitude).fold(0.0f32, f32::max);
        let clearest = peaks.iter().map(|p| p.clarity).fold(0.0f32, f32::max);

        if loudest < policy.min_magnitude {
            return Vec::new();
        }

        let mut accepted: Vec<Note> = Vec::new();

        for (rank, peak) in peaks.iter().take(self.config.max_candidates).enumerate() {
            if self.config.require_overtones && !has_overtones(frame, peak) {
                continue;
            }

            let Some(note) = Note::from_frequency(peak.frequency) else {
                continue;
            };

            if rank == 0 && peak.clarity > self.config.first_peak_clarity && peak.magnitude > policy.min_magnitude {
                accepted.push(note);
            } else if peak.magnitude / loudest >= policy.min_magnitude_ratio
                && peak.clarity / clearest >= policy.min_clarity_ratio
                && peak.magnitude > policy.min_magnitude * self.config.secondary_factor
                && !accepted.contains(&note)
                && !self.is_harmonic(peak.frequency, &accepted)
            {
                accepted.push(note);
            }

            if accepted.len() >= policy.max_notes {
                break;
            }
        }

        accepted
    }

    /// Peaks in the piano range, ordered clearest first
    pub fn ranked_peaks(&self, frame: &[u8]) -> Vec<SpectralPeak> {
        let reach = self.config.neighborhood.max(5);
        if frame.len() <= 2 * reach {
            return Vec::new();
        }

        let mut peaks: Vec<SpectralPeak> = Vec::new();

        for bin in reach..frame.len() - reach {
            let frequency = bin as f64 * self.bin_width;
            if frequency < self.config.min_frequency || frequency > self.config.max_frequency {
                continue;
            }

            let magnitude = frame[bin];
            if magnitude <= self.config.peak_threshold {
                continue;
            }

            let n = self.config.neighborhood;
            let is_max = (bin - n..=bin + n).all(|j| j == bin || frame[j] < magnitude);
            if !is_max {
                continue;
            }

            let neighbors = [frame[bin - 5], frame[bin - 3], frame[bin + 3], frame[bin + 5]];
            let average = neighbors.iter().map(|&v| v as f32).sum::<f32>() / 4.0;

            peaks.push(SpectralPeak {
                bin,
                frequency,
                magnitude: magnitude as f32,
                clarity: magnitude as f32 / (average + 1.0),
            });
        }

        self.rank(&mut peaks);
        peaks
    }

    /// Insertion sort with the clarity-then-magnitude ordering
    ///
    /// The tie window makes the ordering non-transitive, so it cannot be
    /// handed to `sort_by`.
    fn rank(&self, peaks: &mut [SpectralPeak]) {
        for i in 1..peaks.len() {
            let mut j = i;
            while j > 0 && self.ranks_before(&peaks[j], &peaks[j - 1]) {
                peaks.swap(j, j - 1);
                j -= 1;
            }
        }
    }

    fn ranks_before(&self, a: &SpectralPeak, b: &SpectralPeak) -> bool {
        let diff = a.clarity - b.clarity;
        if diff.abs() > self.config.clarity_tie {
            diff > 0.0
        } else {
            a.magnitude > b.magnitude
        }
    }

    fn is_harmonic(&self, frequency: f64, accepted: &[Note]) -> bool {
        accepted.iter().any(|note| {
            let ratio = frequency / note.frequency();
            let nearest = ratio.round();
            nearest >= 2.0 && (ratio - nearest).abs() < self.config.harmonic_tolerance
        })
    }
}

/// Energy at the 2nd or 3rd harmonic bin
fn has_overtones(frame: &[u8], peak: &SpectralPeak) -> bool {
    let fundamental = peak.magnitude;

    let second = frame.get(peak.bin * 2).map_or(false, |&v| v as f32 > fundamental * 0.2);
    let third = frame.get(peak.bin * 3).map_or(false, |&v| v as f32 > fundamental * 0.15);

    second || third
}
