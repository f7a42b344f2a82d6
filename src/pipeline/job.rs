// Chunked analysis job
// Runs the offline transcription pass a bounded slice at a time so a host
// can interleave it with rendering, report progress and cancel it

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::onset::mean_square;
use crate::audio::{preprocess, OnsetConfig, OnsetDetector, OnsetMark, PreprocessConfig, SampleBuffer};
use crate::events::refine::{estimate_duration, refine_events, DurationConfig, RefineConfig};
use crate::events::types::velocity_from_energy;
use crate::events::{NoteEvent, RawTranscription, TranscriptionError};
use crate::groove::{estimate_tempo_with_config, quantize_events, QuantizeSettings, TempoConfig, TimeSignature};
use crate::pipeline::trace::{ProgressSink, TraceEntry};
use crate::pitch::{estimate_pitch, AutocorrelationConfig, Note};

/// Which offline analysis strategy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Filter, detect onsets, estimate one pitch per onset
    #[default]
    Onset,

    /// Dense scan with normalized autocorrelation on the raw signal
    Enhanced,

    /// Coarse scan with plain autocorrelation on the raw signal
    Simple,
}

/// Settings for the frame-scanning modes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub hop_secs: f64,
    pub window_size: usize,

    /// Windows at or below this mean-square energy are skipped
    pub min_energy: f32,

    pub autocorrelation: AutocorrelationConfig,

    /// Fixed duration given to every detected note
    pub note_duration_secs: f64,

    /// velocity = floor(energy * velocity_scale)
    pub velocity_scale: f32,

    /// Same-pitch detections closer than this are merged
    pub min_gap_secs: f64,
}

impl ScanConfig {
    pub fn enhanced() -> Self {
        ScanConfig {
            hop_secs: 0.03,
            window_size: 8192,
            min_energy: 0.003,
            autocorrelation: AutocorrelationConfig {
                min_frequency: 60.0,
                max_frequency: 2500.0,
                normalized: true,
                min_correlation: 0.3,
            },
            note_duration_secs: 0.2,
            velocity_scale: 300.0,
            min_gap_secs: 0.08,
        }
    }

    pub fn simple() -> Self {
        ScanConfig {
            hop_secs: 0.05,
            window_size: 4096,
            min_energy: 0.002,
            autocorrelation: AutocorrelationConfig {
                min_frequency: 80.0,
                max_frequency: 2000.0,
                normalized: false,
                min_correlation: 0.1,
            },
            note_duration_secs: 0.15,
            velocity_scale: 400.0,
            min_gap_secs: 0.1,
        }
    }

    /// Overlay a partial JSON object onto this preset
    fn overlay(self, partial: Value) -> Result<Self, serde_json::Error> {
        let mut merged = serde_json::to_value(self)?;
        merge_json(&mut merged, partial);
        serde_json::from_value(merged)
    }
}

fn merge_json(base: &mut Value, partial: Value) {
    match (base, partial) {
        (Value::Object(base), Value::Object(partial)) => {
            for (key, value) in partial {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn enhanced_scan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ScanConfig, D::Error> {
    let partial = Value::deserialize(deserializer)?;
    ScanConfig::enhanced().overlay(partial).map_err(serde::de::Error::custom)
}

fn simple_scan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ScanConfig, D::Error> {
    let partial = Value::deserialize(deserializer)?;
    ScanConfig::simple().overlay(partial).map_err(serde::de::Error::custom)
}

/// Configuration for the offline pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub mode: AnalysisMode,

    /// Windows (or onsets) processed per step before yielding
    pub yield_every: usize,

    pub preprocess: PreprocessConfig,
    pub onset: OnsetConfig,

    /// Samples analysed after each onset
    pub pitch_window: usize,

    pub autocorrelation: AutocorrelationConfig,

    /// Onset-mode velocity = floor(onset energy * velocity_scale)
    pub velocity_scale: f32,

    pub duration: DurationConfig,
    pub refine: RefineConfig,

    /// Missing fields fall back to `ScanConfig::enhanced()`
    #[serde(deserialize_with = "enhanced_scan")]
    pub enhanced: ScanConfig,

    /// Missing fields fall back to `ScanConfig::simple()`
    #[serde(deserialize_with = "simple_scan")]
    pub simple: ScanConfig,
    pub tempo: TempoConfig,
    pub quantize: QuantizeSettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            mode: AnalysisMode::default(),
            yield_every: 50,
            preprocess: PreprocessConfig::default(),
            onset: OnsetConfig::default(),
            pitch_window: 4096,
            autocorrelation: AutocorrelationConfig::default(),
            velocity_scale: 500.0,
            duration: DurationConfig::default(),
            refine: RefineConfig::default(),
            enhanced: ScanConfig::enhanced(),
            simple: ScanConfig::simple(),
            tempo: TempoConfig::default(),
            quantize: QuantizeSettings::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn with_mode(mode: AnalysisMode) -> Self {
        AnalysisConfig {
            mode,
            ..Default::default()
        }
    }
}

/// Shared "keep going" flag
///
/// Starts active; any clone can clear it and every holder sees the change.
#[derive(Debug, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag(Arc::new(AtomicBool::new(true)))
    }

    pub fn cancel(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        !self.is_active()
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending { progress: f32 },
    Complete(RawTranscription),
}

enum Stage {
    Onsets {
        detector: OnsetDetector,
        onsets: Vec<OnsetMark>,
    },
    Pitches {
        onsets: Vec<OnsetMark>,
        next: usize,
        events: Vec<NoteEvent>,
    },
    Scan {
        position: usize,
        visited: usize,
        events: Vec<NoteEvent>,
    },
    Finished(RawTranscription),
}

/// Resumable offline transcription pass
pub struct AnalysisJob {
    config: AnalysisConfig,
    buffer: SampleBuffer,
    cancel: CancelFlag,
    stage: Stage,
    total_windows: usize,
}

impl AnalysisJob {
    /// Prepare a job; fails on empty input before any filtering
    pub fn new(buffer: &SampleBuffer, config: AnalysisConfig, cancel: CancelFlag) -> Result<Self, TranscriptionError> {
        if buffer.is_empty() {
            return Err(crate::audio::AudioError::InvalidInput("empty audio buffer".to_string()).into());
        }

        let yield_every = config.yield_every.max(1);
        let config = AnalysisConfig { yield_every, ..config };

        let (analysed, stage, total_windows) = match config.mode {
            AnalysisMode::Onset => {
                let cleaned = preprocess(buffer, &config.preprocess)?;
                let detector = OnsetDetector::new(config.onset.clone(), cleaned.sample_rate());
                let total = detector.total_windows(cleaned.len());
                let stage = Stage::Onsets {
                    detector,
                    onsets: Vec::new(),
                };
                (cleaned, stage, total)
            }
            AnalysisMode::Enhanced | AnalysisMode::Simple => {
                let scan = scan_config(&config);
                let hop = scan_hop(scan, buffer.sample_rate());
                let total = if buffer.len() > scan.window_size {
                    (buffer.len() - scan.window_size).div_ceil(hop)
                } else {
                    0
                };
                let stage = Stage::Scan {
                    position: 0,
                    visited: 0,
                    events: Vec::new(),
                };
                (buffer.clone(), stage, total)
            }
        };

        log::info!(
            "Starting {:?} analysis: {} samples at {} Hz, {} windows",
            config.mode,
            buffer.len(),
            buffer.sample_rate(),
            total_windows
        );

        Ok(AnalysisJob {
            config,
            buffer: analysed,
            cancel,
            stage,
            total_windows,
        })
    }

    pub fn mode(&self) -> AnalysisMode {
        self.config.mode
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Name of the current stage, used as the trace stage
    pub fn stage_name(&self) -> &'static str {
        match self.stage {
            Stage::Onsets { .. } => "onsets",
            Stage::Pitches { .. } => "pitch",
            Stage::Scan { .. } => "scan",
            Stage::Finished(_) => "finish",
        }
    }

    /// Do one bounded slice of work
    pub fn step(&mut self) -> Result<JobStatus, TranscriptionError> {
        if let Stage::Finished(result) = &self.stage {
            return Ok(JobStatus::Complete(result.clone()));
        }

        if self.cancel.is_cancelled() {
            log::info!("Analysis cancelled during {}", self.stage_name());
            return Err(TranscriptionError::Cancelled);
        }

        let budget = self.config.yield_every;
        let stage = std::mem::replace(&mut self.stage, Stage::Finished(RawTranscription::empty()));

        let (next_stage, progress) = match stage {
            Stage::Onsets { mut detector, mut onsets } => {
                onsets.extend(detector.advance(&self.buffer, budget));

                if detector.is_finished(self.buffer.samples()) {
                    log::debug!("Onset stage found {} onsets", onsets.len());
                    let stage = Stage::Pitches {
                        onsets,
                        next: 0,
                        events: Vec::new(),
                    };
                    (stage, 0.5)
                } else {
                    let visited = detector.visited_windows();
                    let progress = 0.5 * visited as f32 / self.total_windows.max(1) as f32;
                    (Stage::Onsets { detector, onsets }, progress)
                }
            }
            Stage::Pitches { onsets, next, mut events } => {
                let end = next.saturating_add(budget).min(onsets.len());
                for onset in &onsets[next..end] {
                    if let Some(event) = self.event_at_onset(onset) {
                        events.push(event);
                    }
                }

                if end >= onsets.len() {
                    let times: Vec<f64> = onsets.iter().map(|o| o.time).collect();
                    let result = self.finish(events, &times, &self.config.refine.clone());
                    (Stage::Finished(result), 1.0)
                } else {
                    let progress = 0.5 + 0.5 * end as f32 / onsets.len() as f32;
                    (Stage::Pitches { onsets, next: end, events }, progress)
                }
            }
            Stage::Scan {
                mut position,
                mut visited,
                mut events,
            } => {
                let scan = scan_config(&self.config).clone();
                let hop = scan_hop(&scan, self.buffer.sample_rate());
                let mut processed = 0;

                while processed < budget && position + scan.window_size < self.buffer.len() {
                    if let Some(event) = self.scan_window(&scan, position) {
                        events.push(event);
                    }
                    position += hop;
                    visited += 1;
                    processed += 1;
                }

                if position + scan.window_size >= self.buffer.len() {
                    let times: Vec<f64> = events.iter().map(|e| e.start).collect();
                    let refine = RefineConfig {
                        min_gap_secs: scan.min_gap_secs,
                        ..self.config.refine.clone()
                    };
                    let result = self.finish(events, &times, &refine);
                    (Stage::Finished(result), 1.0)
                } else {
                    let progress = visited as f32 / self.total_windows.max(1) as f32;
                    (Stage::Scan { position, visited, events }, progress)
                }
            }
            Stage::Finished(result) => (Stage::Finished(result), 1.0),
        };

        self.stage = next_stage;

        match &self.stage {
            Stage::Finished(result) => Ok(JobStatus::Complete(result.clone())),
            _ => Ok(JobStatus::Pending {
                progress: progress.clamp(0.0, 1.0),
            }),
        }
    }

    /// Step until done, reporting progress after every step
    pub fn run_to_completion<S: ProgressSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> Result<RawTranscription, TranscriptionError> {
        loop {
            match self.step()? {
                JobStatus::Pending { progress } => {
                    sink.report(TraceEntry::new(self.stage_name(), progress, "Analyzing audio"));
                }
                JobStatus::Complete(result) => {
                    sink.report(self.completion_entry(&result));
                    return Ok(result);
                }
            }
        }
    }

    /// Step until done, yielding to the tokio scheduler between steps
    pub async fn run_async<S: ProgressSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> Result<RawTranscription, TranscriptionError> {
        loop {
            match self.step()? {
                JobStatus::Pending { progress } => {
                    sink.report(TraceEntry::new(self.stage_name(), progress, "Analyzing audio"));
                    tokio::task::yield_now().await;
                }
                JobStatus::Complete(result) => {
                    sink.report(self.completion_entry(&result));
                    return Ok(result);
                }
            }
        }
    }

    fn completion_entry(&self, result: &RawTranscription) -> TraceEntry {
        TraceEntry::new("finish", 1.0, format!("Analysis complete! {} notes detected", result.events.len())).with_data(
            serde_json::json!({
                "mode": self.config.mode,
                "events": result.events.len(),
                "tempo": result.tempo,
            }),
        )
    }

    /// Pitch, duration and velocity for the note starting at an onset
    fn event_at_onset(&self, onset: &OnsetMark) -> Option<NoteEvent> {
        let samples = self.buffer.samples();
        let start = self.buffer.sample_at(onset.time);
        let window = samples.get(start..start + self.config.pitch_window)?;

        let estimate = estimate_pitch(window, self.buffer.sample_rate(), &self.config.autocorrelation)?;
        let note = Note::from_frequency(estimate.frequency)?;
        let duration = estimate_duration(&self.buffer, start, &self.config.duration);

        Some(NoteEvent::new(
            note,
            onset.time,
            duration,
            velocity_from_energy(onset.energy, self.config.velocity_scale),
        ))
    }

    fn scan_window(&self, scan: &ScanConfig, position: usize) -> Option<NoteEvent> {
        let window = &self.buffer.samples()[position..position + scan.window_size];
        let energy = mean_square(window);
        if energy <= scan.min_energy {
            return None;
        }

        let estimate = estimate_pitch(window, self.buffer.sample_rate(), &scan.autocorrelation)?;
        let note = Note::from_frequency(estimate.frequency)?;

        Some(NoteEvent::new(
            note,
            self.buffer.time_at(position),
            scan.note_duration_secs,
            velocity_from_energy(energy, scan.velocity_scale),
        ))
    }

    /// Refine, estimate tempo and quantize
    fn finish(&self, events: Vec<NoteEvent>, onset_times: &[f64], refine: &RefineConfig) -> RawTranscription {
        let detections = events.len();
        let refined = refine_events(&events, refine);
        let tempo = estimate_tempo_with_config(onset_times, &self.config.tempo);
        let quantized = quantize_events(&refined, &self.config.quantize);

        let mut events = quantized.events;
        events.sort_by(NoteEvent::chronological);

        log::info!(
            "{:?} analysis: {} raw detections, {} events, {} BPM",
            self.config.mode,
            detections,
            events.len(),
            tempo.bpm
        );

        RawTranscription {
            tempo: tempo.bpm,
            time_signature: TimeSignature::COMMON,
            events,
            sync_offset_ms: quantized.sync_offset_ms,
        }
    }
}

fn scan_config(config: &AnalysisConfig) -> &ScanConfig {
    match config.mode {
        AnalysisMode::Simple => &config.simple,
        _ => &config.enhanced,
    }
}

fn scan_hop(scan: &ScanConfig, sample_rate: u32) -> usize {
    ((sample_rate as f64 * scan.hop_secs).floor() as usize).max(1)
}
