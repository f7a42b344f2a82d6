// Transcription backend abstraction
// Backends are tried in order; an unavailable backend falls through to the next

use thiserror::Error;

use crate::audio::{AudioError, SampleBuffer};
use crate::events::adapters::{sanitize_events, NoteSequence, ServiceReply};
use crate::events::difficulty::{filter_by_difficulty, Difficulty};
use crate::events::types::{RawTranscription, TranscriptionResult};
use crate::pipeline::{CancelFlag, ProgressSink, TraceEntry};

/// Errors that can occur during transcription
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Unusable input; no backend can do better
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] AudioError),

    /// This backend cannot run right now; the next one may
    #[error("Backend {backend} unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("Transcription cancelled")]
    Cancelled,

    #[error("No transcription backend available (tried: {attempted:?})")]
    NoBackendAvailable { attempted: Vec<String> },
}

impl TranscriptionError {
    pub fn unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        TranscriptionError::BackendUnavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Whether the chain should move on to the next backend
    pub fn falls_through(&self) -> bool {
        matches!(self, TranscriptionError::BackendUnavailable { .. })
    }
}

/// Per-run context handed to a backend
pub struct BackendContext<'a> {
    pub cancel: CancelFlag,
    pub progress: &'a mut dyn ProgressSink,
}

impl<'a> BackendContext<'a> {
    pub fn new(cancel: CancelFlag, progress: &'a mut dyn ProgressSink) -> Self {
        BackendContext { cancel, progress }
    }

    pub fn check_cancelled(&self) -> Result<(), TranscriptionError> {
        if self.cancel.is_active() {
            Ok(())
        } else {
            Err(TranscriptionError::Cancelled)
        }
    }
}

/// Something that turns samples into note events
pub trait TranscriptionBackend {
    fn name(&self) -> &str;

    /// Cheap capability check run before `transcribe`
    fn probe(&self) -> Result<(), TranscriptionError> {
        Ok(())
    }

    fn transcribe(
        &self,
        buffer: &SampleBuffer,
        ctx: &mut BackendContext<'_>,
    ) -> Result<RawTranscription, TranscriptionError>;
}

/// Backend that hands audio to a conversion service and parses its JSON reply
///
/// The transport is supplied by the host (HTTP client, IPC, fixture) and
/// returns the reply body or a failure description.
pub struct ServiceBackend<F> {
    name: String,
    transport: F,
}

impl<F> ServiceBackend<F>
where
    F: Fn(&SampleBuffer) -> Result<String, String>,
{
    pub fn new(name: impl Into<String>, transport: F) -> Self {
        ServiceBackend {
            name: name.into(),
            transport,
        }
    }
}

impl<F> TranscriptionBackend for ServiceBackend<F>
where
    F: Fn(&SampleBuffer) -> Result<String, String>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transcribe(
        &self,
        buffer: &SampleBuffer,
        ctx: &mut BackendContext<'_>,
    ) -> Result<RawTranscription, TranscriptionError> {
        ctx.progress.report(TraceEntry::new(self.name.as_str(), 0.1, "Uploading audio"));

        let body = (self.transport)(buffer).map_err(|reason| TranscriptionError::unavailable(&self.name, reason))?;
        ctx.check_cancelled()?;

        let reply = ServiceReply::from_json(&body)
            .map_err(|e| TranscriptionError::unavailable(&self.name, format!("malformed reply: {}", e)))?;
        let raw = reply
            .into_raw()
            .map_err(|reason| TranscriptionError::unavailable(&self.name, reason))?;

        ctx.progress.report(TraceEntry::new(self.name.as_str(), 1.0, "Service conversion complete"));
        Ok(raw)
    }
}

/// Backend wrapping an in-process transcription model
pub struct ModelBackend<F> {
    name: String,
    model: F,
}

impl<F> ModelBackend<F>
where
    F: Fn(&SampleBuffer) -> Result<NoteSequence, String>,
{
    pub fn new(name: impl Into<String>, model: F) -> Self {
        ModelBackend {
            name: name.into(),
            model,
        }
    }
}

impl<F> TranscriptionBackend for ModelBackend<F>
where
    F: Fn(&SampleBuffer) -> Result<NoteSequence, String>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transcribe(
        &self,
        buffer: &SampleBuffer,
        ctx: &mut BackendContext<'_>,
    ) -> Result<RawTranscription, TranscriptionError> {
        ctx.progress.report(TraceEntry::new(self.name.as_str(), 0.25, "Running model"));

        let sequence = (self.model)(buffer).map_err(|reason| TranscriptionError::unavailable(&self.name, reason))?;
        ctx.check_cancelled()?;

        ctx.progress.report(TraceEntry::new(self.name.as_str(), 1.0, "Model transcription complete"));
        Ok(sequence.into_raw())
    }
}

/// Ordered list of backends, tried until one succeeds
#[derive(Default)]
pub struct BackendChain {
    backends: Vec<Box<dyn TranscriptionBackend + Send + Sync>>,
}

impl BackendChain {
    pub fn new() -> Self {
        BackendChain { backends: Vec::new() }
    }

    /// Append a backend; earlier backends are preferred
    pub fn with(mut self, backend: impl TranscriptionBackend + Send + Sync + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    pub fn push(&mut self, backend: Box<dyn TranscriptionBackend + Send + Sync>) {
        self.backends.push(backend);
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Run the first backend that works and filter its output
    pub fn transcribe(
        &self,
        buffer: &SampleBuffer,
        difficulty: Difficulty,
        ctx: &mut BackendContext<'_>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        if buffer.is_empty() {
            return Err(AudioError::InvalidInput("empty audio buffer".to_string()).into());
        }

        let mut attempted = Vec::new();

        for backend in &self.backends {
            ctx.check_cancelled()?;

            let name = backend.name().to_string();
            attempted.push(name.clone());

            if let Err(e) = backend.probe() {
                if e.falls_through() {
                    log::warn!("Skipping backend {}: {}", name, e);
                    continue;
                }
                return Err(e);
            }

            log::info!("Transcribing with backend {}", name);

            match backend.transcribe(buffer, ctx) {
                Ok(raw) => return Ok(finalize(raw, difficulty, &name)),
                Err(e) if e.falls_through() => {
                    log::warn!("Backend {} failed, falling back: {}", name, e);
                }
                Err(e) => return Err(e),
            }
        }

        log::error!("All transcription backends failed: {:?}", attempted);
        Err(TranscriptionError::NoBackendAvailable { attempted })
    }
}

/// Turn backend output into a playable result
pub fn finalize(raw: RawTranscription, difficulty: Difficulty, backend: &str) -> TranscriptionResult {
    let all_events = sanitize_events(raw.events);
    let events = filter_by_difficulty(&all_events, difficulty);

    log::info!(
        "{} produced {} events ({} after {:?} filter) at {} BPM",
        backend,
        all_events.len(),
        events.len(),
        difficulty,
        raw.tempo
    );

    TranscriptionResult {
        tempo: raw.tempo.clamp(60, 200),
        time_signature: raw.time_signature,
        events,
        all_events,
        sync_offset_ms: raw.sync_offset_ms,
        backend: Some(backend.to_string()),
    }
}
