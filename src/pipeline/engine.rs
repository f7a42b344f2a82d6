// Transcription engine
// Entry point tying the offline analysis job to difficulty filtering

use crate::audio::SampleBuffer;
use crate::events::{
    finalize, BackendChain, BackendContext, Difficulty, RawTranscription, TranscriptionBackend, TranscriptionError,
    TranscriptionResult,
};
use crate::pipeline::job::{AnalysisConfig, AnalysisJob, CancelFlag};
use crate::pipeline::trace::ProgressSink;

pub const DSP_BACKEND: &str = "dsp";

/// Offline transcriber
///
/// Holds configuration only; every call analyses its buffer from scratch.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionEngine {
    config: AnalysisConfig,
}

impl TranscriptionEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        TranscriptionEngine { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Start a resumable job for the host to drive
    pub fn job(&self, buffer: &SampleBuffer, cancel: CancelFlag) -> Result<AnalysisJob, TranscriptionError> {
        AnalysisJob::new(buffer, self.config.clone(), cancel)
    }

    /// Transcribe a whole buffer without progress reporting
    pub fn transcribe(
        &self,
        buffer: &SampleBuffer,
        difficulty: Difficulty,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        self.transcribe_with(buffer, difficulty, CancelFlag::new(), &mut ())
    }

    pub fn transcribe_with<S: ProgressSink + ?Sized>(
        &self,
        buffer: &SampleBuffer,
        difficulty: Difficulty,
        cancel: CancelFlag,
        sink: &mut S,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let raw = self.job(buffer, cancel)?.run_to_completion(sink)?;
        Ok(finalize(raw, difficulty, DSP_BACKEND))
    }

    /// Same as `transcribe_with`, yielding to the runtime between steps
    pub async fn transcribe_async<S: ProgressSink + ?Sized>(
        &self,
        buffer: &SampleBuffer,
        difficulty: Difficulty,
        cancel: CancelFlag,
        sink: &mut S,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let mut job = self.job(buffer, cancel)?;
        let raw = job.run_async(sink).await?;
        Ok(finalize(raw, difficulty, DSP_BACKEND))
    }

    /// A backend chain ending in this engine's own analysis
    pub fn fallback_chain(&self, mut chain: BackendChain) -> BackendChain {
        chain.push(Box::new(DspBackend::new(self.config.clone())));
        chain
    }
}

/// Local signal-processing backend; always available
#[derive(Debug, Clone, Default)]
pub struct DspBackend {
    config: AnalysisConfig,
}

impl DspBackend {
    pub fn new(config: AnalysisConfig) -> Self {
        DspBackend { config }
    }
}

impl TranscriptionBackend for DspBackend {
    fn name(&self) -> &str {
        DSP_BACKEND
    }

    fn transcribe(
        &self,
        buffer: &SampleBuffer,
        ctx: &mut BackendContext<'_>,
    ) -> Result<RawTranscription, TranscriptionError> {
        let mut job = AnalysisJob::new(buffer, self.config.clone(), ctx.cancel.clone())?;
        job.run_to_completion(&mut *ctx.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::job::AnalysisMode;
    use crate::pipeline::TraceEntry;

    const SR: u32 = 44100;

    fn chord_buffer() -> SampleBuffer {
        // Quiet lead-in, then C4 + E4 + G4 together
        let freqs = [261.63f32, 329.63, 392.0];
        let mut samples = vec![0.0; SR as usize / 2];
        samples.extend((0..SR as usize).map(|i| {
            freqs
                .iter()
                .map(|f| 0.2 * (2.0 * std::f32::consts::PI * f * i as f32 / SR as f32).sin())
                .sum::<f32>()
        }));
        samples.extend(vec![0.0; SR as usize / 2]);
        SampleBuffer::new(SR, samples).unwrap()
    }

    #[test]
    fn test_silence_gives_no_events() {
        let silent = SampleBuffer::new(SR, vec![0.0; SR as usize]).unwrap();
        let result = TranscriptionEngine::default().transcribe(&silent, Difficulty::Advanced).unwrap();

        assert!(result.events.is_empty());
        assert!(result.all_events.is_empty());
        assert_eq!(result.tempo, 120);
        assert_eq!(result.sync_offset_ms, 0);
        assert_eq!(result.backend.as_deref(), Some(DSP_BACKEND));
    }

    #[test]
    fn test_empty_buffer_is_invalid() {
        let empty = SampleBuffer::new(SR, Vec::<f32>::new()).unwrap();
        let err = TranscriptionEngine::default()
            .transcribe(&empty, Difficulty::Beginner)
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::InvalidInput(_)));
    }

    #[test]
    fn test_difficulty_only_changes_events() {
        let engine = TranscriptionEngine::new(AnalysisConfig::with_mode(AnalysisMode::Simple));
        let buffer = chord_buffer();

        let advanced = engine.transcribe(&buffer, Difficulty::Advanced).unwrap();
        let beginner = engine.transcribe(&buffer, Difficulty::Beginner).unwrap();

        assert_eq!(advanced.all_events, beginner.all_events);
        assert_eq!(advanced.events.len(), advanced.all_events.len());
        assert!(beginner.events.len() <= advanced.events.len());
        assert!(beginner.events.iter().all(|e| advanced.all_events.contains(e)));
    }

    #[test]
    fn test_chunked_matches_single_pass() {
        let buffer = chord_buffer();

        let single = TranscriptionEngine::new(AnalysisConfig {
            yield_every: usize::MAX,
            ..Default::default()
        });
        let chunked = TranscriptionEngine::new(AnalysisConfig {
            yield_every: 3,
            ..Default::default()
        });

        let a = single.transcribe(&buffer, Difficulty::Advanced).unwrap();
        let b = chunked.transcribe(&buffer, Difficulty::Advanced).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = TranscriptionEngine::default()
            .transcribe_with(&chord_buffer(), Difficulty::Advanced, cancel, &mut ())
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::Cancelled));
    }

    #[test]
    fn test_dsp_backend_closes_chain() {
        struct Down;

        impl TranscriptionBackend for Down {
            fn name(&self) -> &str {
                "remote"
            }

            fn transcribe(
                &self,
                _: &SampleBuffer,
                _: &mut BackendContext<'_>,
            ) -> Result<RawTranscription, TranscriptionError> {
                Err(TranscriptionError::unavailable("remote", "connection refused"))
            }
        }

        let engine = TranscriptionEngine::default();
        let chain = engine.fallback_chain(BackendChain::new().with(Down));
        assert_eq!(chain.names(), vec!["remote".to_string(), DSP_BACKEND.to_string()]);

        let mut trace: Vec<TraceEntry> = Vec::new();
        let mut ctx = BackendContext::new(CancelFlag::new(), &mut trace);
        let result = chain.transcribe(&chord_buffer(), Difficulty::Intermediate, &mut ctx).unwrap();

        assert_eq!(result.backend.as_deref(), Some(DSP_BACKEND));
        assert_eq!(trace.last().map(|e| e.stage.as_str()), Some("finish"));
    }

    #[tokio::test]
    async fn test_async_transcription() {
        let engine = TranscriptionEngine::default();
        let buffer = chord_buffer();

        let expected = engine.transcribe(&buffer, Difficulty::Intermediate).unwrap();

        let mut trace: Vec<TraceEntry> = Vec::new();
        let result = engine
            .transcribe_async(&buffer, Difficulty::Intermediate, CancelFlag::new(), &mut trace)
            .await
            .unwrap();

        assert_eq!(result, expected);
        assert!(trace.iter().all(|e| (0.0..=1.0).contains(&e.progress)));
    }
}
