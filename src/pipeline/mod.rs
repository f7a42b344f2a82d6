// Pipeline execution and monitoring module
// Drives offline analysis in resumable steps and reports its progress

pub mod engine;
pub mod job;
pub mod trace;

pub use engine::{DspBackend, TranscriptionEngine, DSP_BACKEND};
pub use job::{AnalysisConfig, AnalysisJob, AnalysisMode, CancelFlag, JobStatus, ScanConfig};
pub use trace::{read_trace_file, LogProgress, ProgressSink, TraceEntry, TraceError, TraceWriter};
