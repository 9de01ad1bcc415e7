//! Pipeline orchestration: stage sequencing, per-stage status tracking, bounded fetch
//! retries and assembly of the result envelope.
//!
//! A job moves through [`Stage::ALL`] in order. Failures in classify, fetch,
//! extract-audio or transcribe abort the job and skip everything after them. A
//! format-text failure is absorbed: the job still succeeds with the raw transcripts
//! and `text_processing_success = false`.

pub mod controller;
pub mod envelope;
pub mod error;
pub mod job;
pub mod retry;
pub mod stage;

pub use controller::PipelineController;
pub use envelope::{OutputFiles, ResultEnvelope, ResultJson, TranscribeRequest};
pub use error::{ErrorKind, PipelineError};
pub use job::{Job, StageReport};
pub use retry::{RetryPolicy, Retryable};
pub use stage::{Stage, StageRecord, StageStatus, StageTracker};
