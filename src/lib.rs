//! Linkscribe - turn a video link into transcripts and a formatted document
//!
//! A link is classified by platform, the video is downloaded, its audio extracted and
//! transcribed through an OpenAI-compatible API, and the transcript post-processed by a
//! chat model. [`pipeline::PipelineController`] sequences those stages and always answers
//! with a single [`pipeline::ResultEnvelope`], even when a stage fails.

pub mod audio;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod health;
pub mod openai;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod server;
pub mod text;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use health::{HealthSnapshot, ServiceHealth};
pub use pipeline::{PipelineController, PipelineError, ResultEnvelope, TranscribeRequest};
pub use platform::{PlatformInfo, PlatformType};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
