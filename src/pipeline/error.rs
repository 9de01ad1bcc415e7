use serde::{Deserialize, Serialize};

use super::stage::{Stage, TransitionError};
use crate::audio::ExtractionError;
use crate::fetch::FetchError;
use crate::text::FormattingError;
use crate::transcribe::TranscriptionError;

/// Stable tag for a pipeline failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    UnsupportedPlatform,
    FetchError,
    ExtractionError,
    TranscriptionError,
    FormattingError,
    Cancelled,
    Internal,
}

/// Why a job stopped, or degraded
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported or unrecognized video link: {0}")]
    UnsupportedPlatform(String),

    #[error("video download failed after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: FetchError,
    },

    #[error("audio extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    Formatting(#[from] FormattingError),

    #[error("job cancelled before stage {stage}")]
    Cancelled { stage: Stage },

    #[error("internal pipeline error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn missing_url() -> Self {
        PipelineError::InvalidRequest("missing required parameter: video_url".to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PipelineError::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            PipelineError::Fetch { .. } => ErrorKind::FetchError,
            PipelineError::Extraction(_) => ErrorKind::ExtractionError,
            PipelineError::Transcription(_) => ErrorKind::TranscriptionError,
            PipelineError::Formatting(_) => ErrorKind::FormattingError,
            PipelineError::Cancelled { .. } => ErrorKind::Cancelled,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Failures confined to text processing leave the job successful
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Formatting(_)
                | PipelineError::Cancelled {
                    stage: Stage::FormatText
                }
        )
    }

    /// The stage that raised the error, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::InvalidRequest(_) | PipelineError::Internal(_) => None,
            PipelineError::UnsupportedPlatform(_) => Some(Stage::Classify),
            PipelineError::Fetch { .. } => Some(Stage::Fetch),
            PipelineError::Extraction(_) => Some(Stage::ExtractAudio),
            PipelineError::Transcription(_) => Some(Stage::Transcribe),
            PipelineError::Formatting(_) => Some(Stage::FormatText),
            PipelineError::Cancelled { stage } => Some(*stage),
        }
    }
}

impl From<TransitionError> for PipelineError {
    fn from(error: TransitionError) -> Self {
        PipelineError::Internal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_formatting_is_recoverable() {
        assert!(PipelineError::Formatting(FormattingError::Timeout).is_recoverable());
        assert!(PipelineError::Cancelled {
            stage: Stage::FormatText
        }
        .is_recoverable());
        assert!(!PipelineError::Cancelled {
            stage: Stage::Transcribe
        }
        .is_recoverable());
        assert!(!PipelineError::Transcription(TranscriptionError::Timeout).is_recoverable());
        assert!(!PipelineError::missing_url().is_recoverable());
        assert!(!PipelineError::Fetch {
            attempts: 2,
            source: FetchError::EmptyFile
        }
        .is_recoverable());
    }

    #[test]
    fn test_messages() {
        assert!(PipelineError::missing_url().to_string().contains("missing required parameter"));
        assert!(PipelineError::UnsupportedPlatform("not-a-url".into())
            .to_string()
            .contains("unsupported or unrecognized"));
        assert_eq!(
            PipelineError::Fetch {
                attempts: 2,
                source: FetchError::Timeout("yt-dlp exceeded 300s".into())
            }
            .to_string(),
            "video download failed after 2 attempt(s): download timed out: yt-dlp exceeded 300s"
        );
    }

    #[test]
    fn test_kind_and_stage() {
        let err = PipelineError::Cancelled {
            stage: Stage::Transcribe,
        };
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.stage(), Some(Stage::Transcribe));
        assert_eq!(
            serde_json::to_string(&ErrorKind::UnsupportedPlatform).unwrap(),
            "\"unsupported_platform\""
        );
    }
}
