use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::job::Job;
use crate::fetch::VideoInfo;
use crate::platform::{PlatformInfo, PlatformType};

/// Body of a transcription request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscribeRequest {
    #[serde(default)]
    pub video_url: Option<String>,
}

impl TranscribeRequest {
    pub fn new(video_url: impl Into<String>) -> Self {
        Self {
            video_url: Some(video_url.into()),
        }
    }
}

/// The single response returned for every job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    pub processing_time: DateTime<Utc>,
    pub platform_info: Option<PlatformInfo>,
    pub video_info: Option<VideoInfo>,
    pub output_files: OutputFiles,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFiles {
    pub transcript: Option<String>,
    pub transcript_with_timestamps: Option<String>,
    pub formatted_text: Option<String>,
    pub result_json: ResultJson,
}

/// Summary object echoed inside the output bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultJson {
    pub input_url: String,
    pub platform_type: Option<PlatformType>,
    pub platform_id: Option<String>,
    pub processing_time: DateTime<Utc>,
    pub text_processing_success: bool,
    pub text_processing_error: Option<String>,
    pub message: String,
}

/// An envelope whose fields contradict each other
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("successful envelope has no transcript")]
    MissingTranscript,

    #[error("successful envelope carries an error")]
    UnexpectedError,

    #[error("failed envelope has no error description")]
    MissingError,

    #[error("failed envelope carries output files")]
    OutputOnFailure,

    #[error("text processing flag disagrees with formatted text")]
    TextProcessingMismatch,
}

impl ResultEnvelope {
    /// Assemble the envelope from a finished job
    pub fn from_job(job: &Job) -> Self {
        let processing_time = job.completed_at.unwrap_or_else(Utc::now);
        let success = job.is_success();

        let (transcript, transcript_with_timestamps, formatted_text) = if success {
            let transcript = job.transcript.as_ref();
            (
                transcript.map(|t| t.text.clone()),
                transcript.and_then(|t| t.timestamped.clone()),
                job.formatted_text.clone(),
            )
        } else {
            (None, None, None)
        };

        let text_processing_success = success && formatted_text.is_some();
        let text_processing_error = job.text_error.as_ref().map(|e| e.to_string());
        let error = job.error.as_ref().map(|e| e.to_string());

        let message = match (&error, &text_processing_error) {
            (Some(error), _) => error.clone(),
            (None, Some(format_error)) => format!(
                "Video transcription completed - text formatting failed: {}",
                format_error
            ),
            (None, None) => "Video transcription completed - text formatting completed".to_string(),
        };

        Self {
            success,
            processing_time,
            platform_info: job.platform_info.clone(),
            video_info: job.video_info.clone(),
            output_files: OutputFiles {
                transcript,
                transcript_with_timestamps,
                formatted_text,
                result_json: ResultJson {
                    input_url: job.input_url.clone(),
                    platform_type: job.platform_info.as_ref().map(|p| p.platform_type),
                    platform_id: job.platform_info.as_ref().map(|p| p.platform_id.clone()),
                    processing_time,
                    text_processing_success,
                    text_processing_error,
                    message,
                },
            },
            error,
        }
    }

    /// Assemble and validate; an inconsistent envelope is replaced by an internal-error failure
    pub fn checked(job: &Job) -> Self {
        let envelope = Self::from_job(job);
        match envelope.validate() {
            Ok(()) => envelope,
            Err(error) => {
                tracing::error!(job_id = %job.id, "Inconsistent result envelope: {}", error);
                Self::failure(
                    job.input_url.clone(),
                    PipelineError::Internal(error.to_string()).to_string(),
                )
            }
        }
    }

    /// Check the envelope's fields are consistent with each other
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        let files = &self.output_files;

        if self.success {
            if files.transcript.is_none() {
                return Err(EnvelopeError::MissingTranscript);
            }
            if self.error.is_some() {
                return Err(EnvelopeError::UnexpectedError);
            }
        } else {
            if self.error.is_none() {
                return Err(EnvelopeError::MissingError);
            }
            if files.transcript.is_some()
                || files.transcript_with_timestamps.is_some()
                || files.formatted_text.is_some()
            {
                return Err(EnvelopeError::OutputOnFailure);
            }
        }

        if files.result_json.text_processing_success != files.formatted_text.is_some() {
            return Err(EnvelopeError::TextProcessingMismatch);
        }

        Ok(())
    }

    /// Failure envelope for errors raised outside a job
    pub fn failure(input_url: impl Into<String>, error: impl Into<String>) -> Self {
        let processing_time = Utc::now();
        let error = error.into();
        Self {
            success: false,
            processing_time,
            platform_info: None,
            video_info: None,
            output_files: OutputFiles {
                transcript: None,
                transcript_with_timestamps: None,
                formatted_text: None,
                result_json: ResultJson {
                    input_url: input_url.into(),
                    platform_type: None,
                    platform_id: None,
                    processing_time,
                    text_processing_success: false,
                    text_processing_error: None,
                    message: error.clone(),
                },
            },
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;
    use crate::text::FormattingError;
    use crate::transcribe::Transcript;
    use std::time::Duration;

    fn transcribed_job() -> Job {
        let mut job = Job::new("https://www.bilibili.com/video/BV1Dt4y1o7bU");
        job.platform_info = Some(PlatformInfo::new(
            PlatformType::Bilibili,
            "BV1Dt4y1o7bU",
            "https://www.bilibili.com/video/BV1Dt4y1o7bU",
        ));
        for stage in &Stage::ALL[..4] {
            job.stages.start(*stage).unwrap();
            job.stages.succeed(*stage, Duration::ZERO).unwrap();
        }
        job.transcript = Some(Transcript {
            text: "hello world".into(),
            timestamped: Some("[00:00 - 00:02] hello world".into()),
            language: None,
            segments: Vec::new(),
        });
        job
    }

    #[test]
    fn test_full_success() {
        let mut job = transcribed_job();
        job.stages.start(Stage::FormatText).unwrap();
        job.stages.succeed(Stage::FormatText, Duration::ZERO).unwrap();
        job.formatted_text = Some("# Hello\n\nworld".into());
        job.finish();

        let envelope = ResultEnvelope::from_job(&job);
        assert!(envelope.success);
        assert!(envelope.validate().is_ok());
        assert!(envelope.output_files.result_json.text_processing_success);
        assert_eq!(
            envelope.output_files.result_json.message,
            "Video transcription completed - text formatting completed"
        );

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["platform_info"]["type"], "bilibili");
        assert_eq!(json["platform_info"]["platform_id"], "BV1Dt4y1o7bU");
        assert_eq!(json["output_files"]["result_json"]["platform_type"], "bilibili");
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_format_failure_is_partial_success() {
        let mut job = transcribed_job();
        job.stages.start(Stage::FormatText).unwrap();
        job.stages
            .fail(Stage::FormatText, Duration::ZERO, "timed out")
            .unwrap();
        job.text_error = Some(PipelineError::Formatting(FormattingError::Timeout));
        job.finish();

        let envelope = ResultEnvelope::from_job(&job);
        assert!(envelope.success);
        assert!(envelope.validate().is_ok());
        assert!(envelope.output_files.formatted_text.is_none());
        assert!(envelope.output_files.transcript_with_timestamps.is_some());

        let summary = &envelope.output_files.result_json;
        assert!(!summary.text_processing_success);
        assert_eq!(
            summary.text_processing_error.as_deref(),
            Some("text processing request timed out")
        );
        assert!(summary.message.contains("text formatting failed"));
    }

    #[test]
    fn test_failure_carries_no_output() {
        let mut job = Job::new("");
        job.abort(PipelineError::missing_url());
        job.finish();

        let envelope = ResultEnvelope::from_job(&job);
        assert!(!envelope.success);
        assert!(envelope.validate().is_ok());
        assert!(envelope.platform_info.is_none());
        assert!(envelope
            .error
            .as_deref()
            .unwrap()
            .contains("missing required parameter"));
        assert_eq!(envelope.output_files.result_json.message, envelope.error.clone().unwrap());
    }

    #[test]
    fn test_validate_rejects_contradictions() {
        let mut envelope = ResultEnvelope::failure("x", "boom");
        assert!(envelope.validate().is_ok());

        envelope.output_files.transcript = Some("leak".into());
        assert_eq!(envelope.validate(), Err(EnvelopeError::OutputOnFailure));

        envelope.success = true;
        envelope.error = None;
        envelope.output_files.result_json.text_processing_success = true;
        assert_eq!(envelope.validate(), Err(EnvelopeError::TextProcessingMismatch));
    }

    #[test]
    fn test_request_without_url_deserializes() {
        let request: TranscribeRequest = serde_json::from_str("{}").unwrap();
        assert!(request.video_url.is_none());
    }
}
