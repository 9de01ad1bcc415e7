use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::pipeline::{ResultEnvelope, StageReport};
use crate::utils::sanitize_filename;

/// Files written for one job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub transcript: Option<PathBuf>,
    pub transcript_with_timestamps: Option<PathBuf>,
    pub formatted_text: Option<PathBuf>,
    pub result_json: PathBuf,
}

impl ArtifactPaths {
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.transcript
            .iter()
            .chain(self.transcript_with_timestamps.iter())
            .chain(self.formatted_text.iter())
            .chain(std::iter::once(&self.result_json))
    }
}

/// Save the envelope and every produced artifact under `dir`.
///
/// Transcripts go to `transcriptions/`, the formatted document and result JSON to
/// `processed/`. File names carry the platform id and the processing timestamp.
pub fn save_artifacts(envelope: &ResultEnvelope, dir: &Path) -> Result<ArtifactPaths> {
    let transcriptions = dir.join("transcriptions");
    let processed = dir.join("processed");
    fs_err::create_dir_all(&transcriptions).context("Failed to create transcriptions directory")?;
    fs_err::create_dir_all(&processed).context("Failed to create processed directory")?;

    let id = envelope
        .platform_info
        .as_ref()
        .map(|p| sanitize_filename(&p.platform_id))
        .unwrap_or_else(|| "unknown".to_string());
    let stamp = envelope.processing_time.format("%Y%m%d_%H%M%S");
    let files = &envelope.output_files;

    let write = |path: PathBuf, content: &str| -> Result<PathBuf> {
        fs_err::write(&path, content)?;
        tracing::debug!("Saved artifact: {}", path.display());
        Ok(path)
    };

    let transcript = files
        .transcript
        .as_deref()
        .map(|text| write(transcriptions.join(format!("transcript_{}_{}.txt", id, stamp)), text))
        .transpose()?;

    let transcript_with_timestamps = files
        .transcript_with_timestamps
        .as_deref()
        .map(|text| {
            write(
                transcriptions.join(format!("transcript_with_timestamps_{}_{}.txt", id, stamp)),
                text,
            )
        })
        .transpose()?;

    let formatted_text = files
        .formatted_text
        .as_deref()
        .map(|text| write(processed.join(format!("processed_transcript_{}_{}.md", id, stamp)), text))
        .transpose()?;

    let json = serde_json::to_string_pretty(envelope).context("Failed to serialize result")?;
    let result_json = write(
        processed.join(format!("transcription_result_{}_{}.json", id, stamp)),
        &json,
    )?;

    Ok(ArtifactPaths {
        transcript,
        transcript_with_timestamps,
        formatted_text,
        result_json,
    })
}

/// Human-readable rendering of an envelope
pub fn format_as_text(envelope: &ResultEnvelope) -> String {
    let mut out = String::new();
    let files = &envelope.output_files;

    if let Some(video) = &envelope.video_info {
        out.push_str(&format!("{} {}\n", style("Title:").bold(), video.title));
        if let Some(duration) = &video.duration {
            out.push_str(&format!("{} {}\n", style("Duration:").bold(), duration));
        }
        out.push('\n');
    }

    if let Some(error) = &envelope.error {
        out.push_str(&format!("{} {}\n", style("Error:").red().bold(), error));
        return out;
    }

    match (&files.transcript_with_timestamps, &files.transcript) {
        (Some(timestamped), _) => {
            out.push_str(&format!("{}\n{}\n", style("Transcript").bold().underlined(), timestamped));
        }
        (None, Some(plain)) => {
            out.push_str(&format!("{}\n{}\n", style("Transcript").bold().underlined(), plain));
        }
        (None, None) => {}
    }

    match &files.formatted_text {
        Some(formatted) => {
            out.push_str(&format!("\n{}\n{}\n", style("Formatted").bold().underlined(), formatted));
        }
        None => {
            out.push_str(&format!(
                "\n{} {}\n",
                style("Note:").yellow().bold(),
                files.result_json.message
            ));
        }
    }

    out
}

pub fn format_as_json(envelope: &ResultEnvelope) -> Result<String> {
    serde_json::to_string_pretty(envelope).context("Failed to serialize result")
}

/// One line per stage: status, attempts and elapsed time
pub fn format_stage_reports(reports: &[StageReport]) -> String {
    reports
        .iter()
        .map(|r| {
            let mut line = format!("  {:<14} {}", r.stage.label(), r.status);
            if let Some(ms) = r.elapsed_ms {
                line.push_str(&format!(" ({} ms", ms));
                if r.attempts > 1 {
                    line.push_str(&format!(", {} attempts", r.attempts));
                }
                line.push(')');
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print the envelope to the console
pub fn print_to_console(envelope: &ResultEnvelope, format: &OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Text => format_as_text(envelope),
        OutputFormat::Json => format_as_json(envelope)?,
    };

    println!("{}", content);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Job, PipelineError, Stage};
    use crate::platform::{PlatformInfo, PlatformType};
    use crate::transcribe::Transcript;
    use std::time::Duration;

    fn success_envelope(formatted: bool) -> ResultEnvelope {
        let mut job = Job::new("https://youtu.be/abc123");
        job.platform_info = Some(PlatformInfo::new(PlatformType::Youtube, "abc123", "https://youtu.be/abc123"));
        for stage in &Stage::ALL[..4] {
            job.stages.start(*stage).unwrap();
            job.stages.succeed(*stage, Duration::from_millis(3)).unwrap();
        }
        job.transcript = Some(Transcript {
            text: "hello".into(),
            timestamped: Some("[00:00 - 00:01] hello".into()),
            language: None,
            segments: Vec::new(),
        });
        if formatted {
            job.stages.start(Stage::FormatText).unwrap();
            job.stages.succeed(Stage::FormatText, Duration::ZERO).unwrap();
            job.formatted_text = Some("# Hello".into());
        }
        job.finish();
        ResultEnvelope::from_job(&job)
    }

    #[test]
    fn test_save_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let envelope = success_envelope(true);

        let paths = save_artifacts(&envelope, dir.path()).unwrap();
        assert_eq!(paths.iter().count(), 4);

        let name = paths.transcript.as_ref().unwrap().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("transcript_abc123_"));
        assert!(paths.formatted_text.as_ref().unwrap().starts_with(dir.path().join("processed")));

        let saved: ResultEnvelope =
            serde_json::from_str(&fs_err::read_to_string(&paths.result_json).unwrap()).unwrap();
        assert_eq!(saved.output_files.transcript.as_deref(), Some("hello"));
    }

    #[test]
    fn test_save_failure_writes_only_result() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = Job::new("not-a-url");
        job.abort(PipelineError::UnsupportedPlatform("not-a-url".into()));
        job.finish();

        let paths = save_artifacts(&ResultEnvelope::from_job(&job), dir.path()).unwrap();
        assert_eq!(paths.iter().count(), 1);
        assert!(paths
            .result_json
            .to_string_lossy()
            .contains("transcription_result_unknown_"));
    }

    #[test]
    fn test_text_rendering_mentions_format_failure() {
        console::set_colors_enabled(false);
        let text = format_as_text(&success_envelope(false));
        assert!(text.contains("[00:00 - 00:01] hello"));
        assert!(text.contains("Note:"));
    }

    #[test]
    fn test_stage_report_lines() {
        let envelope_job = {
            let mut job = Job::new("x");
            job.stages.start(Stage::Classify).unwrap();
            job.stages.succeed(Stage::Classify, Duration::from_millis(12)).unwrap();
            job.finish();
            job
        };
        let lines = format_stage_reports(&envelope_job.stage_reports());
        assert!(lines.starts_with("  classify       succeeded (12 ms)"));
        assert!(lines.contains("fetch          skipped"));
    }
}
