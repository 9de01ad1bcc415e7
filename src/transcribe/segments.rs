use serde::{Deserialize, Serialize};

use super::Transcript;
use crate::utils::format_offset;

/// `verbose_json` body returned by the transcription endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct VerboseTranscription {
    #[serde(default)]
    pub text: String,

    pub language: Option<String>,

    /// Audio duration in seconds
    pub duration: Option<f64>,

    /// Absent when the server ignores `verbose_json`
    pub segments: Option<Vec<Segment>>,
}

/// Individual transcript segment with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    #[serde(default)]
    pub start: f64,

    /// End time in seconds
    #[serde(default)]
    pub end: f64,

    #[serde(default)]
    pub text: String,
}

impl Segment {
    /// `[MM:SS - MM:SS] text`
    pub fn render(&self) -> String {
        format!(
            "[{} - {}] {}",
            format_offset(self.start),
            format_offset(self.end),
            self.text.trim()
        )
    }
}

impl VerboseTranscription {
    /// Build the transcript. Blank segments are dropped from both renderings.
    pub fn into_transcript(self) -> Transcript {
        match self.segments {
            Some(segments) => {
                let segments: Vec<Segment> = segments
                    .into_iter()
                    .filter(|s| !s.text.trim().is_empty())
                    .collect();

                if segments.is_empty() {
                    return Transcript::plain(self.text.trim());
                }

                let text = segments
                    .iter()
                    .map(|s| s.text.trim())
                    .collect::<Vec<_>>()
                    .join(" ");
                let timestamped = segments
                    .iter()
                    .map(Segment::render)
                    .collect::<Vec<_>>()
                    .join("\n");

                Transcript {
                    text,
                    timestamped: Some(timestamped),
                    language: self.language,
                    segments,
                }
            }
            None => {
                let mut transcript = Transcript::plain(self.text.trim());
                transcript.language = self.language;
                transcript
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_render_both_variants() {
        let body = r#"{
            "text": "ignored when segments exist",
            "language": "chinese",
            "duration": 75.2,
            "segments": [
                {"id": 0, "start": 0.0, "end": 4.5, "text": " 大家好 "},
                {"id": 1, "start": 4.5, "end": 9.0, "text": "   "},
                {"id": 2, "start": 65.0, "end": 75.2, "text": "welcome back"}
            ]
        }"#;

        let transcript = serde_json::from_str::<VerboseTranscription>(body)
            .unwrap()
            .into_transcript();

        assert_eq!(transcript.text, "大家好 welcome back");
        assert_eq!(
            transcript.timestamped.as_deref(),
            Some("[00:00 - 00:04] 大家好\n[01:05 - 01:15] welcome back")
        );
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.language.as_deref(), Some("chinese"));
    }

    #[test]
    fn test_plain_text_response_has_no_timestamps() {
        let body = r#"{"text": " just text "}"#;
        let transcript = serde_json::from_str::<VerboseTranscription>(body)
            .unwrap()
            .into_transcript();

        assert_eq!(transcript.text, "just text");
        assert!(transcript.timestamped.is_none());
        assert!(transcript.segments.is_empty());
    }
}
