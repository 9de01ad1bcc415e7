use std::path::Path;
use url::Url;

use super::{segments, LinkMatcher, PlatformType};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg"];

/// Direct links to media files; the id is the decoded file name
pub struct DirectLinkMatcher;

impl DirectLinkMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Check if a file name carries a known audio or video extension
    pub fn is_media_file(filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map(|ext| {
                VIDEO_EXTENSIONS.contains(&ext.as_str()) || AUDIO_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

impl Default for DirectLinkMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkMatcher for DirectLinkMatcher {
    fn platform_type(&self) -> PlatformType {
        PlatformType::DirectLink
    }

    fn match_link(&self, url: &Url) -> Option<String> {
        let filename = segments(url).last().copied()?;

        if !Self::is_media_file(filename) {
            return None;
        }

        let decoded = urlencoding::decode(filename)
            .map(|name| name.into_owned())
            .unwrap_or_else(|_| filename.to_string());

        Some(decoded)
    }
}
