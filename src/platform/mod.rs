use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub mod direct;
pub mod hosted;

use crate::health::HealthSnapshot;
use crate::utils::extract_domain;

/// Video platforms the classifier can recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformType {
    Bilibili,
    Youtube,
    Vimeo,
    Douyin,
    DirectLink,
    Unknown,
}

impl PlatformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Bilibili => "bilibili",
            PlatformType::Youtube => "youtube",
            PlatformType::Vimeo => "vimeo",
            PlatformType::Douyin => "douyin",
            PlatformType::DirectLink => "direct-link",
            PlatformType::Unknown => "unknown",
        }
    }

    /// Lower value wins when several links appear in one input.
    /// Direct links need no page parsing, so they go first.
    pub fn priority(&self) -> u8 {
        match self {
            PlatformType::DirectLink => 0,
            PlatformType::Bilibili => 1,
            PlatformType::Youtube => 2,
            PlatformType::Vimeo => 3,
            PlatformType::Douyin => 4,
            PlatformType::Unknown => 5,
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    #[serde(rename = "type")]
    pub platform_type: PlatformType,

    pub platform_id: String,

    /// The link the classification was made from
    #[serde(skip)]
    pub url: String,
}

impl PlatformInfo {
    pub fn new(platform_type: PlatformType, platform_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            platform_type,
            platform_id: platform_id.into(),
            url: url.into(),
        }
    }
}

/// Maps user input to a platform, or `None` when nothing usable is recognised
#[cfg_attr(test, mockall::automock)]
pub trait PlatformClassifier: Send + Sync {
    fn classify(&self, input: &str) -> Option<PlatformInfo>;

    fn health_snapshot(&self) -> HealthSnapshot;
}

/// Recognises links belonging to one platform
pub trait LinkMatcher: Send + Sync {
    fn platform_type(&self) -> PlatformType;

    /// Return the platform id if the link belongs to this platform
    fn match_link(&self, url: &Url) -> Option<String>;
}

/// Registry of link matchers, consulted in registration order
pub struct ClassifierRegistry {
    matchers: Vec<Box<dyn LinkMatcher>>,
    accept_generic_links: bool,
}

impl ClassifierRegistry {
    /// Create a new registry with the default matchers
    pub fn new(accept_generic_links: bool) -> Self {
        let mut registry = Self {
            matchers: Vec::new(),
            accept_generic_links,
        };

        registry.register(Box::new(direct::DirectLinkMatcher::new()));
        registry.register(Box::new(hosted::BilibiliMatcher));
        registry.register(Box::new(hosted::YoutubeMatcher));
        registry.register(Box::new(hosted::VimeoMatcher));
        registry.register(Box::new(hosted::DouyinMatcher));

        registry
    }

    pub fn register(&mut self, matcher: Box<dyn LinkMatcher>) {
        self.matchers.push(matcher);
    }

    /// List all recognised platforms
    pub fn list_platforms(&self) -> Vec<PlatformType> {
        self.matchers.iter().map(|m| m.platform_type()).collect()
    }

    /// Classify a single link
    pub fn classify_link(&self, link: &str) -> Option<PlatformInfo> {
        let parsed = validate_url(link)?;

        for matcher in &self.matchers {
            if let Some(id) = matcher.match_link(&parsed) {
                return Some(PlatformInfo::new(matcher.platform_type(), id, link));
            }
        }

        if self.accept_generic_links {
            let domain = extract_domain(link)?;
            return Some(PlatformInfo::new(PlatformType::Unknown, domain, link));
        }

        None
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PlatformClassifier for ClassifierRegistry {
    fn classify(&self, input: &str) -> Option<PlatformInfo> {
        let links = extract_links(input);
        tracing::debug!(count = links.len(), "Extracted links from input");

        let primary = links
            .iter()
            .filter_map(|link| self.classify_link(link))
            .min_by_key(|info| info.platform_type.priority());

        if let Some(info) = &primary {
            tracing::info!(
                platform = %info.platform_type,
                platform_id = %info.platform_id,
                "Classified link"
            );
        }

        primary
    }

    fn health_snapshot(&self) -> HealthSnapshot {
        HealthSnapshot::ok("link_classifier")
    }
}

/// Accept only well-formed HTTP(S) URLs with a host
pub fn validate_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url).ok()?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }

    Some(parsed)
}

/// Pull every `http(s)://` link out of free text, in order of appearance
pub fn extract_links(text: &str) -> Vec<String> {
    const TERMINATORS: &[char] = &[
        '<', '>', '"', '{', '}', '|', '\\', '^', '`', '[', ']', '，', '。', '、', '（', '）',
    ];

    let mut links = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find("http") {
        let start = cursor + offset;
        let rest = &text[start..];

        if !(rest.starts_with("http://") || rest.starts_with("https://")) {
            cursor = start + "http".len();
            continue;
        }

        let len = rest
            .find(|c: char| c.is_whitespace() || TERMINATORS.contains(&c))
            .unwrap_or(rest.len());
        let link = rest[..len].trim_end_matches(|c: char| matches!(c, ',' | '.' | ';' | ')'));

        if link.len() > "https://".len() {
            links.push(link.to_string());
        }
        cursor = start + len.max(1);
    }

    links
}

/// True when the URL host is `domain` or a subdomain of it
pub(crate) fn host_matches(url: &Url, domain: &str) -> bool {
    match url.host_str() {
        Some(host) => host == domain || host.ends_with(&format!(".{}", domain)),
        None => false,
    }
}

/// Non-empty path segments of a URL
pub(crate) fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ClassifierRegistry {
        ClassifierRegistry::new(true)
    }

    #[test]
    fn test_bilibili_video_link() {
        let info = registry()
            .classify("https://www.bilibili.com/video/BV1Dt4y1o7bU")
            .unwrap();
        assert_eq!(info.platform_type, PlatformType::Bilibili);
        assert_eq!(info.platform_id, "BV1Dt4y1o7bU");
        assert_eq!(info.url, "https://www.bilibili.com/video/BV1Dt4y1o7bU");
    }

    #[test]
    fn test_not_a_url_is_unrecognized() {
        assert!(registry().classify("not-a-url").is_none());
        assert!(registry().classify("").is_none());
        assert!(registry().classify("ftp://example.com/video.mp4").is_none());
    }

    #[test]
    fn test_generic_links_follow_setting() {
        let info = registry().classify("https://www.example.org/watch/42").unwrap();
        assert_eq!(info.platform_type, PlatformType::Unknown);
        assert_eq!(info.platform_id, "example.org");

        assert!(ClassifierRegistry::new(false)
            .classify("https://www.example.org/watch/42")
            .is_none());
    }

    #[test]
    fn test_direct_link_wins_over_platform_link() {
        let text = "see https://youtu.be/dQw4w9WgXcQ or grab https://cdn.example.com/a/clip.mp4?x=1";
        let info = registry().classify(text).unwrap();
        assert_eq!(info.platform_type, PlatformType::DirectLink);
        assert_eq!(info.platform_id, "clip.mp4");
        assert_eq!(info.url, "https://cdn.example.com/a/clip.mp4?x=1");
    }

    #[test]
    fn test_extract_links_from_text() {
        let links = extract_links(
            "【视频】https://b23.tv/abc123，还有 <https://vimeo.com/76979871>. httpnot",
        );
        assert_eq!(links, vec!["https://b23.tv/abc123", "https://vimeo.com/76979871"]);
    }

    #[test]
    fn test_platform_type_serializes_kebab_case() {
        let info = PlatformInfo::new(PlatformType::DirectLink, "a.mp4", "https://x/a.mp4");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "direct-link");
        assert_eq!(json["platform_id"], "a.mp4");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn test_list_platforms() {
        let platforms = registry().list_platforms();
        assert_eq!(platforms.first(), Some(&PlatformType::DirectLink));
        assert!(platforms.contains(&PlatformType::Douyin));
    }
}
