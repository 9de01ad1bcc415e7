//! Matchers for video hosting sites. Each returns the site's own video id.

use url::Url;

use super::{host_matches, segments, LinkMatcher, PlatformType};

fn is_alphanumeric_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_youtube_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_numeric_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

/// bilibili.com video, bangumi, medialist and course pages, plus b23.tv short links
pub struct BilibiliMatcher;

impl LinkMatcher for BilibiliMatcher {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Bilibili
    }

    fn match_link(&self, url: &Url) -> Option<String> {
        let segs = segments(url);

        let id = if host_matches(url, "b23.tv") {
            segs.first().copied()
        } else if host_matches(url, "bilibili.com") {
            match segs.as_slice() {
                ["video", id, ..] => Some(*id),
                ["bangumi" | "medialist" | "cheese", "play", id, ..] => Some(*id),
                _ => None,
            }
        } else {
            None
        }?;

        is_alphanumeric_id(id).then(|| id.to_string())
    }
}

/// youtube.com watch, embed and shorts pages, plus youtu.be short links
pub struct YoutubeMatcher;

impl LinkMatcher for YoutubeMatcher {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Youtube
    }

    fn match_link(&self, url: &Url) -> Option<String> {
        let segs = segments(url);

        let id = if host_matches(url, "youtu.be") {
            segs.first().map(|s| s.to_string())
        } else if host_matches(url, "youtube.com") {
            match segs.as_slice() {
                ["watch"] => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                ["embed" | "shorts" | "v", id, ..] => Some(id.to_string()),
                _ => None,
            }
        } else {
            None
        }?;

        is_youtube_id(&id).then_some(id)
    }
}

/// vimeo.com numeric ids and the player embed
pub struct VimeoMatcher;

impl LinkMatcher for VimeoMatcher {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Vimeo
    }

    fn match_link(&self, url: &Url) -> Option<String> {
        let segs = segments(url);

        let id = if url.host_str() == Some("player.vimeo.com") {
            match segs.as_slice() {
                ["video", id, ..] => Some(*id),
                _ => None,
            }
        } else if host_matches(url, "vimeo.com") {
            segs.first().copied()
        } else {
            None
        }?;

        is_numeric_id(id).then(|| id.to_string())
    }
}

/// douyin.com video pages and v.douyin.com share links
pub struct DouyinMatcher;

impl LinkMatcher for DouyinMatcher {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Douyin
    }

    fn match_link(&self, url: &Url) -> Option<String> {
        let segs = segments(url);

        let id = if url.host_str() == Some("v.douyin.com") {
            segs.first().copied()
        } else if host_matches(url, "douyin.com") {
            match segs.as_slice() {
                ["video", id, ..] => Some(*id),
                _ => None,
            }
        } else {
            None
        }?;

        is_alphanumeric_id(id).then(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_for(matcher: &dyn LinkMatcher, link: &str) -> Option<String> {
        matcher.match_link(&Url::parse(link).unwrap())
    }

    #[test]
    fn test_bilibili_links() {
        let m = BilibiliMatcher;
        assert_eq!(
            id_for(&m, "https://www.bilibili.com/video/BV1Dt4y1o7bU?p=2").as_deref(),
            Some("BV1Dt4y1o7bU")
        );
        assert_eq!(id_for(&m, "https://m.bilibili.com/video/BV1xx/").as_deref(), Some("BV1xx"));
        assert_eq!(id_for(&m, "https://b23.tv/Ab12Cd").as_deref(), Some("Ab12Cd"));
        assert_eq!(
            id_for(&m, "https://www.bilibili.com/bangumi/play/ep12345").as_deref(),
            Some("ep12345")
        );
        assert_eq!(id_for(&m, "https://www.bilibili.com/read/cv123"), None);
        assert_eq!(id_for(&m, "https://notbilibili.com/video/BV1"), None);
    }

    #[test]
    fn test_youtube_links() {
        let m = YoutubeMatcher;
        assert_eq!(
            id_for(&m, "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(id_for(&m, "https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            id_for(&m, "https://www.youtube.com/embed/a_b-c").as_deref(),
            Some("a_b-c")
        );
        assert_eq!(id_for(&m, "https://m.youtube.com/shorts/xyz").as_deref(), Some("xyz"));
        assert_eq!(id_for(&m, "https://www.youtube.com/watch"), None);
        assert_eq!(id_for(&m, "https://www.youtube.com/@channel"), None);
    }

    #[test]
    fn test_vimeo_links() {
        let m = VimeoMatcher;
        assert_eq!(id_for(&m, "https://vimeo.com/76979871").as_deref(), Some("76979871"));
        assert_eq!(
            id_for(&m, "https://player.vimeo.com/video/76979871").as_deref(),
            Some("76979871")
        );
        assert_eq!(id_for(&m, "https://vimeo.com/channels"), None);
    }

    #[test]
    fn test_douyin_links() {
        let m = DouyinMatcher;
        assert_eq!(
            id_for(&m, "https://www.douyin.com/video/7123456789").as_deref(),
            Some("7123456789")
        );
        assert_eq!(id_for(&m, "https://v.douyin.com/iRNBho6/").as_deref(), Some("iRNBho6"));
        assert_eq!(id_for(&m, "https://www.douyin.com/user/abc"), None);
    }
}
