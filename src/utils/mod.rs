use url::Url;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Render a duration in seconds as `HH:MM:SS`
pub fn format_clock(seconds: f64) -> String {
    let total_seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Render an offset in seconds as `MM:SS`; minutes are not wrapped into hours
pub fn format_offset(seconds: f64) -> String {
    let total_seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };

    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
            _ => '_',
        })
        .collect();

    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.chars().take(100).collect()
    }
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|host| {
        host.strip_prefix("www.").unwrap_or(host).to_string()
    })
}

/// Truncate text for log lines without splitting a character
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

/// Build an HTTP client; a builder error falls back to reqwest defaults with a warning
pub fn build_http_client(builder: reqwest::ClientBuilder, component: &str) -> reqwest::Client {
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(
            component,
            "Failed to build HTTP client, falling back to defaults without timeout: {}",
            e
        );
        reqwest::Client::new()
    })
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    // ffmpeg only understands `-version`; yt-dlp accepts both
    let flag = if command.ends_with("ffmpeg") || command.ends_with("ffprobe") {
        "-version"
    } else {
        "--version"
    };

    Command::new(command)
        .arg(flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Check if the current environment has required tools
pub async fn check_dependencies(yt_dlp: &str, ffmpeg: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp).await {
        missing.push(format!("{} - required for platform video downloads", yt_dlp));
    }

    if !check_command_available(ffmpeg).await {
        missing.push(format!("{} - required for audio extraction", ffmpeg));
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_falls_back_on_builder_error() {
        let broken = reqwest::Client::builder().user_agent("bad\nagent");
        assert!(reqwest::Client::builder().user_agent("bad\nagent").build().is_err());
        let _client = build_http_client(broken, "test");

        let ok = reqwest::Client::builder().timeout(std::time::Duration::from_secs(5));
        let _client = build_http_client(ok, "test");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(30.0), "00:00:30");
        assert_eq!(format_clock(90.4), "00:01:30");
        assert_eq!(format_clock(3661.0), "01:01:01");
        assert_eq!(format_clock(-5.0), "00:00:00");
        assert_eq!(format_clock(f64::NAN), "00:00:00");
    }

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(0.0), "00:00");
        assert_eq!(format_offset(65.9), "01:05");
        assert_eq!(format_offset(3725.0), "62:05");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World!"), "Hello World_");
        assert_eq!(sanitize_filename("test/file?name"), "test_file_name");
        assert_eq!(sanitize_filename("  spaced  "), "spaced");
        assert_eq!(sanitize_filename("   "), "unknown");
        assert_eq!(sanitize_filename(&"a".repeat(150)).len(), 100);
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.youtube.com/watch?v=123"),
            Some("youtube.com".to_string())
        );
        assert_eq!(
            extract_domain("https://b23.tv/abc"),
            Some("b23.tv".to_string())
        );
        assert_eq!(extract_domain("invalid-url"), None);
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("你好世界你好世界", 4), "你好世界...");
    }
}
