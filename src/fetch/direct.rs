use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::{FetchError, FetchedMedia, MediaFetcher, VideoInfo};
use crate::config::DownloadConfig;
use crate::health::HealthSnapshot;
use crate::platform::PlatformInfo;
use crate::utils::{build_http_client, format_file_size, sanitize_filename};

const BROWSER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Streams media files from direct links
pub struct DirectFetcher {
    client: Client,
    max_file_size: u64,
}

impl DirectFetcher {
    pub fn new(timeout: Duration, max_file_size: u64) -> Self {
        let client = build_http_client(Client::builder().timeout(timeout), "direct_fetcher");

        Self {
            client,
            max_file_size,
        }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(
            Duration::from_secs(config.timeout_secs),
            config.max_file_size_bytes(),
        )
    }

    /// Browser-like headers; bilibili's CDN refuses requests without a bilibili referer
    pub fn request_headers(url: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
        );

        if url.contains("bilivideo.com") {
            headers.insert(REFERER, HeaderValue::from_static("https://www.bilibili.com/"));
            headers.insert(ORIGIN, HeaderValue::from_static("https://www.bilibili.com"));
        }

        headers
    }

    /// Derive a readable title from a file name
    pub fn title_from_filename(filename: &str) -> String {
        let stem = match filename.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => &filename[..dot_pos],
            _ => filename,
        };
        stem.replace(['_', '-'], " ").trim().to_string()
    }
}

#[async_trait]
impl MediaFetcher for DirectFetcher {
    async fn fetch(&self, platform: &PlatformInfo, work_dir: &Path) -> Result<FetchedMedia, FetchError> {
        let url = &platform.url;
        let filename = sanitize_filename(&platform.platform_id);
        let output_path = work_dir.join(&filename);

        tracing::info!("Downloading direct link to: {}", output_path.display());

        let response = self
            .client
            .get(url)
            .headers(Self::request_headers(url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status().as_u16(),
                url: url.clone(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_file_size {
                return Err(FetchError::TooLarge {
                    size: length,
                    limit: self.max_file_size,
                });
            }
        }

        let mut file = tokio::fs::File::create(&output_path).await?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    tokio::fs::remove_file(&output_path).await.ok();
                    return Err(e.into());
                }
            };
            downloaded += chunk.len() as u64;

            if downloaded > self.max_file_size {
                drop(file);
                tokio::fs::remove_file(&output_path).await.ok();
                return Err(FetchError::TooLarge {
                    size: downloaded,
                    limit: self.max_file_size,
                });
            }

            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if downloaded == 0 {
            tokio::fs::remove_file(&output_path).await.ok();
            return Err(FetchError::EmptyFile);
        }

        tracing::info!(
            size = %format_file_size(downloaded),
            "Direct download complete"
        );

        Ok(FetchedMedia {
            path: output_path,
            info: VideoInfo {
                title: Self::title_from_filename(&platform.platform_id),
                duration: None,
                size_bytes: downloaded,
                url: url.clone(),
            },
        })
    }

    async fn health_snapshot(&self) -> HealthSnapshot {
        HealthSnapshot::ok("direct_fetcher")
    }
}
