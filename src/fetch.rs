//! Binary downloads of article thumbnails.
//!
//! [`AssetFetcher`] writes remote bytes to a local path. The HTTP side sits
//! behind the [`HttpFetch`] trait; [`ReqwestFetcher`] is the production
//! implementation with an explicit request timeout.

use crate::config::ImageExtension;
use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, instrument};
use uuid::Uuid;

/// A fetched response body with the bits of metadata we care about.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchedAsset {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedAsset>;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<FetchedAsset> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedAsset {
            status,
            content_type,
            bytes,
        })
    }
}

/// Downloads assets to disk. No retries: the caller decides what a failure means.
#[derive(Clone)]
pub struct AssetFetcher {
    http: Arc<dyn HttpFetch>,
    extension: ImageExtension,
}

impl AssetFetcher {
    pub fn new(http: Arc<dyn HttpFetch>, extension: ImageExtension) -> Self {
        Self { http, extension }
    }

    /// Download `url` into `destination`, creating or overwriting the file.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        let asset = self.fetch(url).await?;
        write_asset(&asset, destination).await
    }

    /// Download a thumbnail into `dir` under a fresh random file name.
    ///
    /// Names come from a new UUID, never from the content, so concurrent or
    /// repeated downloads cannot collide.
    #[instrument(level = "debug", skip(self, dir))]
    pub async fn save_thumbnail(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let path = match self.extension {
            ImageExtension::Fixed => {
                let path = thumbnail_path(dir, "jpg");
                self.download(url, &path).await?;
                path
            }
            ImageExtension::FromContentType => {
                let asset = self.fetch(url).await?;
                let path = thumbnail_path(dir, extension_for(asset.content_type.as_deref()));
                write_asset(&asset, &path).await?;
                path
            }
        };
        debug!(path = %path.display(), "Saved thumbnail");
        Ok(path)
    }

    async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
        let asset = self.http.get(url).await?;
        if !asset.is_success() {
            return Err(ScrapeError::Fetch {
                url: url.to_string(),
                status: asset.status,
            });
        }
        Ok(asset)
    }
}

fn thumbnail_path(dir: &Path, ext: &str) -> PathBuf {
    dir.join(format!("{}.{ext}", Uuid::new_v4().simple()))
}

async fn write_asset(asset: &FetchedAsset, destination: &Path) -> Result<()> {
    fs::write(destination, &asset.bytes).await?;
    debug!(path = %destination.display(), bytes = asset.bytes.len(), "Wrote asset");
    Ok(())
}

/// File extension for an image `Content-Type`; unknown types fall back to `jpg`.
pub fn extension_for(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase());
    match mime.as_deref() {
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        Some("image/svg+xml") => "svg",
        Some("image/avif") => "avif",
        _ => "jpg",
    }
}
