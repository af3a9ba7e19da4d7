/*!
 * Best-effort image search for a presentation topic.
 *
 * Image URLs come from the SerpAPI Google Images engine. Each URL is
 * downloaded once with a short timeout and kept only when the payload is a
 * recognized image format. Per-URL failures are collected, never retried.
 */

use bytes::Bytes;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_config::ImageConfig;
use crate::errors::ImageError;
use crate::file_utils::{sanitize_file_stem, FileManager};

/// SerpAPI search response (only the fields used here)
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    images_results: Vec<ImageResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    #[serde(default)]
    original: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

/// An image stored on disk
#[derive(Debug, Clone, PartialEq)]
pub struct SavedImage {
    /// Where it came from
    pub url: String,
    /// Where it was written
    pub path: PathBuf,
}

/// Outcome of one image run
#[derive(Debug, Default)]
pub struct ImageReport {
    /// Images that downloaded and decoded
    pub saved: Vec<SavedImage>,
    /// URLs that were skipped, with the reason
    pub skipped: Vec<(String, ImageError)>,
}

/// Searches and downloads topic images
#[derive(Debug)]
pub struct ImageFetcher {
    client: Client,
    search_endpoint: String,
    api_key: String,
    max_images: usize,
    images_dir: PathBuf,
}

impl ImageFetcher {
    pub fn new(config: &ImageConfig, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs.max(1)))
                .build()
                .unwrap_or_default(),
            search_endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            max_images: config.max_images,
            images_dir: images_dir.into(),
        }
    }

    /// Image URLs for a topic, at most `max_images`
    pub async fn search(&self, topic: &str) -> Result<Vec<String>, ImageError> {
        let response = self.client.get(&self.search_endpoint)
            .query(&[
                ("engine", "google_images"),
                ("q", topic),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ImageError::SearchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::SearchFailed(format!("search responded with status {}", status)));
        }

        let body: SearchResponse = response.json().await
            .map_err(|e| ImageError::SearchFailed(format!("unreadable search response: {}", e)))?;

        if let Some(message) = body.error {
            return Err(ImageError::SearchFailed(message));
        }

        Ok(collect_urls(body.images_results, self.max_images))
    }

    /// Download one image and store it as `<stem>-<n>.<ext>`
    pub async fn download(&self, url: &str, stem: &str, n: usize) -> Result<SavedImage, ImageError> {
        let response = self.client.get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Http { url: url.to_string(), status_code: status.as_u16() });
        }

        let data = response.bytes().await.map_err(|e| classify(url, e))?;
        let path = store_image(&self.images_dir, stem, n, url, &data)?;
        debug!("Saved image {} to {:?}", url, path);

        Ok(SavedImage { url: url.to_string(), path })
    }

    /// Search for a topic and download every result that is a real image
    pub async fn fetch(&self, topic: &str) -> Result<ImageReport, ImageError> {
        let urls = self.search(topic).await?;
        let stem = sanitize_file_stem(topic);
        let mut report = ImageReport::default();

        for (n, url) in urls.iter().enumerate() {
            match self.download(url, &stem, n + 1).await {
                Ok(saved) => report.saved.push(saved),
                Err(e) => {
                    warn!("{}. Skipping this image.", e);
                    report.skipped.push((url.clone(), e));
                }
            }
        }

        info!("Saved {} of {} images for '{}'", report.saved.len(), urls.len(), topic);
        Ok(report)
    }
}

fn collect_urls(results: Vec<ImageResult>, max_images: usize) -> Vec<String> {
    results.into_iter()
        .filter_map(|r| r.original.or(r.thumbnail))
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
        .take(max_images)
        .collect()
}

fn classify(url: &str, error: reqwest::Error) -> ImageError {
    if error.is_timeout() {
        ImageError::Timeout(url.to_string())
    } else if error.is_connect() {
        ImageError::Connection(url.to_string())
    } else {
        ImageError::SearchFailed(format!("{}: {}", url, error))
    }
}

// Writes the payload only when it sniffs as an image format.
fn store_image(dir: &Path, stem: &str, n: usize, url: &str, data: &Bytes) -> Result<PathBuf, ImageError> {
    let format = image::guess_format(data)
        .map_err(|_| ImageError::UnrecognizedFormat(url.to_string()))?;
    let extension = format.extensions_str().first().copied().unwrap_or("img");

    let path = dir.join(format!("{}-{}.{}", stem, n, extension));
    FileManager::write_bytes(&path, data)
        .map_err(|e| ImageError::Io(std::io::Error::other(e.to_string())))?;
    Ok(path)
}
