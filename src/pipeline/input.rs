//! Input resolution: turn a page's image reference into bytes.
//!
//! Page storage hands the pipeline one reference per page — usually a local
//! path under the upload directory, occasionally a URL when storage sits
//! behind a CDN. Either way the image is small enough to hold in memory, so
//! resolution reads the whole payload rather than staging it on disk.

use crate::error::DocufactError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the reference string looks like a URL.
pub fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Resolve an image reference to raw bytes.
///
/// If the reference is a URL, download it with the given timeout.
/// If it is a local file, validate it exists and is readable.
pub async fn resolve_image(reference: &str, timeout_secs: u64) -> Result<Vec<u8>, DocufactError> {
    if is_url(reference) {
        download_image(reference, timeout_secs).await
    } else {
        read_local(reference)
    }
}

/// Read a local image file, mapping IO failures onto the input taxonomy.
fn read_local(path_str: &str) -> Result<Vec<u8>, DocufactError> {
    let path = PathBuf::from(path_str);

    match std::fs::read(&path) {
        Ok(bytes) => {
            debug!("resolved local image: {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(DocufactError::PermissionDenied { path })
        }
        Err(_) => Err(DocufactError::ImageNotFound { path }),
    }
}

/// Download a URL-shaped reference into memory.
async fn download_image(url: &str, timeout_secs: u64) -> Result<Vec<u8>, DocufactError> {
    info!("downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocufactError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocufactError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocufactError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocufactError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| DocufactError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    debug!("downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}
