//! Error types for the docufact library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocufactError`] — **Fatal**: the operation cannot proceed at all
//!   (missing image for a single-image extraction, no oracle configured,
//!   non-retryable oracle API failure). Returned as `Err(DocufactError)`
//!   from the top-level entry points.
//!
//! * [`PageError`] — **Non-fatal**: a single page of a multi-page document
//!   failed (unreadable image, oracle quota exhausted, unparseable JSON)
//!   but all other pages are fine. Converted into an error placeholder
//!   [`crate::output::PageRecord`] and folded into the merged document so
//!   callers see partial success rather than losing the whole document to
//!   one bad page.
//!
//! The separation lets callers decide their own tolerance: inspect
//! `MergedRecord::pages` for per-page errors, or treat any `error` field as
//! a reason to fall back to manual review.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docufact library.
///
/// Page-level failures use [`PageError`] and are stored inside
/// [`crate::output::PageRecord`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DocufactError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Image file was not found at the given path.
    #[error("image not found: '{path}'\nCheck the path exists and is readable.")]
    ImageNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The image bytes could not be decoded.
    #[error("image could not be decoded: {detail}")]
    ImageDecode { detail: String },

    // ── Oracle errors ─────────────────────────────────────────────────────
    /// The configured oracle provider is not initialised (missing API key etc.).
    #[error("oracle provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The oracle returned a non-retryable error.
    #[error("oracle API error: {message}")]
    OracleApiError { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page of a multi-page document.
///
/// Converted into an error placeholder [`crate::output::PageRecord`]; the
/// overall analysis continues with the remaining pages.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page's image reference could not be resolved or read.
    #[error("page {page}: image unavailable: {detail}")]
    ImageUnavailable { page: usize, detail: String },

    /// The page's image bytes could not be decoded.
    #[error("page {page}: image could not be decoded: {detail}")]
    DecodeFailed { page: usize, detail: String },

    /// Oracle call failed after all quota retries, or with a non-retryable error.
    #[error("page {page}: oracle call failed after {attempts} attempts: {detail}")]
    OracleFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },

    /// The sanitised oracle response could not be parsed as a JSON object.
    #[error("page {page}: no JSON object could be recovered from the oracle response: {detail}")]
    JsonRecovery { page: usize, detail: String },
}

impl PageError {
    /// The 1-indexed page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::ImageUnavailable { page, .. }
            | PageError::DecodeFailed { page, .. }
            | PageError::OracleFailed { page, .. }
            | PageError::JsonRecovery { page, .. } => *page,
        }
    }
}
