//! Configuration types for document analysis.
//!
//! All pipeline behaviour is controlled through [`AnalysisConfig`], built
//! via its [`AnalysisConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across calls, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::DocufactError;
use crate::oracle::ExtractionOracle;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Delay strategy between quota-exhaustion retries.
///
/// The retry loop itself lives in [`crate::oracle::OracleClient`]; the wait
/// between attempts is injected through this trait so tests can run the full
/// retry path without real wall-clock sleeps.
pub trait Backoff: Send + Sync {
    /// Delay before the retry following failed attempt `attempt` (1-indexed).
    fn delay(&self, attempt: u32) -> Duration;
}

/// Linearly increasing wait: attempt `k` waits `k × base`.
///
/// Quota windows refill on a schedule, so waiting longer on each successive
/// attempt gives the window time to open without the thundering-herd
/// behaviour of immediate retries. With the default 2 s base the sequence is
/// 2 s → 4 s, totalling 6 s of back-off across three attempts.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    pub base: Duration,
}

impl LinearBackoff {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }
}

impl Backoff for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.base * attempt
    }
}

/// No wait between retries. Intended for tests and offline replays.
#[derive(Debug, Clone, Copy)]
pub struct ZeroBackoff;

impl Backoff for ZeroBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Configuration for document analysis.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use docufact::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .max_attempts(3)
///     .retry_base_delay_ms(2000)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Maximum oracle attempts per call when quota exhaustion is reported.
    /// Default: 3.
    ///
    /// Only quota errors are retried; any other oracle failure surfaces on
    /// the first attempt. After the final attempt the typed extraction
    /// wrappers return a degraded placeholder record instead of an error so
    /// callers always receive a well-shaped result.
    pub max_attempts: u32,

    /// Base delay for the linear retry schedule in milliseconds. Default: 2000.
    ///
    /// Attempt `k` waits `k × base` before retrying, so the default schedule
    /// is 2 s then 4 s. Ignored when a custom [`Backoff`] is injected.
    pub retry_base_delay_ms: u64,

    /// Custom backoff strategy. Takes precedence over `retry_base_delay_ms`.
    pub backoff: Option<Arc<dyn Backoff>>,

    /// Upload size above which an image is considered for downscaling, in
    /// bytes. Default: 2 MiB.
    pub max_upload_bytes: u64,

    /// Longer-dimension threshold above which an image is considered for
    /// downscaling, in pixels. Default: 4000.
    pub max_dimension_px: u32,

    /// Longer-dimension target when downscaling, in pixels. Default: 3000.
    ///
    /// Oracle vision endpoints reject oversized payloads and charge by
    /// resolution; 3000 px keeps ID-card and A4 text legible while staying
    /// well under typical request limits. Images already at or below the
    /// target are never upscaled.
    pub target_dimension_px: u32,

    /// Characters of raw oracle text preserved for diagnostics when JSON
    /// recovery fails. Default: 500.
    pub raw_preview_chars: usize,

    /// Download timeout for URL-shaped image references in seconds.
    /// Default: 120.
    pub download_timeout_secs: u64,

    /// Pre-constructed extraction oracle. Takes precedence over
    /// `provider_name`. This is the seam tests use to inject deterministic
    /// doubles that simulate quota errors.
    pub oracle: Option<Arc<dyn ExtractionOracle>>,

    /// Oracle provider name (e.g. "gemini", "openai", "anthropic").
    /// If None along with `oracle`, the provider is auto-detected from the
    /// environment.
    pub provider_name: Option<String>,

    /// Oracle model identifier, e.g. "gemini-2.0-flash".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Progress callback fired per page during multi-page analysis.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay_ms: 2000,
            backoff: None,
            max_upload_bytes: 2 * 1024 * 1024,
            max_dimension_px: 4000,
            target_dimension_px: 3000,
            raw_preview_chars: 500,
            download_timeout_secs: 120,
            oracle: None,
            provider_name: None,
            model: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("backoff", &self.backoff.as_ref().map(|_| "<dyn Backoff>"))
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_dimension_px", &self.max_dimension_px)
            .field("target_dimension_px", &self.target_dimension_px)
            .field("raw_preview_chars", &self.raw_preview_chars)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("oracle", &self.oracle.as_ref().map(|_| "<dyn ExtractionOracle>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// The effective backoff strategy: the injected one, or a
    /// [`LinearBackoff`] derived from `retry_base_delay_ms`.
    pub fn effective_backoff(&self) -> Arc<dyn Backoff> {
        match &self.backoff {
            Some(b) => Arc::clone(b),
            None => Arc::new(LinearBackoff::new(Duration::from_millis(
                self.retry_base_delay_ms,
            ))),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_base_delay_ms = ms;
        self
    }

    pub fn backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.config.backoff = Some(backoff);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn max_dimension_px(mut self, px: u32) -> Self {
        self.config.max_dimension_px = px.max(100);
        self
    }

    pub fn target_dimension_px(mut self, px: u32) -> Self {
        self.config.target_dimension_px = px.max(100);
        self
    }

    pub fn raw_preview_chars(mut self, n: usize) -> Self {
        self.config.raw_preview_chars = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn ExtractionOracle>) -> Self {
        self.config.oracle = Some(oracle);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, DocufactError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(DocufactError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.target_dimension_px > c.max_dimension_px {
            return Err(DocufactError::InvalidConfig(format!(
                "target_dimension_px ({}) must not exceed max_dimension_px ({})",
                c.target_dimension_px, c.max_dimension_px
            )));
        }
        Ok(self.config)
    }
}
