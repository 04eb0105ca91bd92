//! Oracle interaction: generation profiles, the injectable oracle trait,
//! the edgequake-llm adapter, and the quota-aware retry wrapper.
//!
//! All prompt text lives in [`crate::prompts`]; this module owns *how* a
//! call is made, not *what* is asked. The pipeline never talks to a
//! provider directly — it goes through [`OracleClient`], which is built
//! from an explicitly constructed [`ExtractionOracle`] instance. Tests
//! inject doubles that fail deterministically; production wraps an
//! [`edgequake_llm::LLMProvider`] in [`VisionOracle`].
//!
//! ## Retry Strategy
//!
//! Quota exhaustion is the one transient failure worth waiting out: the
//! provider's window refills on a schedule, so attempt `k` waits
//! `k × base-delay` (linear) before trying again. Every other error is
//! returned immediately — a malformed request or auth failure will not get
//! better by waiting, and a retry would just burn quota.

use crate::config::Backoff;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Sampling configuration for one oracle call.
///
/// Structured extraction runs cold (temperature 0.1) so the oracle stays
/// faithful to what is printed on the page; only conversational replies
/// warrant creative sampling. `top_p`/`top_k` are carried for oracle
/// implementations that accept them — the edgequake-llm adapter forwards
/// the subset its `CompletionOptions` supports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationProfile {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: usize,
}

impl GenerationProfile {
    /// Cold sampling for structured extraction tasks.
    pub const fn structured(max_output_tokens: usize) -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens,
        }
    }

    /// Warmer sampling for conversational replies (advisory chat callers);
    /// never used by the extraction tasks themselves.
    pub const fn conversational() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }
}

/// The five extraction tasks, each pairing an instruction template with a
/// generation profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleTask {
    /// Structured per-page analysis (entities, dates, signature flag).
    AutoAnalysis,
    /// Full-text transcription as Markdown.
    DocumentMarkdown,
    /// Identity-card field extraction.
    PersonInfo,
    /// Vehicle-registration field extraction.
    VehicleInfo,
    /// Address / place-of-origin extraction for recommendations.
    RegionRecommendation,
}

impl OracleTask {
    /// The instruction template sent with the image.
    pub fn instruction(self) -> &'static str {
        match self {
            OracleTask::AutoAnalysis => prompts::AUTO_ANALYSIS_PROMPT,
            OracleTask::DocumentMarkdown => prompts::DOCUMENT_MARKDOWN_PROMPT,
            OracleTask::PersonInfo => prompts::PERSON_INFO_PROMPT,
            OracleTask::VehicleInfo => prompts::VEHICLE_INFO_PROMPT,
            OracleTask::RegionRecommendation => prompts::REGION_RECOMMENDATION_PROMPT,
        }
    }

    /// Generation profile for this task.
    ///
    /// Transcription and full-page analysis get the large token ceiling;
    /// card-shaped documents fit comfortably in the small one.
    pub fn profile(self) -> GenerationProfile {
        match self {
            OracleTask::AutoAnalysis | OracleTask::DocumentMarkdown => {
                GenerationProfile::structured(8192)
            }
            OracleTask::PersonInfo
            | OracleTask::VehicleInfo
            | OracleTask::RegionRecommendation => GenerationProfile::structured(2048),
        }
    }

    /// Short name used in log lines.
    pub fn name(self) -> &'static str {
        match self {
            OracleTask::AutoAnalysis => "auto-analysis",
            OracleTask::DocumentMarkdown => "document-markdown",
            OracleTask::PersonInfo => "person-info",
            OracleTask::VehicleInfo => "vehicle-info",
            OracleTask::RegionRecommendation => "region-recommendation",
        }
    }
}

/// Failures an oracle call can surface to the pipeline.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// The provider reported rate-limit / quota exhaustion. Retryable.
    #[error("oracle quota exhausted: {0}")]
    QuotaExceeded(String),

    /// Any other provider failure. Not retried by this layer.
    #[error("oracle request failed: {0}")]
    Api(String),
}

impl OracleError {
    pub fn is_quota(&self) -> bool {
        matches!(self, OracleError::QuotaExceeded(_))
    }
}

/// Classify a provider error message into the retry taxonomy.
///
/// Providers disagree on how they spell rate limiting (HTTP 429, gRPC
/// `RESOURCE_EXHAUSTED`, a plain "quota" sentence), so the match is on the
/// message text rather than a provider-specific error enum.
pub fn classify_provider_error(message: impl Into<String>) -> OracleError {
    let message = message.into();
    if message.contains("429")
        || message.contains("RESOURCE_EXHAUSTED")
        || message.to_lowercase().contains("quota")
    {
        OracleError::QuotaExceeded(message)
    } else {
        OracleError::Api(message)
    }
}

/// The external generative document-understanding service.
///
/// Given an instruction and an image, returns free-form text purporting to
/// be JSON or Markdown — never trusted to be well-formed. Object-safe so a
/// config can carry `Arc<dyn ExtractionOracle>` and tests can inject
/// scripted doubles.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    async fn generate(
        &self,
        instruction: &str,
        image: &ImageData,
        profile: &GenerationProfile,
    ) -> Result<String, OracleError>;
}

/// Production oracle backed by an [`edgequake_llm::LLMProvider`].
///
/// ## Message Layout
///
/// 1. **System message** — the task's instruction template
/// 2. **User message** — the page image as a base64 attachment (empty text)
///
/// The empty user text is intentional: provider APIs require at least one
/// user turn to respond to, but the image carries all the actual content.
pub struct VisionOracle {
    provider: Arc<dyn LLMProvider>,
}

impl VisionOracle {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ExtractionOracle for VisionOracle {
    async fn generate(
        &self,
        instruction: &str,
        image: &ImageData,
        profile: &GenerationProfile,
    ) -> Result<String, OracleError> {
        let messages = vec![
            ChatMessage::system(instruction),
            ChatMessage::user_with_images("", vec![image.clone()]),
        ];
        let options = CompletionOptions {
            temperature: Some(profile.temperature),
            max_tokens: Some(profile.max_output_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "oracle response: {} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Err(e) => Err(classify_provider_error(e.to_string())),
        }
    }
}

/// Quota-aware retry wrapper around an [`ExtractionOracle`].
///
/// Up to `max_attempts` tries per call; only [`OracleError::QuotaExceeded`]
/// is retried, with the wait before each retry supplied by the injected
/// [`Backoff`]. After exhaustion the quota error is returned — the typed
/// wrappers in [`crate::analyze`] turn it into a degraded placeholder
/// record so their callers never see a raised quota failure.
pub struct OracleClient {
    oracle: Arc<dyn ExtractionOracle>,
    max_attempts: u32,
    backoff: Arc<dyn Backoff>,
}

impl OracleClient {
    pub fn new(oracle: Arc<dyn ExtractionOracle>, max_attempts: u32, backoff: Arc<dyn Backoff>) -> Self {
        Self {
            oracle,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Number of attempts this client will make on quota errors.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run one task against the oracle, retrying quota exhaustion.
    pub async fn generate(
        &self,
        task: OracleTask,
        image: &ImageData,
    ) -> Result<String, OracleError> {
        let profile = task.profile();
        let mut last_quota: Option<OracleError> = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let wait = self.backoff.delay(attempt - 1);
                warn!(
                    "{}: quota exhausted, retry {}/{} after {:?}",
                    task.name(),
                    attempt,
                    self.max_attempts,
                    wait
                );
                tokio::time::sleep(wait).await;
            }

            match self.oracle.generate(task.instruction(), image, &profile).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_quota() => {
                    warn!("{}: attempt {} hit quota: {}", task.name(), attempt, e);
                    last_quota = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_quota.unwrap_or_else(|| {
            OracleError::QuotaExceeded("quota exhausted with no provider detail".into())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZeroBackoff;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_image() -> ImageData {
        ImageData::new("aGVsbG8=".to_string(), "image/jpeg")
    }

    /// Scripted oracle: fails with `failures` quota errors, then succeeds.
    struct FlakyOracle {
        calls: AtomicU32,
        failures: u32,
        error: OracleError,
    }

    impl FlakyOracle {
        fn quota(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                error: OracleError::QuotaExceeded("429 RESOURCE_EXHAUSTED".into()),
            }
        }

        fn api(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                error: OracleError::Api("400 bad request".into()),
            }
        }
    }

    #[async_trait]
    impl ExtractionOracle for FlakyOracle {
        async fn generate(
            &self,
            _instruction: &str,
            _image: &ImageData,
            _profile: &GenerationProfile,
        ) -> Result<String, OracleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok("{\"ok\": true}".to_string())
            }
        }
    }

    #[test]
    fn classification_recognises_quota_spellings() {
        assert!(classify_provider_error("HTTP 429 Too Many Requests").is_quota());
        assert!(classify_provider_error("rpc error: RESOURCE_EXHAUSTED").is_quota());
        assert!(classify_provider_error("Quota exceeded for model").is_quota());
        assert!(!classify_provider_error("401 unauthorized").is_quota());
        assert!(!classify_provider_error("connection reset by peer").is_quota());
    }

    #[test]
    fn profiles_match_task_shapes() {
        assert_eq!(OracleTask::AutoAnalysis.profile().max_output_tokens, 8192);
        assert_eq!(OracleTask::PersonInfo.profile().max_output_tokens, 2048);
        assert_eq!(OracleTask::PersonInfo.profile().temperature, 0.1);
        assert_eq!(GenerationProfile::conversational().temperature, 0.7);
    }

    #[test]
    fn every_task_has_a_distinct_instruction() {
        let tasks = [
            OracleTask::AutoAnalysis,
            OracleTask::DocumentMarkdown,
            OracleTask::PersonInfo,
            OracleTask::VehicleInfo,
            OracleTask::RegionRecommendation,
        ];
        for (i, a) in tasks.iter().enumerate() {
            for b in &tasks[i + 1..] {
                assert_ne!(a.instruction(), b.instruction(), "{a:?} vs {b:?}");
            }
        }
    }

    #[tokio::test]
    async fn quota_errors_are_retried_until_success() {
        let oracle = Arc::new(FlakyOracle::quota(2));
        let client = OracleClient::new(oracle.clone(), 3, Arc::new(ZeroBackoff));

        let text = client
            .generate(OracleTask::PersonInfo, &test_image())
            .await
            .expect("third attempt should succeed");
        assert_eq!(text, "{\"ok\": true}");
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn quota_exhaustion_returns_quota_error_after_max_attempts() {
        let oracle = Arc::new(FlakyOracle::quota(10));
        let client = OracleClient::new(oracle.clone(), 3, Arc::new(ZeroBackoff));

        let err = client
            .generate(OracleTask::PersonInfo, &test_image())
            .await
            .expect_err("all attempts exhaust quota");
        assert!(err.is_quota());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn api_errors_are_not_retried() {
        let oracle = Arc::new(FlakyOracle::api(10));
        let client = OracleClient::new(oracle.clone(), 3, Arc::new(ZeroBackoff));

        let err = client
            .generate(OracleTask::VehicleInfo, &test_image())
            .await
            .expect_err("api error propagates");
        assert!(!err.is_quota());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1, "no retry");
    }
}
