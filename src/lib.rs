//! # docufact
//!
//! Extract structured facts from scanned documents using Vision Language
//! Models (VLMs).
//!
//! ## Why this crate?
//!
//! Scanned paperwork — ID cards, vehicle registrations, claim forms — is
//! where classical OCR falls apart: stamps over text, tables, mixed
//! Vietnamese/English, photographed at an angle. Instead this crate
//! normalises each page image and lets a VLM read it as a human would, then
//! distrusts everything it says: responses are sanitised, validated against
//! fixed schemas, and aggregated deterministically, so callers always
//! receive well-shaped records even when the oracle misbehaves or its quota
//! runs dry.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page images
//!  │
//!  ├─ 1. Input      resolve each page reference (path or URL) to bytes
//!  ├─ 2. Preprocess RGB + bounded downscale (2 MB / 4000 px → 3000 px)
//!  ├─ 3. Encode     JPEG → base64 attachment
//!  ├─ 4. Oracle     sequential VLM calls with quota-aware linear retry
//!  ├─ 5. Sanitize   strip fences, slice the JSON payload
//!  ├─ 6. Validate   fill defaults, clamp confidence, drop unknown fields
//!  └─ 7. Merge      one document record: majority-vote type, deduped entities
//! ```
//!
//! Independently of the page pipeline, two deterministic rule engines map
//! extracted address texts to macro-regions ([`classify_region`]) and derive
//! the fixed insurance-package set ([`recommend_for_identity`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docufact::{analyze_document, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = AnalysisConfig::default();
//!     let pages = vec![
//!         "data/images/doc-1-p1.png".to_string(),
//!         "data/images/doc-1-p2.png".to_string(),
//!     ];
//!     let output = analyze_document("contract.pdf", &pages, &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.record)?);
//!     eprintln!(
//!         "{}/{} pages, {}ms",
//!         output.stats.processed_pages,
//!         output.stats.total_pages,
//!         output.stats.total_duration_ms
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docufact` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! docufact = { version = "0.4", default-features = false }
//! ```
//!
//! ## Failure model
//!
//! A failed page never fails its document: it is folded in as an error
//! placeholder record and the merge continues. Quota exhaustion after the
//! configured retries degrades single-image extractions to placeholder
//! records flagged `extractionStatus = "quota_exceeded"` rather than
//! raising. Only unresolvable inputs, a missing provider, or non-retryable
//! API errors surface as `Err`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod oracle;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod recommend;
pub mod region;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_document, extract_identity, extract_vehicle, recommend_insurance};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, Backoff, LinearBackoff, ZeroBackoff};
pub use error::{DocufactError, PageError};
pub use oracle::{
    ExtractionOracle, GenerationProfile, OracleClient, OracleError, OracleTask, VisionOracle,
};
pub use output::{
    AnalysisOutput, AnalysisStats, Entity, IdentityRecord, MergedRecord, PageRecord,
    VehicleRecord, NO_EXPIRY,
};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use recommend::{
    decide, recommend_for_identity, recommend_from_texts, AddressInfo, AddressKind, Decision,
    OriginInfo, RecommendationPackage, RecommendationResult,
};
pub use region::{classify_region, RegionTag, CENTRAL_PROVINCES, NORTH_PROVINCES, SOUTH_KEYWORDS};
