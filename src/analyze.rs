//! Entry points: multi-page document analysis and single-image extractions.
//!
//! Pages are processed **sequentially, not concurrently** — the oracle
//! enforces per-caller rate limits, and a page's quota retry schedule only
//! stays predictable when no sibling page is burning the same window. Each
//! page costs two oracle calls (structured analysis, then Markdown
//! transcription); a failure on either is contained to that page and the
//! document continues.
//!
//! All entry points take an [`AnalysisConfig`]; the oracle is resolved once
//! per call through a most-specific-to-least-specific chain and handed to
//! every stage explicitly — there is no shared module-level client.

use crate::config::AnalysisConfig;
use crate::error::{DocufactError, PageError};
use crate::oracle::{ExtractionOracle, OracleClient, OracleError, OracleTask, VisionOracle};
use crate::output::{
    AnalysisOutput, AnalysisStats, IdentityRecord, MergedRecord, PageRecord, VehicleRecord,
};
use crate::pipeline::{encode, input, merge, preprocess, sanitize, validate};
use crate::recommend::{recommend_from_texts, AddressKind, RecommendationResult};
use edgequake_llm::{ImageData, LLMProvider, ProviderFactory};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Analyze a multi-page document: every page through the full pipeline,
/// results merged into one document record plus an assembled Markdown
/// rendition.
///
/// # Arguments
/// * `document_name` — display name used in the Markdown header
/// * `page_refs`     — ordered image references (local paths or URLs), one
///   per page
/// * `config`        — analysis configuration
///
/// # Returns
/// `Ok(AnalysisOutput)` even when pages failed — failed pages appear as
/// error placeholder records inside `output.record.pages`, and a document
/// with no pages at all yields a document-level error record. Check
/// `output.stats.failed_pages`.
///
/// # Errors
/// Returns `Err(DocufactError)` only when no oracle could be resolved.
pub async fn analyze_document(
    document_name: &str,
    page_refs: &[String],
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, DocufactError> {
    let total_start = Instant::now();
    info!(
        "analyzing document '{}' ({} pages)",
        document_name,
        page_refs.len()
    );

    let oracle = resolve_oracle(config)?;
    let client = OracleClient::new(oracle, config.max_attempts, config.effective_backoff());

    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_start(page_refs.len());
    }

    let mut page_records: Vec<PageRecord> = Vec::with_capacity(page_refs.len());
    let mut markdown_parts: Vec<String> = Vec::with_capacity(page_refs.len());
    let mut oracle_ms: u64 = 0;

    for (idx, reference) in page_refs.iter().enumerate() {
        let page_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, page_refs.len());
        }

        let (record, markdown) =
            process_page(&client, page_num, reference, config, &mut oracle_ms).await;

        if let Some(ref cb) = config.progress_callback {
            match &record.error {
                None => cb.on_page_complete(page_num, page_refs.len()),
                Some(e) => cb.on_page_error(page_num, page_refs.len(), e),
            }
        }

        markdown_parts.push(page_markdown(page_num, &markdown, page_refs.len()));
        page_records.push(record);
    }

    let merged = merge::merge_page_records(page_records);
    let markdown = assemble_markdown(document_name, &merged, markdown_parts);

    let processed = merged.pages.iter().filter(|p| !p.is_error()).count();
    let failed = merged.pages.len() - processed;
    let stats = AnalysisStats {
        total_pages: merged.total_pages,
        processed_pages: processed,
        failed_pages: failed,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        oracle_duration_ms: oracle_ms,
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_complete(merged.total_pages, processed);
    }
    info!(
        "analysis complete: {}/{} pages, document type '{}', {}ms",
        processed, merged.total_pages, merged.document_type, stats.total_duration_ms
    );

    Ok(AnalysisOutput {
        record: merged,
        markdown,
        stats,
    })
}

/// Extract identity-card fields from a single image.
///
/// Quota exhaustion after all retries degrades to
/// [`IdentityRecord::quota_exceeded`]; an unparseable response degrades to
/// a record carrying `error` plus a truncated raw preview. Only an
/// unresolvable image, a missing oracle, or a non-retryable API failure
/// surface as `Err`.
pub async fn extract_identity(
    image_ref: &str,
    config: &AnalysisConfig,
) -> Result<IdentityRecord, DocufactError> {
    let (client, image) = prepare_single_image(image_ref, config).await?;

    let text = match client.generate(OracleTask::PersonInfo, &image).await {
        Ok(text) => text,
        Err(e @ OracleError::QuotaExceeded(_)) => {
            warn!("identity extraction degraded: {e}");
            return Ok(IdentityRecord::quota_exceeded());
        }
        Err(OracleError::Api(message)) => {
            return Err(DocufactError::OracleApiError { message })
        }
    };

    let payload = sanitize::extract_json_payload(&text);
    match serde_json::from_str::<IdentityRecord>(&payload) {
        Ok(record) => {
            debug!("extracted identity: {:?}", record.full_name);
            Ok(record)
        }
        Err(e) => Ok(IdentityRecord::parse_failure(
            format!("Failed to parse JSON response: {e}"),
            truncate_chars(&text, config.raw_preview_chars),
        )),
    }
}

/// Extract vehicle-registration fields from a single image.
///
/// Same degradation contract as [`extract_identity`].
pub async fn extract_vehicle(
    image_ref: &str,
    config: &AnalysisConfig,
) -> Result<VehicleRecord, DocufactError> {
    let (client, image) = prepare_single_image(image_ref, config).await?;

    let text = match client.generate(OracleTask::VehicleInfo, &image).await {
        Ok(text) => text,
        Err(e @ OracleError::QuotaExceeded(_)) => {
            warn!("vehicle extraction degraded: {e}");
            return Ok(VehicleRecord::quota_exceeded());
        }
        Err(OracleError::Api(message)) => {
            return Err(DocufactError::OracleApiError { message })
        }
    };

    let payload = sanitize::extract_json_payload(&text);
    match serde_json::from_str::<VehicleRecord>(&payload) {
        Ok(record) => {
            debug!("extracted vehicle: {:?}", record.license_plate);
            Ok(record)
        }
        Err(e) => Ok(VehicleRecord::parse_failure(
            format!("Failed to parse JSON response: {e}"),
            truncate_chars(&text, config.raw_preview_chars),
        )),
    }
}

/// Recommend insurance packages from a document image.
///
/// The oracle only supplies the residence address and place-of-origin
/// *texts* (plus the address label); regions are classified and the package
/// list derived locally by the fixed rule table, so two runs over the same
/// texts always agree.
pub async fn recommend_insurance(
    image_ref: &str,
    config: &AnalysisConfig,
) -> Result<RecommendationResult, DocufactError> {
    let (client, image) = prepare_single_image(image_ref, config).await?;

    let text = match client.generate(OracleTask::RegionRecommendation, &image).await {
        Ok(text) => text,
        Err(e @ OracleError::QuotaExceeded(_)) => {
            warn!("recommendation degraded: {e}");
            let mut result = recommend_from_texts(None, None, AddressKind::Unknown);
            result.error = Some(e.to_string());
            return Ok(result);
        }
        Err(OracleError::Api(message)) => {
            return Err(DocufactError::OracleApiError { message })
        }
    };

    let payload = sanitize::extract_json_payload(&text);
    let value: Value = match serde_json::from_str(&payload) {
        Ok(v) => v,
        Err(e) => {
            let mut result = recommend_from_texts(None, None, AddressKind::Unknown);
            result.error = Some(format!("Failed to parse JSON response: {e}"));
            return Ok(result);
        }
    };

    let origin_text = value
        .pointer("/place_of_origin/text")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let address_text = value
        .pointer("/address/text")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let address_kind = match value.pointer("/address/type").and_then(Value::as_str) {
        Some("thuong_tru") => AddressKind::ThuongTru,
        Some("tam_tru") => AddressKind::TamTru,
        _ => AddressKind::Unknown,
    };

    Ok(recommend_from_texts(origin_text, address_text, address_kind))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Run one page through the full pipeline. Never fails: every failure mode
/// collapses into an error placeholder record and an error Markdown stub.
async fn process_page(
    client: &OracleClient,
    page_num: usize,
    reference: &str,
    config: &AnalysisConfig,
    oracle_ms: &mut u64,
) -> (PageRecord, String) {
    const MARKDOWN_ERROR_STUB: &str = "*Error extracting content from this page*";

    // Resolve and normalise the image; both failures end the page early.
    let raw = match input::resolve_image(reference, config.download_timeout_secs).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = PageError::ImageUnavailable {
                page: page_num,
                detail: e.to_string(),
            };
            warn!("{err}");
            return (
                PageRecord::error_placeholder(page_num, err.to_string()),
                MARKDOWN_ERROR_STUB.to_string(),
            );
        }
    };
    let jpeg = match preprocess::prepare_image(&raw, config) {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = PageError::DecodeFailed {
                page: page_num,
                detail: e.to_string(),
            };
            warn!("{err}");
            return (
                PageRecord::error_placeholder(page_num, err.to_string()),
                MARKDOWN_ERROR_STUB.to_string(),
            );
        }
    };
    let image = encode::encode_image(&jpeg);

    // Structured extraction. An oracle failure here ends the page — the
    // markdown call would just burn the same exhausted quota.
    let oracle_start = Instant::now();
    let structured = client.generate(OracleTask::AutoAnalysis, &image).await;
    *oracle_ms += oracle_start.elapsed().as_millis() as u64;

    let record = match structured {
        Ok(text) => {
            let payload = sanitize::extract_json_payload(&text);
            match serde_json::from_str::<Value>(&payload) {
                Ok(value) if value.is_object() => validate::conform_page_record(value, page_num),
                other => {
                    let detail = match other {
                        Ok(_) => "payload is not a JSON object".to_string(),
                        Err(e) => e.to_string(),
                    };
                    let err = PageError::JsonRecovery {
                        page: page_num,
                        detail,
                    };
                    warn!("{err}");
                    let mut rec = PageRecord::error_placeholder(page_num, err.to_string());
                    rec.raw_response = Some(truncate_chars(&text, config.raw_preview_chars));
                    rec
                }
            }
        }
        Err(e) => {
            let err = PageError::OracleFailed {
                page: page_num,
                attempts: client.max_attempts(),
                detail: e.to_string(),
            };
            warn!("{err}");
            return (
                PageRecord::error_placeholder(page_num, err.to_string()),
                MARKDOWN_ERROR_STUB.to_string(),
            );
        }
    };

    // Markdown transcription — independent of the structured result: a
    // transcription failure leaves the structured record intact.
    let oracle_start = Instant::now();
    let markdown = match client.generate(OracleTask::DocumentMarkdown, &image).await {
        Ok(text) => sanitize::clean_markdown_response(&text),
        Err(e) => {
            warn!("page {page_num}: markdown transcription failed: {e}");
            MARKDOWN_ERROR_STUB.to_string()
        }
    };
    *oracle_ms += oracle_start.elapsed().as_millis() as u64;

    debug!("page {page_num}: '{}' extracted", record.document_type);
    (record, markdown)
}

/// Wrap one page's Markdown with its separator/header for assembly.
fn page_markdown(page_num: usize, markdown: &str, total_pages: usize) -> String {
    if total_pages > 1 {
        format!("\n\n---\n## Page {page_num}\n\n{markdown}")
    } else {
        markdown.to_string()
    }
}

/// Assemble the document Markdown: a header for multi-page documents, then
/// the per-page parts in order.
fn assemble_markdown(document_name: &str, merged: &MergedRecord, parts: Vec<String>) -> String {
    let body = parts.join("\n");
    if merged.total_pages > 1 {
        format!(
            "# {}\n\n**Total Pages:** {}\n**Document Type:** {}\n{}",
            document_name, merged.total_pages, merged.document_type, body
        )
        .trim()
        .to_string()
    } else {
        body.trim().to_string()
    }
}

/// Resolve the image for a single-image operation and build the client.
async fn prepare_single_image(
    image_ref: &str,
    config: &AnalysisConfig,
) -> Result<(OracleClient, ImageData), DocufactError> {
    let oracle = resolve_oracle(config)?;
    let client = OracleClient::new(oracle, config.max_attempts, config.effective_backoff());

    let raw = input::resolve_image(image_ref, config.download_timeout_secs).await?;
    let jpeg = preprocess::prepare_image(&raw, config).map_err(|e| DocufactError::ImageDecode {
        detail: e.to_string(),
    })?;
    Ok((client, encode::encode_image(&jpeg)))
}

/// Resolve the extraction oracle, from most-specific to least-specific.
///
/// 1. **Pre-built oracle** (`config.oracle`) — the caller constructed the
///    instance entirely; used as-is. This is how tests inject doubles.
///
/// 2. **Named provider + model** (`config.provider_name`) — instantiated via
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
///
/// 3. **Environment pair** (`DOCUFACT_LLM_PROVIDER` + `DOCUFACT_MODEL`) —
///    both set means the execution environment (Makefile, CI) chose; checked
///    before auto-detection so the choice is honoured even when several API
///    keys are present.
///
/// 4. **Auto-detection** — prefer Gemini when `GEMINI_API_KEY` is present
///    (the extraction templates are tuned against it), otherwise let
///    [`ProviderFactory::from_env`] scan all known key variables.
fn resolve_oracle(config: &AnalysisConfig) -> Result<Arc<dyn ExtractionOracle>, DocufactError> {
    if let Some(ref oracle) = config.oracle {
        return Ok(Arc::clone(oracle));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_oracle(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("DOCUFACT_LLM_PROVIDER"),
        std::env::var("DOCUFACT_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_oracle(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_oracle("gemini", model);
        }
    }

    let (provider, _embedding): (Arc<dyn LLMProvider>, _) =
        ProviderFactory::from_env().map_err(|e| DocufactError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No oracle provider could be auto-detected from environment.\n\
                 Set GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                 Error: {}",
                e
            ),
        })?;
    Ok(Arc::new(VisionOracle::new(provider)))
}

const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Instantiate a named provider and wrap it as an extraction oracle.
fn create_vision_oracle(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn ExtractionOracle>, DocufactError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocufactError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(VisionOracle::new(provider)))
}

/// Truncate on a character boundary (raw previews carry Vietnamese text, so
/// byte slicing could split a code point).
fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
