//! Result types: per-page records, the merged document record, typed
//! identity/vehicle extractions, and analysis statistics.
//!
//! Every type here is `Serialize`/`Deserialize` because the records cross
//! two boundaries: they are parsed from sanitised oracle JSON on the way in,
//! and handed to persistence layers or printed as JSON on the way out. Field
//! names follow the wire schemas (snake_case for document records, camelCase
//! for the identity/vehicle cards) so a record round-trips byte-identically
//! through callers written against the same schemas.
//!
//! Records are immutable by convention: the pipeline creates a
//! [`PageRecord`] per page and never mutates it afterwards; merging builds a
//! fresh [`MergedRecord`] from the page records it consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel value the identity oracle returns in `expiryDate` for documents
/// that never expire ("Không thời hạn" on the card itself).
pub const NO_EXPIRY: &str = "Không thời hạn";

/// Message attached to degraded placeholder records when the oracle quota
/// stayed exhausted across every retry.
pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "⚠️ API quota đã hết (50 requests/ngày). Vui lòng nhập thông tin thủ công hoặc thử lại sau 24h.";

/// `extractionStatus` value carried by degraded placeholder records.
pub const STATUS_QUOTA_EXCEEDED: &str = "quota_exceeded";

// ── Entities ─────────────────────────────────────────────────────────────

/// One extracted entity: either a bare string or a small JSON object such as
/// `{"name": "...", "role": "..."}` or `{"label": "...", "value": "..."}`.
///
/// The oracle is inconsistent about which shape it emits, so both are kept
/// as-is rather than forced into one schema — downstream consumers see
/// exactly what was extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entity {
    Text(String),
    Object(serde_json::Map<String, Value>),
}

impl Entity {
    /// Key used for cross-page deduplication.
    ///
    /// Object entities are keyed by the first non-empty string among their
    /// `name`, `label`, and `value` fields (in that preference order,
    /// case-sensitive); string entities by the string itself. Entities with
    /// no usable key return `None` and are exempt from deduplication — they
    /// are still carried through a merge, never dropped.
    pub fn dedup_key(&self) -> Option<&str> {
        match self {
            Entity::Text(s) => (!s.is_empty()).then_some(s.as_str()),
            Entity::Object(map) => ["name", "label", "value"].iter().find_map(|k| {
                map.get(*k)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            }),
        }
    }
}

// ── Per-page record ──────────────────────────────────────────────────────

/// Structured extraction result for a single page.
///
/// Produced by the validator from sanitised oracle JSON, or as an error
/// placeholder when the page failed entirely. Always schema-complete: the
/// validator fills every missing field with its declared default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-indexed position of the page within the document.
    pub page_number: usize,
    pub document_type: String,
    /// Oracle self-reported confidence, clamped to `[0, 1]`.
    pub confidence: f64,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub people: Vec<Entity>,
    pub organizations: Vec<Entity>,
    pub locations: Vec<Entity>,
    pub dates: Vec<Entity>,
    pub numbers: Vec<Entity>,
    pub signature_detected: bool,
    /// Present when this page degraded to an error placeholder.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Truncated raw oracle text kept for diagnostics when JSON recovery
    /// failed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw_response: Option<String>,
}

impl PageRecord {
    /// An empty record for `page_number` with every field at its default.
    pub fn empty(page_number: usize) -> Self {
        Self {
            page_number,
            document_type: "Unknown Document".to_string(),
            confidence: 0.0,
            title: None,
            summary: None,
            people: Vec::new(),
            organizations: Vec::new(),
            locations: Vec::new(),
            dates: Vec::new(),
            numbers: Vec::new(),
            signature_detected: false,
            error: None,
            raw_response: None,
        }
    }

    /// The well-shaped placeholder recorded when a page fails entirely.
    ///
    /// Participates in the merge like any other page: its zero confidence
    /// drags the average down and its `"Error"` type rarely wins the
    /// document-type vote.
    pub fn error_placeholder(page_number: usize, error: impl Into<String>) -> Self {
        Self {
            document_type: "Error".to_string(),
            summary: Some(format!("Page {page_number} analysis failed")),
            error: Some(error.into()),
            ..Self::empty(page_number)
        }
    }

    /// True when this page degraded to an error placeholder.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// ── Merged document record ───────────────────────────────────────────────

/// Document-level aggregate of all per-page extraction records.
///
/// Invariants upheld by the merger: `total_pages == pages.len()`, and every
/// entity present in any page record appears exactly once in the merged
/// collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub document_type: String,
    /// Mean of the per-page confidences, rounded to two decimal places.
    pub confidence: f64,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub people: Vec<Entity>,
    pub organizations: Vec<Entity>,
    pub locations: Vec<Entity>,
    pub dates: Vec<Entity>,
    pub numbers: Vec<Entity>,
    pub signature_detected: bool,
    pub total_pages: usize,
    /// The constituent page records, in page order.
    pub pages: Vec<PageRecord>,
    /// Document-level degradation, e.g. no pages were available at all.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

// ── Identity card record ─────────────────────────────────────────────────

/// Personal information extracted from an ID card, driver licence, passport
/// or similar identity document.
///
/// Dates are `DD/MM/YYYY` strings as printed on the card; `expiry_date` may
/// be the literal [`NO_EXPIRY`] sentinel instead of a date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityRecord {
    pub full_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub id_number: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub place_of_origin: Option<String>,
    pub nationality: Option<String>,
    pub issue_date: Option<String>,
    pub expiry_date: Option<String>,
    pub document_type: Option<String>,
    /// Set to [`STATUS_QUOTA_EXCEEDED`] on degraded placeholders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_status: Option<String>,
    /// Human-readable note accompanying a degraded placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "raw_response", skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl IdentityRecord {
    /// Degraded placeholder returned when the oracle quota stayed exhausted
    /// across every retry. Nationality and document type keep their most
    /// common values so a manual-entry form starts from something sensible.
    pub fn quota_exceeded() -> Self {
        Self {
            nationality: Some("Việt Nam".to_string()),
            document_type: Some("CCCD".to_string()),
            extraction_status: Some(STATUS_QUOTA_EXCEEDED.to_string()),
            message: Some(QUOTA_EXCEEDED_MESSAGE.to_string()),
            ..Self::default()
        }
    }

    /// Well-shaped record carrying a parse failure and a raw-text preview.
    pub fn parse_failure(error: impl Into<String>, raw_preview: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            raw_response: Some(raw_preview.into()),
            ..Self::default()
        }
    }

    /// False when `expiry_date` holds the [`NO_EXPIRY`] sentinel.
    pub fn has_expiry(&self) -> bool {
        match self.expiry_date.as_deref() {
            Some(v) => v != NO_EXPIRY,
            None => false,
        }
    }
}

// ── Vehicle registration record ──────────────────────────────────────────

/// Vehicle information extracted from a registration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleRecord {
    pub vehicle_type: Option<String>,
    pub license_plate: Option<String>,
    pub chassis_number: Option<String>,
    pub engine_number: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    /// The oracle sometimes emits the year as a JSON number; accept both.
    #[serde(deserialize_with = "de_string_or_number")]
    pub manufacturing_year: Option<String>,
    pub color: Option<String>,
    #[serde(deserialize_with = "de_string_or_number")]
    pub engine_capacity: Option<String>,
    pub registration_date: Option<String>,
    pub owner_name: Option<String>,
    pub owner_address: Option<String>,
    pub document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "raw_response", skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl VehicleRecord {
    /// Degraded placeholder returned when the oracle quota stayed exhausted
    /// across every retry.
    pub fn quota_exceeded() -> Self {
        Self {
            document_type: Some("Vehicle Registration".to_string()),
            extraction_status: Some(STATUS_QUOTA_EXCEEDED.to_string()),
            message: Some(QUOTA_EXCEEDED_MESSAGE.to_string()),
            ..Self::default()
        }
    }

    /// Well-shaped record carrying a parse failure and a raw-text preview.
    pub fn parse_failure(error: impl Into<String>, raw_preview: impl Into<String>) -> Self {
        Self {
            document_type: Some("Vehicle Registration".to_string()),
            error: Some(error.into()),
            raw_response: Some(raw_preview.into()),
            ..Self::default()
        }
    }
}

/// Accept a JSON string or number, normalising to `Option<String>`.
fn de_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

// ── Analysis output ──────────────────────────────────────────────────────

/// Statistics for one document analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Pages the document reported.
    pub total_pages: usize,
    /// Pages whose structured extraction succeeded.
    pub processed_pages: usize,
    /// Pages recorded as error placeholders.
    pub failed_pages: usize,
    /// Wall-clock duration of the whole analysis.
    pub total_duration_ms: u64,
    /// Portion of the wall clock spent inside oracle calls (including
    /// retry waits).
    pub oracle_duration_ms: u64,
}

/// Everything produced by analysing one document: the merged structured
/// record, the assembled Markdown rendition, and run statistics.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    pub record: MergedRecord,
    pub markdown: String,
    pub stats: AnalysisStats,
}
