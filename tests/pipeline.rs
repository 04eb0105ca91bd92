//! End-to-end pipeline tests for docufact.
//!
//! These tests drive the full analysis pipeline — input resolution,
//! preprocessing, oracle calls, sanitising, validation, merging — against a
//! scripted mock oracle, so they run offline and deterministically. Retry
//! paths use `ZeroBackoff` so even the quota-exhaustion scenarios finish in
//! milliseconds.

use async_trait::async_trait;
use docufact::{
    analyze_document, extract_identity, extract_vehicle, recommend_insurance, AnalysisConfig,
    DocufactError, ExtractionOracle, GenerationProfile, OracleError, OracleTask, RegionTag,
    ZeroBackoff,
};
use edgequake_llm::ImageData;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Scripted oracle double: responses are queued per task and popped in
/// order; an unscripted call fails loudly so tests never silently pass on
/// the wrong path.
struct MockOracle {
    scripts: Mutex<HashMap<&'static str, VecDeque<Result<String, OracleError>>>>,
    calls: AtomicUsize,
}

impl MockOracle {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn script(self, task: OracleTask, response: Result<&str, OracleError>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(task.name())
            .or_default()
            .push_back(response.map(|s| s.to_string()));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn task_name_for(instruction: &str) -> &'static str {
    for task in [
        OracleTask::AutoAnalysis,
        OracleTask::DocumentMarkdown,
        OracleTask::PersonInfo,
        OracleTask::VehicleInfo,
        OracleTask::RegionRecommendation,
    ] {
        if task.instruction() == instruction {
            return task.name();
        }
    }
    panic!("unknown instruction template");
}

#[async_trait]
impl ExtractionOracle for MockOracle {
    async fn generate(
        &self,
        instruction: &str,
        _image: &ImageData,
        _profile: &GenerationProfile,
    ) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = task_name_for(instruction);
        self.scripts
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("unscripted oracle call for task '{name}'"))
    }
}

fn quota() -> OracleError {
    OracleError::QuotaExceeded("429 RESOURCE_EXHAUSTED: quota".into())
}

fn config_with(oracle: Arc<MockOracle>) -> AnalysisConfig {
    AnalysisConfig::builder()
        .oracle(oracle)
        .backoff(Arc::new(ZeroBackoff))
        .build()
        .unwrap()
}

/// Write a small valid PNG and return its path as a page reference.
fn test_image(dir: &TempDir, name: &str) -> String {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        24,
        32,
        image::Rgb([120, 120, 120]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, buf).unwrap();
    path.to_string_lossy().into_owned()
}

const PAGE1_JSON: &str = r#"```json
{
  "document_type": "Insurance Claim Form",
  "confidence": 0.9,
  "title": "Đơn yêu cầu bồi thường",
  "summary": "Claim form for storm damage.",
  "people": [{"name": "Nguyễn Văn A", "role": "Claimant"}],
  "organizations": [{"name": "ADE Insurance"}],
  "locations": [{"name": "Hà Tĩnh"}],
  "dates": [{"label": "Claim Date", "value": "2024-10-02"}],
  "numbers": [{"label": "Policy Number", "value": "HD-0042"}],
  "signature_detected": false
}
```"#;

const PAGE2_JSON: &str = r#"Here is the result:
{
  "document_type": "Insurance Claim Form",
  "confidence": 0.8,
  "title": null,
  "summary": "Supporting documents.",
  "people": [{"name": "Nguyễn Văn A", "role": "Claimant"}, {"name": "Trần Thị B", "role": "Witness"}],
  "organizations": [{"name": "ADE Insurance"}],
  "locations": [],
  "dates": [{"label": "Claim Date", "value": "2024-10-02"}],
  "numbers": [],
  "signature_detected": true
}"#;

// ── Multi-page analysis ──────────────────────────────────────────────────────

#[tokio::test]
async fn analyze_merges_two_pages_with_dedup() {
    let dir = TempDir::new().unwrap();
    let pages = vec![test_image(&dir, "p1.png"), test_image(&dir, "p2.png")];

    let oracle = Arc::new(
        MockOracle::new()
            .script(OracleTask::AutoAnalysis, Ok(PAGE1_JSON))
            .script(OracleTask::DocumentMarkdown, Ok("# Claim form\n\nPage one."))
            .script(OracleTask::AutoAnalysis, Ok(PAGE2_JSON))
            .script(OracleTask::DocumentMarkdown, Ok("Attachments list.")),
    );
    let config = config_with(oracle.clone());

    let output = analyze_document("claim.pdf", &pages, &config).await.unwrap();
    let record = &output.record;

    assert_eq!(record.total_pages, 2);
    assert_eq!(record.pages.len(), 2);
    assert_eq!(record.document_type, "Insurance Claim Form");
    assert_eq!(record.confidence, 0.85);
    assert_eq!(record.title.as_deref(), Some("Đơn yêu cầu bồi thường"));
    // "Nguyễn Văn A" appears on both pages: kept once; witness is new.
    assert_eq!(record.people.len(), 2);
    assert_eq!(record.organizations.len(), 1);
    assert_eq!(record.dates.len(), 1);
    assert!(record.signature_detected, "OR across pages");
    assert!(record
        .summary
        .as_deref()
        .unwrap()
        .starts_with("Multi-page document with 2 pages."));

    // Markdown assembly: header plus per-page sections.
    assert!(output.markdown.starts_with("# claim.pdf"));
    assert!(output.markdown.contains("**Total Pages:** 2"));
    assert!(output.markdown.contains("## Page 1"));
    assert!(output.markdown.contains("Attachments list."));

    assert_eq!(output.stats.processed_pages, 2);
    assert_eq!(output.stats.failed_pages, 0);
    assert_eq!(oracle.calls(), 4, "two oracle calls per page");
}

#[tokio::test]
async fn one_bad_page_never_fails_the_document() {
    let dir = TempDir::new().unwrap();
    let pages = vec![test_image(&dir, "p1.png"), test_image(&dir, "p2.png")];

    let oracle = Arc::new(
        MockOracle::new()
            .script(OracleTask::AutoAnalysis, Ok(PAGE1_JSON))
            .script(OracleTask::DocumentMarkdown, Ok("Page one."))
            .script(
                OracleTask::AutoAnalysis,
                Err(OracleError::Api("500 backend error".into())),
            ),
    );
    let config = config_with(oracle);

    let output = analyze_document("claim.pdf", &pages, &config).await.unwrap();
    let record = &output.record;

    assert_eq!(record.total_pages, 2);
    assert!(!record.pages[0].is_error());
    assert!(record.pages[1].is_error());
    assert_eq!(record.pages[1].document_type, "Error");
    assert_eq!(record.pages[1].confidence, 0.0);
    // Good page's type still wins the vote and its entities survive.
    assert_eq!(record.document_type, "Insurance Claim Form");
    assert_eq!(record.people.len(), 1);
    assert!(output
        .markdown
        .contains("*Error extracting content from this page*"));
    assert_eq!(output.stats.failed_pages, 1);
}

#[tokio::test]
async fn quota_errors_retry_within_a_page() {
    let dir = TempDir::new().unwrap();
    let pages = vec![test_image(&dir, "p1.png")];

    let oracle = Arc::new(
        MockOracle::new()
            .script(OracleTask::AutoAnalysis, Err(quota()))
            .script(OracleTask::AutoAnalysis, Err(quota()))
            .script(OracleTask::AutoAnalysis, Ok(PAGE1_JSON))
            .script(OracleTask::DocumentMarkdown, Ok("Recovered page.")),
    );
    let config = config_with(oracle.clone());

    let output = analyze_document("claim.pdf", &pages, &config).await.unwrap();
    assert_eq!(output.stats.failed_pages, 0);
    assert_eq!(output.record.document_type, "Insurance Claim Form");
    assert_eq!(oracle.calls(), 4, "two retries + success + markdown");
}

#[tokio::test]
async fn unparseable_response_becomes_json_recovery_record() {
    let dir = TempDir::new().unwrap();
    let pages = vec![test_image(&dir, "p1.png")];

    let oracle = Arc::new(
        MockOracle::new()
            .script(OracleTask::AutoAnalysis, Ok("I could not read this document."))
            .script(OracleTask::DocumentMarkdown, Ok("Still transcribed.")),
    );
    let config = config_with(oracle);

    let output = analyze_document("scan.jpg", &pages, &config).await.unwrap();
    let page = &output.record.pages[0];
    assert!(page.is_error());
    assert_eq!(page.document_type, "Error");
    assert_eq!(
        page.raw_response.as_deref(),
        Some("I could not read this document."),
        "raw preview kept for diagnostics"
    );
    // The markdown call is independent and still ran.
    assert!(output.markdown.contains("Still transcribed."));
}

#[tokio::test]
async fn missing_page_image_is_contained() {
    let dir = TempDir::new().unwrap();
    let pages = vec![
        test_image(&dir, "p1.png"),
        dir.path().join("missing.png").to_string_lossy().into_owned(),
    ];

    let oracle = Arc::new(
        MockOracle::new()
            .script(OracleTask::AutoAnalysis, Ok(PAGE1_JSON))
            .script(OracleTask::DocumentMarkdown, Ok("Page one.")),
    );
    let config = config_with(oracle.clone());

    let output = analyze_document("doc.pdf", &pages, &config).await.unwrap();
    assert_eq!(output.record.total_pages, 2);
    assert!(output.record.pages[1].is_error());
    assert_eq!(oracle.calls(), 2, "no oracle calls for the missing page");
}

#[tokio::test]
async fn zero_pages_yield_document_error_record_not_err() {
    let oracle = Arc::new(MockOracle::new());
    let config = config_with(oracle);

    let output = analyze_document("empty.pdf", &[], &config).await.unwrap();
    assert_eq!(output.record.total_pages, 0);
    assert_eq!(output.record.document_type, "Error");
    assert_eq!(output.record.confidence, 0.0);
    assert!(output.record.error.is_some());
}

// ── Identity extraction ──────────────────────────────────────────────────────

#[tokio::test]
async fn identity_extraction_parses_camel_case_fields() {
    let dir = TempDir::new().unwrap();
    let image = test_image(&dir, "cccd.png");

    let oracle = Arc::new(MockOracle::new().script(
        OracleTask::PersonInfo,
        Ok(r#"```json
{
  "fullName": "Nguyễn Văn A",
  "dateOfBirth": "01/01/1990",
  "gender": "Nam",
  "idNumber": "079123456789",
  "address": "123 Nguyễn Huệ, Quận 1, TP.HCM",
  "placeOfOrigin": "Hà Tĩnh",
  "nationality": "Việt Nam",
  "expiryDate": "Không thời hạn",
  "documentType": "CCCD"
}
```"#),
    ));
    let config = config_with(oracle);

    let record = extract_identity(&image, &config).await.unwrap();
    assert_eq!(record.full_name.as_deref(), Some("Nguyễn Văn A"));
    assert_eq!(record.place_of_origin.as_deref(), Some("Hà Tĩnh"));
    assert!(!record.has_expiry(), "sentinel means no expiry");
    assert!(record.extraction_status.is_none());
    assert!(record.error.is_none());
}

#[tokio::test]
async fn identity_quota_exhaustion_degrades_without_raising() {
    let dir = TempDir::new().unwrap();
    let image = test_image(&dir, "cccd.png");

    let oracle = Arc::new(
        MockOracle::new()
            .script(OracleTask::PersonInfo, Err(quota()))
            .script(OracleTask::PersonInfo, Err(quota()))
            .script(OracleTask::PersonInfo, Err(quota())),
    );
    let config = config_with(oracle.clone());

    let record = extract_identity(&image, &config).await.unwrap();
    assert_eq!(record.extraction_status.as_deref(), Some("quota_exceeded"));
    assert!(record.message.is_some());
    assert!(record.full_name.is_none());
    assert_eq!(record.nationality.as_deref(), Some("Việt Nam"));
    assert_eq!(oracle.calls(), 3, "configured max attempts");
}

#[tokio::test]
async fn identity_transient_error_propagates_without_retry() {
    let dir = TempDir::new().unwrap();
    let image = test_image(&dir, "cccd.png");

    let oracle = Arc::new(MockOracle::new().script(
        OracleTask::PersonInfo,
        Err(OracleError::Api("401 invalid api key".into())),
    ));
    let config = config_with(oracle.clone());

    let err = extract_identity(&image, &config).await.unwrap_err();
    assert!(matches!(err, DocufactError::OracleApiError { .. }));
    assert_eq!(oracle.calls(), 1, "non-quota errors are not retried");
}

#[tokio::test]
async fn identity_parse_failure_returns_well_shaped_record() {
    let dir = TempDir::new().unwrap();
    let image = test_image(&dir, "cccd.png");

    let oracle = Arc::new(MockOracle::new().script(
        OracleTask::PersonInfo,
        Ok("The image is too blurry to read."),
    ));
    let config = config_with(oracle);

    let record = extract_identity(&image, &config).await.unwrap();
    assert!(record.error.is_some());
    assert_eq!(
        record.raw_response.as_deref(),
        Some("The image is too blurry to read.")
    );
    assert!(record.full_name.is_none());
}

#[tokio::test]
async fn identity_missing_image_is_fatal() {
    let oracle = Arc::new(MockOracle::new());
    let config = config_with(oracle);

    let err = extract_identity("/no/such/image.png", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, DocufactError::ImageNotFound { .. }));
}

// ── Vehicle extraction ───────────────────────────────────────────────────────

#[tokio::test]
async fn vehicle_extraction_happy_path() {
    let dir = TempDir::new().unwrap();
    let image = test_image(&dir, "cavet.png");

    let oracle = Arc::new(MockOracle::new().script(
        OracleTask::VehicleInfo,
        Ok(r#"{
  "vehicleType": "Xe máy",
  "licensePlate": "30A-12345",
  "brand": "Honda",
  "model": "SH Mode",
  "manufacturingYear": 2021,
  "engineCapacity": "125",
  "ownerName": "Trần Thị B",
  "documentType": "Vehicle Registration"
}"#),
    ));
    let config = config_with(oracle);

    let record = extract_vehicle(&image, &config).await.unwrap();
    assert_eq!(record.license_plate.as_deref(), Some("30A-12345"));
    assert_eq!(record.manufacturing_year.as_deref(), Some("2021"));
    assert_eq!(record.document_type.as_deref(), Some("Vehicle Registration"));
}

#[tokio::test]
async fn vehicle_quota_exhaustion_degrades_without_raising() {
    let dir = TempDir::new().unwrap();
    let image = test_image(&dir, "cavet.png");

    let oracle = Arc::new(
        MockOracle::new()
            .script(OracleTask::VehicleInfo, Err(quota()))
            .script(OracleTask::VehicleInfo, Err(quota()))
            .script(OracleTask::VehicleInfo, Err(quota())),
    );
    let config = config_with(oracle);

    let record = extract_vehicle(&image, &config).await.unwrap();
    assert_eq!(record.extraction_status.as_deref(), Some("quota_exceeded"));
    assert_eq!(record.document_type.as_deref(), Some("Vehicle Registration"));
    assert!(record.license_plate.is_none());
}

// ── Recommendation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn recommendation_rederives_regions_from_extracted_texts() {
    let dir = TempDir::new().unwrap();
    let image = test_image(&dir, "cccd.png");

    // The oracle mislabels Hà Tĩnh as "Nam"; the pipeline must ignore the
    // claimed regions and classify the texts itself.
    let oracle = Arc::new(MockOracle::new().script(
        OracleTask::RegionRecommendation,
        Ok(r#"{
  "address": {"text": "Quận 1, TP.HCM", "type": "thuong_tru", "region": "Nam"},
  "place_of_origin": {"text": "Hà Tĩnh", "region": "Nam"},
  "recommended_packages": [{"name": "made-up package", "reason": "x", "priority": 0.1}]
}"#),
    ));
    let config = config_with(oracle);

    let result = recommend_insurance(&image, &config).await.unwrap();
    assert_eq!(result.place_of_origin.region, RegionTag::Trung);
    assert_eq!(result.address.region, RegionTag::Nam);
    assert_eq!(result.final_region, RegionTag::Trung);

    let names: Vec<&str> = result
        .recommended_packages
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "Bảo hiểm thiên tai ngập lụt",
            "Bảo hiểm nhà cửa trước bão",
            "Bảo hiểm phương tiện ngập nước"
        ],
        "packages come from the fixed rule table, not the oracle"
    );
    let priorities: Vec<f64> = result
        .recommended_packages
        .iter()
        .map(|p| p.priority)
        .collect();
    assert_eq!(priorities, vec![0.95, 0.90, 0.85]);
}

#[tokio::test]
async fn recommendation_parse_failure_degrades_to_empty_result() {
    let dir = TempDir::new().unwrap();
    let image = test_image(&dir, "cccd.png");

    let oracle = Arc::new(MockOracle::new().script(
        OracleTask::RegionRecommendation,
        Ok("no structured data here"),
    ));
    let config = config_with(oracle);

    let result = recommend_insurance(&image, &config).await.unwrap();
    assert!(result.error.is_some());
    assert_eq!(result.final_region, RegionTag::Unknown);
    assert!(result.recommended_packages.is_empty());
}
