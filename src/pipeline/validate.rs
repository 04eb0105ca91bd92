//! Schema validation: conform one page's parsed JSON to the extraction
//! record schema.
//!
//! The oracle is prompted hard to emit the schema, but prompts are not
//! contracts: fields go missing, `confidence` arrives as a string, arrays
//! hold bare strings instead of objects, and extra keys appear. This stage
//! is a *total* function — it never fails, absorbing every malformation by
//! substituting the field's declared default. Downstream code can therefore
//! rely on a [`PageRecord`] being schema-complete without re-checking.

use crate::output::{Entity, PageRecord};
use serde_json::{Map, Value};

/// Conform a parsed oracle response to the per-page extraction schema.
///
/// Missing scalars become `None`, missing collections empty, missing
/// booleans false, and a missing `document_type` the `"Unknown Document"`
/// default. `confidence` is coerced from a number or numeric string and
/// clamped to `[0, 1]`. Unknown extra fields are dropped. Non-object input
/// degrades to an all-defaults record.
pub fn conform_page_record(value: Value, page_number: usize) -> PageRecord {
    let map = match value {
        Value::Object(m) => m,
        _ => Map::new(),
    };

    PageRecord {
        page_number,
        document_type: string_field(&map, "document_type")
            .unwrap_or_else(|| "Unknown Document".to_string()),
        confidence: clamp_unit(coerce_f64(map.get("confidence"))),
        title: string_field(&map, "title"),
        summary: string_field(&map, "summary"),
        people: entity_list(map.get("people")),
        organizations: entity_list(map.get("organizations")),
        locations: entity_list(map.get("locations")),
        dates: entity_list(map.get("dates")),
        numbers: entity_list(map.get("numbers")),
        signature_detected: map
            .get("signature_detected")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        error: None,
        raw_response: None,
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Accept a JSON number or a numeric string; anything else is 0.0.
fn coerce_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Clamp to `[0, 1]`, mapping NaN to 0.0.
fn clamp_unit(x: f64) -> f64 {
    if !(x >= 0.0) {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

/// Normalise an array field into entities.
///
/// Strings and objects are kept as-is; stray scalars are stringified so no
/// extracted datum is lost; nulls and nested arrays are skipped.
fn entity_list(value: Option<&Value>) -> Vec<Entity> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(entity_from_value).collect(),
        _ => Vec::new(),
    }
}

fn entity_from_value(value: &Value) -> Option<Entity> {
    match value {
        Value::String(s) => Some(Entity::Text(s.clone())),
        Value::Object(m) => Some(Entity::Object(m.clone())),
        Value::Number(n) => Some(Entity::Text(n.to_string())),
        Value::Bool(b) => Some(Entity::Text(b.to_string())),
        Value::Null | Value::Array(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_object_gets_all_defaults() {
        let rec = conform_page_record(json!({}), 2);
        assert_eq!(rec.page_number, 2);
        assert_eq!(rec.document_type, "Unknown Document");
        assert_eq!(rec.confidence, 0.0);
        assert!(rec.title.is_none());
        assert!(rec.summary.is_none());
        assert!(rec.people.is_empty());
        assert!(rec.dates.is_empty());
        assert!(!rec.signature_detected);
    }

    #[test]
    fn non_object_input_degrades_to_defaults() {
        let rec = conform_page_record(json!([1, 2, 3]), 1);
        assert_eq!(rec.document_type, "Unknown Document");
        let rec = conform_page_record(json!("just text"), 1);
        assert_eq!(rec.confidence, 0.0);
    }

    #[test]
    fn confidence_clamps_out_of_range_values() {
        let rec = conform_page_record(json!({"confidence": 1.7}), 1);
        assert_eq!(rec.confidence, 1.0);
        let rec = conform_page_record(json!({"confidence": -0.2}), 1);
        assert_eq!(rec.confidence, 0.0);
    }

    #[test]
    fn confidence_coerces_numeric_strings() {
        let rec = conform_page_record(json!({"confidence": "0.85"}), 1);
        assert_eq!(rec.confidence, 0.85);
        let rec = conform_page_record(json!({"confidence": "high"}), 1);
        assert_eq!(rec.confidence, 0.0);
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let rec = conform_page_record(
            json!({
                "document_type": "Invoice",
                "hallucinated_field": "noise",
                "another": {"deep": true}
            }),
            1,
        );
        let v = serde_json::to_value(&rec).unwrap();
        assert!(v.get("hallucinated_field").is_none());
        assert_eq!(v["document_type"], "Invoice");
    }

    #[test]
    fn entity_arrays_keep_strings_and_objects() {
        let rec = conform_page_record(
            json!({
                "people": [
                    {"name": "Nguyễn Văn A", "role": "Insured"},
                    "Trần Thị B",
                    null,
                    42
                ]
            }),
            1,
        );
        assert_eq!(rec.people.len(), 3, "null skipped, number stringified");
        assert_eq!(rec.people[1], Entity::Text("Trần Thị B".to_string()));
        assert_eq!(rec.people[2], Entity::Text("42".to_string()));
    }

    #[test]
    fn full_record_passes_through() {
        let rec = conform_page_record(
            json!({
                "document_type": "Insurance Claim Form",
                "confidence": 0.92,
                "title": "Đơn yêu cầu bồi thường",
                "summary": "Claim for storm damage.",
                "people": [{"name": "Lê Văn C", "role": "Claimant"}],
                "organizations": [{"name": "ADE Insurance"}],
                "locations": [{"name": "Hà Tĩnh"}],
                "dates": [{"label": "Claim Date", "value": "2024-10-02"}],
                "numbers": [{"label": "Policy Number", "value": "HD-0042"}],
                "signature_detected": true
            }),
            3,
        );
        assert_eq!(rec.document_type, "Insurance Claim Form");
        assert_eq!(rec.confidence, 0.92);
        assert_eq!(rec.title.as_deref(), Some("Đơn yêu cầu bồi thường"));
        assert!(rec.signature_detected);
        assert_eq!(rec.numbers.len(), 1);
    }
}
