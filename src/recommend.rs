//! Region-based insurance-package recommendation.
//!
//! A fixed decision table maps the (place-of-origin region, residence
//! region) pair to either the standard three natural-disaster packages or
//! nothing. Package names, reason templates, and priorities are constants
//! reproduced verbatim — the engine assembles them, it never invents them —
//! which keeps every recommendation auditable and byte-for-byte testable.
//!
//! Place of origin outranks residence: someone whose family home is in the
//! storm belt keeps property exposure there even while living in the south.

use crate::output::IdentityRecord;
use crate::region::{classify_region, RegionTag};
use serde::{Deserialize, Serialize};

/// Name of the flood/disaster package.
pub const PKG_FLOOD: &str = "Bảo hiểm thiên tai ngập lụt";
/// Name of the storm/home package.
pub const PKG_STORM_HOME: &str = "Bảo hiểm nhà cửa trước bão";
/// Name of the vehicle flood-damage package.
pub const PKG_VEHICLE_FLOOD: &str = "Bảo hiểm phương tiện ngập nước";

const PRIORITY_FLOOD: f64 = 0.95;
const PRIORITY_STORM_HOME: f64 = 0.90;
const PRIORITY_VEHICLE_FLOOD: f64 = 0.85;

/// One recommended package with its audit reason and ranking priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPackage {
    pub name: String,
    pub reason: String,
    /// Fixed ranking weight in `[0, 1]`.
    pub priority: f64,
}

/// How the residence address was labelled on the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// Permanent residence ("thường trú").
    ThuongTru,
    /// Temporary residence ("tạm trú").
    TamTru,
    #[default]
    Unknown,
}

/// Residence address with its classified region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: AddressKind,
    pub region: RegionTag,
}

/// Place of origin with its classified region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginInfo {
    pub text: String,
    pub region: RegionTag,
}

/// Full recommendation result for one person.
///
/// `recommended_packages` is either the fixed three-package set or empty —
/// never a partial set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub address: AddressInfo,
    pub place_of_origin: OriginInfo,
    pub final_region: RegionTag,
    pub recommended_packages: Vec<RecommendationPackage>,
    /// Degradation note when the source document could not be analysed;
    /// the surrounding fields still hold their well-shaped defaults.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Outcome of the decision table alone: the region the recommendation is
/// anchored on and the package list it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub final_region: RegionTag,
    pub packages: Vec<RecommendationPackage>,
}

/// Apply the decision table to a classified (origin, residence) pair.
///
/// Evaluated in priority order:
/// 1. Origin in Bắc/Trung → recommend for the origin region, regardless of
///    residence.
/// 2. Residence in Bắc/Trung while the origin is Nam or unknown → recommend
///    for the residence region (an unknown origin defers to where the
///    person actually lives).
/// 3. Anything else (both Nam, or nothing classifiable) → no packages;
///    `final_region` falls back to the origin region unless it is Unknown,
///    then the residence region.
pub fn decide(origin_region: RegionTag, address_region: RegionTag) -> Decision {
    if origin_region.is_disaster_prone() {
        return Decision {
            final_region: origin_region,
            packages: disaster_packages(&format!("Quê quán tại miền {origin_region}"), origin_region),
        };
    }
    if address_region.is_disaster_prone() {
        return Decision {
            final_region: address_region,
            packages: disaster_packages(
                &format!("Địa chỉ thường trú tại miền {address_region}"),
                address_region,
            ),
        };
    }
    Decision {
        final_region: if origin_region != RegionTag::Unknown {
            origin_region
        } else {
            address_region
        },
        packages: Vec::new(),
    }
}

/// The fixed three-package set, reasons parameterised by the anchoring
/// region. `lead_in` names which field drove the decision ("Quê quán tại
/// miền X" / "Địa chỉ thường trú tại miền X").
fn disaster_packages(lead_in: &str, region: RegionTag) -> Vec<RecommendationPackage> {
    vec![
        RecommendationPackage {
            name: PKG_FLOOD.to_string(),
            reason: format!(
                "{lead_in} thường xuyên chịu ảnh hưởng bởi bão và mưa lũ. \
                 Gói bảo hiểm này bảo vệ tài sản khỏi thiệt hại do ngập lụt, lũ quét."
            ),
            priority: PRIORITY_FLOOD,
        },
        RecommendationPackage {
            name: PKG_STORM_HOME.to_string(),
            reason: format!(
                "Bão và gió mạnh thường xảy ra tại miền {region}, gây hư hại cho mái nhà, \
                 cửa sổ, tường. Gói này đảm bảo chi phí sửa chữa hoặc xây dựng lại."
            ),
            priority: PRIORITY_STORM_HOME,
        },
        RecommendationPackage {
            name: PKG_VEHICLE_FLOOD.to_string(),
            reason: "Xe máy, ô tô dễ bị ngập nước khi mưa lớn hoặc lũ lụt. Gói này giúp bồi \
                     thường chi phí sửa chữa động cơ, hệ thống điện bị hư hỏng do nước."
                .to_string(),
            priority: PRIORITY_VEHICLE_FLOOD,
        },
    ]
}

/// Build a full recommendation from free-text origin/residence fields.
///
/// Regions are classified locally and the decision table applied — the
/// package list is derived here even when the texts came from an oracle
/// response that claimed its own regions or packages.
pub fn recommend_from_texts(
    origin_text: Option<&str>,
    address_text: Option<&str>,
    address_kind: AddressKind,
) -> RecommendationResult {
    let origin_region = classify_region(origin_text);
    let address_region = classify_region(address_text);
    let decision = decide(origin_region, address_region);

    RecommendationResult {
        address: AddressInfo {
            text: address_text.unwrap_or_default().to_string(),
            kind: address_kind,
            region: address_region,
        },
        place_of_origin: OriginInfo {
            text: origin_text.unwrap_or_default().to_string(),
            region: origin_region,
        },
        final_region: decision.final_region,
        recommended_packages: decision.packages,
        error: None,
    }
}

/// Derive a recommendation from an already-extracted identity record.
///
/// Pure function of the record's `placeOfOrigin` and `address` fields; no
/// oracle call is made. The address is assumed to be the permanent
/// residence when present (identity documents print "Nơi thường trú").
pub fn recommend_for_identity(identity: &IdentityRecord) -> RecommendationResult {
    let kind = if identity.address.as_deref().is_some_and(|a| !a.is_empty()) {
        AddressKind::ThuongTru
    } else {
        AddressKind::Unknown
    };
    recommend_from_texts(
        identity.place_of_origin.as_deref(),
        identity.address.as_deref(),
        kind,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priorities(r: &RecommendationResult) -> Vec<f64> {
        r.recommended_packages.iter().map(|p| p.priority).collect()
    }

    #[test]
    fn central_origin_recommends_regardless_of_address() {
        let r = recommend_from_texts(Some("Hà Tĩnh"), Some("TP.HCM"), AddressKind::ThuongTru);
        assert_eq!(r.final_region, RegionTag::Trung);
        assert_eq!(priorities(&r), vec![0.95, 0.90, 0.85]);
        assert!(r.recommended_packages[0].reason.contains("Quê quán tại miền Trung"));
    }

    #[test]
    fn southern_origin_with_northern_address_recommends_for_address() {
        let r = recommend_from_texts(Some("TP.HCM"), Some("Hà Nội"), AddressKind::ThuongTru);
        assert_eq!(r.final_region, RegionTag::Bac);
        assert_eq!(r.recommended_packages.len(), 3);
        assert!(r.recommended_packages[0]
            .reason
            .contains("Địa chỉ thường trú tại miền Bac"));
    }

    #[test]
    fn both_southern_recommends_nothing() {
        let r = recommend_from_texts(Some("TP.HCM"), Some("Cần Thơ"), AddressKind::ThuongTru);
        assert_eq!(r.final_region, RegionTag::Nam);
        assert!(r.recommended_packages.is_empty());
    }

    #[test]
    fn unknown_origin_defers_to_address() {
        let r = recommend_from_texts(None, Some("Nghệ An"), AddressKind::ThuongTru);
        assert_eq!(r.place_of_origin.region, RegionTag::Unknown);
        assert_eq!(r.final_region, RegionTag::Trung);
        assert_eq!(priorities(&r), vec![0.95, 0.90, 0.85]);
        assert!(r.recommended_packages[0]
            .reason
            .contains("Địa chỉ thường trú tại miền Trung"));
    }

    #[test]
    fn nothing_classifiable_recommends_nothing() {
        let r = recommend_from_texts(None, None, AddressKind::Unknown);
        assert_eq!(r.final_region, RegionTag::Unknown);
        assert!(r.recommended_packages.is_empty());

        let r = recommend_from_texts(Some("TP.HCM"), None, AddressKind::Unknown);
        assert_eq!(r.final_region, RegionTag::Nam);
        assert!(r.recommended_packages.is_empty());
    }

    #[test]
    fn package_names_are_the_fixed_constants() {
        let d = decide(RegionTag::Bac, RegionTag::Nam);
        let names: Vec<&str> = d.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec![PKG_FLOOD, PKG_STORM_HOME, PKG_VEHICLE_FLOOD]);
    }

    #[test]
    fn package_set_is_all_or_nothing() {
        for origin in [RegionTag::Bac, RegionTag::Trung, RegionTag::Nam, RegionTag::Unknown] {
            for address in [RegionTag::Bac, RegionTag::Trung, RegionTag::Nam, RegionTag::Unknown] {
                let d = decide(origin, address);
                assert!(
                    d.packages.is_empty() || d.packages.len() == 3,
                    "partial set for ({origin:?}, {address:?})"
                );
            }
        }
    }

    #[test]
    fn identity_record_drives_recommendation() {
        let identity = IdentityRecord {
            place_of_origin: Some("Nghệ An".to_string()),
            address: Some("Quận 1, TP.HCM".to_string()),
            ..Default::default()
        };
        let r = recommend_for_identity(&identity);
        assert_eq!(r.final_region, RegionTag::Trung);
        assert_eq!(r.address.kind, AddressKind::ThuongTru);
        assert_eq!(r.address.region, RegionTag::Nam);
        assert_eq!(r.recommended_packages.len(), 3);
    }

    #[test]
    fn missing_address_is_unknown_kind() {
        let identity = IdentityRecord {
            place_of_origin: Some("Hà Nội".to_string()),
            ..Default::default()
        };
        let r = recommend_for_identity(&identity);
        assert_eq!(r.address.kind, AddressKind::Unknown);
        assert_eq!(r.address.text, "");
        assert_eq!(r.final_region, RegionTag::Bac);
    }

    #[test]
    fn result_serialises_with_wire_keys() {
        let r = recommend_from_texts(Some("Hà Tĩnh"), Some("Hà Nội"), AddressKind::ThuongTru);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["address"]["type"], "thuong_tru");
        assert_eq!(v["address"]["region"], "Bac");
        assert_eq!(v["place_of_origin"]["region"], "Trung");
        assert_eq!(v["recommended_packages"][0]["priority"], 0.95);
    }
}
