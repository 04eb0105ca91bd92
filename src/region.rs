//! Macro-region classification for Vietnamese addresses.
//!
//! An address or place-of-origin string is mapped onto one of the three
//! administrative macro-regions (Bắc/Trung/Nam) by substring matching
//! against fixed province tables. The tables are public constants so tests
//! can enumerate them and catch province-list drift; matching logic never
//! embeds a province name inline.
//!
//! Probe order is load-bearing: the northern table is checked before the
//! central table, and the southern keywords only as a fallback. A string
//! matching several tables resolves to whichever table is probed first —
//! downstream recommendation behaviour is defined on this exact order, so
//! it must not be "fixed".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrative macro-region of Vietnam.
///
/// Serialised with the exact wire spellings (`"Bac"`, `"Trung"`, `"Nam"`,
/// `"Unknown"`) the recommendation schema uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RegionTag {
    Bac,
    Trung,
    Nam,
    #[default]
    Unknown,
}

impl RegionTag {
    /// True for the two storm-and-flood-exposed regions.
    pub fn is_disaster_prone(self) -> bool {
        matches!(self, RegionTag::Bac | RegionTag::Trung)
    }
}

impl fmt::Display for RegionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegionTag::Bac => "Bac",
            RegionTag::Trung => "Trung",
            RegionTag::Nam => "Nam",
            RegionTag::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Northern provinces and cities, lower-case, diacritics preserved.
pub const NORTH_PROVINCES: &[&str] = &[
    "hà nội",
    "hải phòng",
    "quảng ninh",
    "hải dương",
    "hưng yên",
    "bắc ninh",
    "vĩnh phúc",
    "phú thọ",
    "thái nguyên",
    "bắc giang",
    "lạng sơn",
    "cao bằng",
    "lào cai",
    "yên bái",
    "tuyên quang",
    "hòa bình",
    "sơn la",
    "lai châu",
    "điện biên",
    "hà giang",
    "ninh bình",
    "nam định",
    "thái bình",
];

/// Central provinces and cities, lower-case, diacritics preserved.
pub const CENTRAL_PROVINCES: &[&str] = &[
    "thanh hóa",
    "nghệ an",
    "hà tĩnh",
    "quảng bình",
    "quảng trị",
    "thừa thiên huế",
    "đà nẵng",
    "quảng nam",
    "quảng ngãi",
    "bình định",
    "phú yên",
    "khánh hòa",
    "ninh thuận",
    "bình thuận",
    "kon tum",
    "gia lai",
    "đắk lắk",
    "đắk nông",
    "lâm đồng",
];

/// Southern identifiers: city aliases plus the most common southern
/// provinces. A deliberately smaller fallback set — anything not caught by
/// the northern or central tables and not matching here stays Unknown.
pub const SOUTH_KEYWORDS: &[&str] = &[
    "sài gòn",
    "tp.hcm",
    "hồ chí minh",
    "đồng nai",
    "bình dương",
    "long an",
    "tiền giang",
    "cần thơ",
    "an giang",
];

/// Classify a free-text location string into a macro-region.
///
/// Case-insensitive substring matching; `None`/empty input short-circuits to
/// [`RegionTag::Unknown`] without scanning the tables.
pub fn classify_region(text: Option<&str>) -> RegionTag {
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return RegionTag::Unknown,
    };
    let lower = text.to_lowercase();

    if NORTH_PROVINCES.iter().any(|p| lower.contains(p)) {
        return RegionTag::Bac;
    }
    if CENTRAL_PROVINCES.iter().any(|p| lower.contains(p)) {
        return RegionTag::Trung;
    }
    if SOUTH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return RegionTag::Nam;
    }
    RegionTag::Unknown
}
