use serde::{Deserialize, Serialize};

use crate::core::config::SizeMultipliers;
use crate::core::model::Equipment;

const PLACEHOLDER_TAGS: &[&str] = &["?", "-", "--", "N/A", "NA", "UNKNOWN", "TBD", "NONE", "NULL"];

const LARGE_KEYWORDS: &[&str] = &[
    "tank", "reactor", "vessel", "column", "tower", "drum", "boiler", "silo", "furnace",
    "heat exchanger", "exchanger", "separator", "switchgear", "generator", "transformer",
];

const SMALL_KEYWORDS: &[&str] = &[
    "transmitter", "indicator", "gauge", "sensor", "switch", "element", "instrument",
    "controller", "thermocouple", "orifice", "relay", "fuse", "lamp", "terminal",
];

/// Trims a recognizer tag and rejects empty or placeholder values.
pub fn usable_tag(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_uppercase();
    if PLACEHOLDER_TAGS.contains(&upper.as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Comparison key: upper-case alphanumerics only, so `pt 101` and `PT-101` agree.
pub fn tag_key(tag: &str) -> String {
    tag.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn same_tag(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => tag_key(a) == tag_key(b),
        _ => false,
    }
}

/// Two tagged items that name different components.
pub fn conflicting_tags(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if tag_key(a) != tag_key(b))
}

/// Unordered key for a connection's endpoint pair.
pub fn tag_pair_key(from: Option<&str>, to: Option<&str>) -> (String, String) {
    let a = from.map(tag_key).unwrap_or_default();
    let b = to.map(tag_key).unwrap_or_default();
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Large,
    Medium,
    Small,
}

impl SizeClass {
    pub fn multiplier(&self, multipliers: &SizeMultipliers) -> f64 {
        match self {
            SizeClass::Large => multipliers.large,
            SizeClass::Medium => multipliers.medium,
            SizeClass::Small => multipliers.small,
        }
    }
}

pub fn size_class(equipment: &Equipment) -> SizeClass {
    let mut text = equipment.category.to_lowercase();
    if let Some(desc) = &equipment.description {
        text.push(' ');
        text.push_str(&desc.to_lowercase());
    }

    // The category outranks the free-text description.
    let category = equipment.category.to_lowercase();
    if LARGE_KEYWORDS.iter().any(|kw| category.contains(kw)) {
        return SizeClass::Large;
    }
    if SMALL_KEYWORDS.iter().any(|kw| category.contains(kw)) {
        return SizeClass::Small;
    }
    if LARGE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        SizeClass::Large
    } else if SMALL_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        SizeClass::Small
    } else {
        SizeClass::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::BBox;

    fn equipment(category: &str, description: Option<&str>) -> Equipment {
        Equipment {
            category: category.to_string(),
            tag: None,
            bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
            page: 0,
            confidence: 0.5,
            partial: false,
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn rejects_placeholder_tags() {
        assert_eq!(usable_tag(Some("  ")), None);
        assert_eq!(usable_tag(Some("n/a")), None);
        assert_eq!(usable_tag(Some("?")), None);
        assert_eq!(usable_tag(None), None);
        assert_eq!(usable_tag(Some(" M-101 ")), Some("M-101".to_string()));
    }

    #[test]
    fn tag_keys_ignore_punctuation_and_case() {
        assert!(same_tag(Some("pt 101"), Some("PT-101")));
        assert!(!same_tag(Some("CB-101"), Some("CB-102")));
        assert!(!same_tag(None, Some("CB-102")));
        assert!(conflicting_tags(Some("CB-101"), Some("CB-102")));
        assert!(!conflicting_tags(None, Some("CB-102")));
    }

    #[test]
    fn pair_key_is_unordered() {
        assert_eq!(tag_pair_key(Some("P-1"), Some("V-2")), tag_pair_key(Some("V-2"), Some("P-1")));
        assert_ne!(tag_pair_key(Some("P-1"), None), tag_pair_key(Some("P-1"), Some("V-2")));
    }

    #[test]
    fn classifies_size_from_keywords() {
        assert_eq!(size_class(&equipment("storage tank", None)), SizeClass::Large);
        assert_eq!(size_class(&equipment("pressure transmitter", None)), SizeClass::Small);
        assert_eq!(size_class(&equipment("pump", None)), SizeClass::Medium);
        assert_eq!(
            size_class(&equipment("symbol", Some("Distillation column"))),
            SizeClass::Large
        );
    }
}
