//! Data models for scraped dispensary and vendor records.
//!
//! - [`Dispensary`]: one listing from the state directory, optionally merged
//!   with its detail page
//! - [`VendorData`]: a vendor website normalized into a fixed shape
//! - [`CollectionRun`]: summary of a `collect` run, written next to the
//!   per-state files

use crate::zip_state::StateGroups;
use crate::zip_state::states::StateUrlMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A dispensary as extracted from the directory.
///
/// The six descriptive fields are always written (as `null` when the page
/// did not have them). `url` and `zip_code` only appear when known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Dispensary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub hours: Option<String>,
    /// Recreational / medical, as the directory words it.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Link to the detail page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

impl Dispensary {
    /// Build from a schema extraction record. Unknown keys are ignored.
    pub fn from_record(record: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record))
    }

    /// Overlay detail-page fields onto this listing. Blank values in
    /// `detail` never erase what the listing already had.
    pub fn merge(&mut self, detail: Dispensary) {
        fn take(dst: &mut Option<String>, src: Option<String>) {
            if let Some(v) = src.filter(|v| !v.trim().is_empty()) {
                *dst = Some(v);
            }
        }
        if !detail.name.trim().is_empty() {
            self.name = detail.name;
        }
        if !detail.address.trim().is_empty() {
            self.address = detail.address;
        }
        take(&mut self.phone, detail.phone);
        take(&mut self.website, detail.website);
        take(&mut self.hours, detail.hours);
        take(&mut self.kind, detail.kind);
        take(&mut self.url, detail.url);
        take(&mut self.zip_code, detail.zip_code);
    }
}

/// A vendor website normalized into a fixed shape.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VendorData {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub website: Option<String>,
    /// Day (or label) → opening hours text.
    pub hours: BTreeMap<String, String>,
    pub menu_items: Vec<Map<String, Value>>,
    pub deals: Vec<Map<String, Value>>,
}

/// What a `collect` run did, for later inspection.
#[derive(Debug, Serialize)]
pub struct CollectionRun {
    /// `YYYY-MM-DD`, local time.
    pub local_date: String,
    pub local_time: String,
    pub state_groups: StateGroups,
    pub urls: StateUrlMap,
    /// State code → file written. States with no records are absent.
    pub output_files: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispensary_serializes_required_fields_as_null() {
        let d = Dispensary {
            name: "Green Leaf".into(),
            address: "1 Main St, Anchorage, AK 99501".into(),
            ..Default::default()
        };
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["name"], "Green Leaf");
        assert!(v["phone"].is_null());
        assert!(v["type"].is_null());
        assert!(v.get("zip_code").is_none());
        assert!(v.get("url").is_none());
    }

    #[test]
    fn test_dispensary_from_record() {
        let record = json!({
            "name": "Green Leaf",
            "address": "1 Main St",
            "type": "Recreational",
            "extra": "ignored"
        });
        let Value::Object(map) = record else { unreachable!() };
        let d = Dispensary::from_record(map).unwrap();
        assert_eq!(d.kind.as_deref(), Some("Recreational"));
        assert_eq!(d.phone, None);
    }

    #[test]
    fn test_merge_prefers_non_blank_detail_values() {
        let mut listing = Dispensary {
            name: "Green Leaf".into(),
            address: "1 Main St, Anchorage, AK 99501".into(),
            url: Some("https://potadvisor.com/directory/green-leaf/".into()),
            zip_code: Some("99501".into()),
            ..Default::default()
        };
        let detail = Dispensary {
            name: "Green Leaf Cannabis".into(),
            address: "".into(),
            phone: Some("(907) 555-0100".into()),
            hours: Some("   ".into()),
            ..Default::default()
        };
        listing.merge(detail);
        assert_eq!(listing.name, "Green Leaf Cannabis");
        assert_eq!(listing.address, "1 Main St, Anchorage, AK 99501");
        assert_eq!(listing.phone.as_deref(), Some("(907) 555-0100"));
        assert_eq!(listing.hours, None);
        assert_eq!(listing.zip_code.as_deref(), Some("99501"));
    }

    #[test]
    fn test_vendor_data_roundtrip() {
        let mut hours = BTreeMap::new();
        hours.insert("Monday".to_string(), "9-5".to_string());
        let v = VendorData {
            name: "Test Dispensary".into(),
            address: "123 Test St".into(),
            phone: "555-555-5555".into(),
            website: Some("https://test.com".into()),
            hours,
            menu_items: vec![],
            deals: vec![],
        };
        let json = serde_json::to_string(&v).unwrap();
        let back: VendorData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
