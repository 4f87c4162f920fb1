//! Vendor website scraper.
//!
//! Pulls a fixed set of targets out of a vendor's own page and normalizes
//! them into [`VendorData`]. Each target yields a list of raw text entries;
//! normalization then turns `"Monday: 9-5"` into an hours map entry,
//! `"Blue Dream 3.5g: $35"` into a menu item, and so on.

use crate::fetch::PageFetcher;
use crate::models::VendorData;
use crate::scrapers::schema::{FieldKind, element_text};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};

/// Target name, selector, what to read.
const VENDOR_TARGETS: &[(&str, &str, FieldKind)] = &[
    ("name", "h1[class*='business-name']", FieldKind::Text),
    ("address", "div[class*='address']", FieldKind::Text),
    ("phone", "div[class*='phone']", FieldKind::Text),
    ("website", "a[class*='website']", FieldKind::Attribute("href")),
    ("hours", "div[class*='hours']", FieldKind::Text),
    ("menu", "div[class*='menu-items']", FieldKind::Text),
    ("deals", "div[class*='deals']", FieldKind::Text),
];

static ENTRY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li, p").expect("entry selector should be valid"));
static PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*([0-9]+(?:\.[0-9]+)?)").expect("price regex should be valid"));
static DISCOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]+(?:\.[0-9]+)?\s*%|\$\s*[0-9]+(?:\.[0-9]+)?\s+off")
        .expect("discount regex should be valid")
});

/// Raw target → entries, before normalization.
pub type RawVendorData = BTreeMap<String, Vec<String>>;

/// Scrapes vendor pages through a [`PageFetcher`].
#[derive(Debug)]
pub struct VendorScraper<F> {
    fetcher: F,
    targets: Vec<(&'static str, Selector, FieldKind)>,
}

impl<F> VendorScraper<F>
where
    F: PageFetcher,
{
    pub fn new(fetcher: F) -> Result<Self, Box<dyn Error>> {
        let targets = VENDOR_TARGETS
            .iter()
            .map(|&(name, sel, kind)| -> Result<_, Box<dyn Error>> {
                Ok((name, Selector::parse(sel)?, kind))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fetcher, targets })
    }

    /// Every target's entries on a page. Targets with no match are absent.
    pub fn extract_raw(&self, html: &str) -> RawVendorData {
        let document = Html::parse_document(html);
        let mut raw = RawVendorData::new();
        for (name, selector, kind) in &self.targets {
            let values: Vec<String> = document
                .select(selector)
                .flat_map(|el| entries(el, *kind))
                .collect();
            if !values.is_empty() {
                raw.insert(name.to_string(), values);
            }
        }
        raw
    }

    /// Fetch and normalize one vendor page.
    #[instrument(level = "info", skip(self))]
    pub async fn collect_vendor_data(&self, url: &str) -> Result<VendorData, Box<dyn Error>> {
        let html = self.fetcher.fetch(url).await?;
        let raw = self.extract_raw(&html);
        debug!(targets = raw.len(), "Extracted vendor targets");
        let mut data = normalize_vendor_data(&raw);
        if data.website.is_none() {
            data.website = Some(url.to_string());
        }
        Ok(data)
    }

    /// Fetch several vendor pages in order. Failures are logged and skipped.
    #[instrument(level = "info", skip_all, fields(count = urls.len()))]
    pub async fn collect_batch_vendor_data(&self, urls: &[String]) -> Vec<VendorData> {
        let vendors: Vec<VendorData> = stream::iter(urls)
            .then(|url| async move {
                match self.collect_vendor_data(url).await {
                    Ok(data) => Some(data),
                    Err(e) => {
                        error!(%url, error = %e, "Vendor fetch failed");
                        None
                    }
                }
            })
            .filter_map(|opt| std::future::ready(opt))
            .collect()
            .await;

        info!(count = vendors.len(), "Collected vendor data");
        vendors
    }
}

/// Text entries of a matched element: one per `li`/`p` inside it, or its
/// own text when it has none.
fn entries(el: ElementRef<'_>, kind: FieldKind) -> Vec<String> {
    match kind {
        FieldKind::Attribute(attr) => el
            .value()
            .attr(attr)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| vec![v.to_string()])
            .unwrap_or_default(),
        FieldKind::Text => {
            let items: Vec<String> = el
                .select(&ENTRY)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect();
            if !items.is_empty() {
                return items;
            }
            let text = element_text(el);
            if text.is_empty() { Vec::new() } else { vec![text] }
        }
    }
}

fn first(raw: &RawVendorData, key: &str) -> Option<String> {
    raw.get(key)?.iter().find(|v| !v.trim().is_empty()).cloned()
}

/// Normalize raw target entries into a [`VendorData`].
pub fn normalize_vendor_data(raw: &RawVendorData) -> VendorData {
    let list = |key: &str| raw.get(key).map(Vec::as_slice).unwrap_or_default();

    let data = VendorData {
        name: first(raw, "name").unwrap_or_default(),
        address: first(raw, "address").unwrap_or_default(),
        phone: first(raw, "phone").unwrap_or_default(),
        website: first(raw, "website"),
        hours: parse_hours(list("hours")),
        menu_items: list("menu").iter().map(|e| parse_menu_item(e)).collect(),
        deals: list("deals").iter().map(|e| parse_deal(e)).collect(),
    };
    if data.name.is_empty() {
        warn!("Vendor page has no business name");
    }
    data
}

/// `"Monday: 9-5"` → `Monday` → `9-5`. Entries without a label are kept
/// under `"notes"`.
pub fn parse_hours(entries: &[String]) -> BTreeMap<String, String> {
    let mut hours = BTreeMap::new();
    for entry in entries {
        match entry.split_once(':') {
            Some((day, text)) if !day.trim().is_empty() && !text.trim().is_empty() => {
                hours.insert(day.trim().to_string(), text.trim().to_string());
            }
            _ => {
                hours
                    .entry("notes".to_string())
                    .and_modify(|notes: &mut String| {
                        notes.push_str("; ");
                        notes.push_str(entry.trim());
                    })
                    .or_insert_with(|| entry.trim().to_string());
            }
        }
    }
    hours
}

/// `"Blue Dream 3.5g: $35"` → `{"name": "Blue Dream 3.5g", "price": 35.0}`.
pub fn parse_menu_item(entry: &str) -> Map<String, Value> {
    let mut item = Map::new();
    match PRICE.captures(entry) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let name = entry[..whole.start].trim().trim_end_matches([':', '-', '|']).trim();
            let name = if name.is_empty() { entry.trim() } else { name };
            item.insert("name".into(), json!(name));
            match caps[1].parse::<f64>() {
                Ok(price) => item.insert("price".into(), json!(price)),
                Err(_) => item.insert("price".into(), Value::Null),
            };
        }
        None => {
            item.insert("name".into(), json!(entry.trim()));
        }
    }
    item
}

/// `"10% off edibles"` → `{"description": "10% off edibles", "discount": "10%"}`.
pub fn parse_deal(entry: &str) -> Map<String, Value> {
    let mut deal = Map::new();
    deal.insert("description".into(), json!(entry.trim()));
    if let Some(m) = DISCOUNT.find(entry) {
        deal.insert("discount".into(), json!(m.as_str().trim()));
    }
    deal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::StaticFetcher;

    const VENDOR_HTML: &str = r#"
        <html><body>
          <h1 class="business-name">Test Dispensary</h1>
          <div class="address">123 Test St, Denver, CO 80202</div>
          <div class="phone">555-555-5555</div>
          <div class="hours"><ul><li>Monday: 9-5</li><li>Tuesday: 10:00-18:00</li></ul></div>
          <div class="menu-items"><p>Blue Dream 3.5g: $35</p><p>Gummies - $12.50</p><p>Ask us</p></div>
          <div class="deals"><p>10% off edibles</p></div>
        </body></html>"#;

    fn raw(pairs: &[(&str, &str)]) -> RawVendorData {
        let mut raw = RawVendorData::new();
        for (k, v) in pairs {
            raw.entry(k.to_string()).or_default().push(v.to_string());
        }
        raw
    }

    #[test]
    fn test_normalize_vendor_data() {
        let raw = raw(&[
            ("name", "Test Dispensary"),
            ("address", "123 Test St"),
            ("phone", "555-555-5555"),
            ("website", "https://test.com"),
            ("hours", "Monday: 9-5"),
            ("menu", "Product 1: $10"),
            ("deals", "10% off"),
        ]);
        let data = normalize_vendor_data(&raw);
        assert_eq!(data.name, "Test Dispensary");
        assert_eq!(data.phone, "555-555-5555");
        assert_eq!(data.website.as_deref(), Some("https://test.com"));
        assert_eq!(data.hours.get("Monday").map(String::as_str), Some("9-5"));
        assert_eq!(data.menu_items.len(), 1);
        assert_eq!(data.menu_items[0]["name"], "Product 1");
        assert_eq!(data.menu_items[0]["price"], 10.0);
        assert_eq!(data.deals.len(), 1);
        assert_eq!(data.deals[0]["discount"], "10%");
    }

    #[test]
    fn test_normalize_empty_raw() {
        let data = normalize_vendor_data(&RawVendorData::new());
        assert_eq!(data, VendorData::default());
    }

    #[test]
    fn test_parse_hours_keeps_unlabeled_notes() {
        let hours = parse_hours(&["Monday: 9:00-17:00".into(), "Closed holidays".into(), "Open late".into()]);
        assert_eq!(hours["Monday"], "9:00-17:00");
        assert_eq!(hours["notes"], "Closed holidays; Open late");
    }

    #[test]
    fn test_parse_menu_item_without_price() {
        let item = parse_menu_item("Ask us");
        assert_eq!(item["name"], "Ask us");
        assert!(item.get("price").is_none());
    }

    #[test]
    fn test_parse_deal_dollar_off() {
        let deal = parse_deal("Get $5 off your first order");
        assert_eq!(deal["discount"], "$5 off");
    }

    #[test]
    fn test_extract_raw_from_page() {
        let scraper = VendorScraper::new(StaticFetcher::new()).unwrap();
        let raw = scraper.extract_raw(VENDOR_HTML);
        assert_eq!(raw["name"], vec!["Test Dispensary".to_string()]);
        assert_eq!(raw["hours"].len(), 2);
        assert_eq!(raw["menu"].len(), 3);
        assert!(!raw.contains_key("website"));
    }

    #[tokio::test]
    async fn test_collect_vendor_data_defaults_website_to_page() {
        let url = "https://testdispensary.example/";
        let scraper = VendorScraper::new(StaticFetcher::new().with_page(url, VENDOR_HTML)).unwrap();
        let data = scraper.collect_vendor_data(url).await.unwrap();
        assert_eq!(data.website.as_deref(), Some(url));
        assert_eq!(data.hours["Tuesday"], "10:00-18:00");
        assert_eq!(data.menu_items[1]["name"], "Gummies");
        assert_eq!(data.menu_items[1]["price"], 12.5);
    }

    #[tokio::test]
    async fn test_collect_batch_skips_failures() {
        let ok = "https://ok.example/";
        let scraper = VendorScraper::new(StaticFetcher::new().with_page(ok, VENDOR_HTML)).unwrap();
        let urls = vec![ok.to_string(), "https://missing.example/".to_string()];
        let vendors = scraper.collect_batch_vendor_data(&urls).await;
        assert_eq!(vendors.len(), 1);
        assert_eq!(vendors[0].name, "Test Dispensary");
    }
}
