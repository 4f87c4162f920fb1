//! PotAdvisor state directory crawler.
//!
//! For each state the crawler:
//!
//! 1. fetches the state listing page and extracts one record per listing
//! 2. pulls a ZIP code out of each address and keeps only listings whose ZIP
//!    is in the requested set (all listings when the set is empty)
//! 3. follows each kept listing's detail link and merges the detail fields in
//! 4. writes the records to `{output_dir}/{state_name}_dispensaries.json`
//!
//! A failed listing page yields no records for that state; a failed detail
//! page keeps the listing as-is. States never affect each other.

use crate::fetch::PageFetcher;
use crate::models::Dispensary;
use crate::outputs::json;
use crate::scrapers::schema::{ExtractionSchema, FieldDef};
use crate::utils::{display_state_name, truncate_for_log};
use crate::zip_state::StateGroups;
use crate::zip_state::states::StateUrlMap;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static ZIP_IN_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([0-9]{5}(?:-[0-9]{4})?)\b").expect("ZIP regex should be valid"));

const LISTING_FIELDS: &[FieldDef] = &[
    FieldDef::text("name", "h2, h3, .title, .heading, [class*='title'], [class*='name']"),
    FieldDef::text("address", "span[class*='address'], div[class*='address']").labeled("Address:"),
    FieldDef::attr(
        "url",
        "a[href*='directory'], a.button, a[class*='btn'], a[class*='link'], a:not([class])",
        "href",
    ),
];

const DETAIL_FIELDS: &[FieldDef] = &[
    FieldDef::text("name", "h1, h2, .title, [class*='title'], [class*='heading']"),
    FieldDef::text("address", "[class*='address']").labeled("Address:"),
    FieldDef::text("phone", "a[href^='tel:'], [class*='phone']").labeled("Phone:"),
    FieldDef::attr(
        "website",
        "a[class*='website'], a[class*='external'], a[href^='http']",
        "href",
    )
    .labeled("Website:"),
    FieldDef::text("hours", "[class*='hours']").labeled("Hours:"),
    FieldDef::text("type", "[class*='type'], span.recreational, span.medical").labeled("Type:"),
];

/// Pull a ZIP code out of a free-form address.
///
/// The last match wins, not the first: a five-digit street number comes
/// before the ZIP in US addresses, so `"12345 Main St, Anchorage, AK 99501"`
/// yields `99501` rather than `12345`.
pub fn extract_zip_from_address(address: &str) -> Option<String> {
    ZIP_IN_ADDRESS
        .captures_iter(address)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// First five characters of a ZIP, i.e. without any `-NNNN` suffix.
pub fn zip_base(zip: &str) -> &str {
    zip.split('-').next().unwrap_or(zip)
}

/// Crawls state listing pages and their detail pages.
#[derive(Debug)]
pub struct PotAdvisorCrawler<F> {
    fetcher: F,
    output_dir: PathBuf,
    base_url: Url,
    detail_concurrency: usize,
    listing_schema: ExtractionSchema,
    detail_schema: ExtractionSchema,
}

impl<F> PotAdvisorCrawler<F>
where
    F: PageFetcher,
{
    /// `base_url` resolves relative detail links.
    pub fn new(fetcher: F, output_dir: impl Into<PathBuf>, base_url: &str) -> Result<Self, Box<dyn Error>> {
        let output_dir = output_dir.into();
        let crawler = Self {
            fetcher,
            base_url: Url::parse(base_url)?,
            detail_concurrency: 4,
            listing_schema: ExtractionSchema::new(
                "PotAdvisor State Listings",
                Some(".article, article, .dispensary, div[class*='dispensary']"),
                LISTING_FIELDS,
            )?,
            detail_schema: ExtractionSchema::new("PotAdvisor Dispensary Details", None, DETAIL_FIELDS)?,
            output_dir,
        };
        info!(output_dir = %crawler.output_dir.display(), "PotAdvisor crawler initialized");
        Ok(crawler)
    }

    /// Detail pages fetched at once within one state. Minimum 1.
    pub fn with_detail_concurrency(mut self, n: usize) -> Self {
        self.detail_concurrency = n.max(1);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Listings on a state page, with `zip_code` filled in where the address has one.
    pub fn extract_listings(&self, html: &str) -> Vec<Dispensary> {
        self.listing_schema
            .extract(html)
            .into_iter()
            .filter_map(|record| match Dispensary::from_record(record) {
                Ok(d) => Some(d),
                Err(e) => {
                    debug!(error = %e, "Skipping malformed listing record");
                    None
                }
            })
            .filter(|d| !d.name.is_empty() || !d.address.is_empty())
            .unique_by(|d| (d.name.clone(), d.address.clone(), d.url.clone()))
            .map(|mut d| {
                d.zip_code = extract_zip_from_address(&d.address);
                d
            })
            .collect()
    }

    /// Fields found on a detail page, if any.
    pub fn extract_detail(&self, html: &str) -> Option<Dispensary> {
        self.detail_schema
            .extract(html)
            .into_iter()
            .next()
            .and_then(|record| Dispensary::from_record(record).ok())
    }

    /// Crawl one state and return the listings in `filter_zip_codes`.
    #[instrument(level = "info", skip(self, filter_zip_codes), fields(filter = filter_zip_codes.len()))]
    pub async fn crawl_state(
        &self,
        state_abbr: &str,
        state_name: &str,
        url: &str,
        filter_zip_codes: &HashSet<String>,
    ) -> Vec<Dispensary> {
        info!("Starting crawl for {} ({})", display_state_name(state_name), state_abbr);

        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                error!(%url, error = %e, "Failed to crawl state listing");
                return Vec::new();
            }
        };

        let listings = self.extract_listings(&html);
        if listings.is_empty() {
            warn!(
                %url,
                schema = self.listing_schema.name(),
                preview = %truncate_for_log(&html, 200),
                "No listings extracted from state page"
            );
            return Vec::new();
        }
        info!(count = listings.len(), "Found dispensaries in {}", display_state_name(state_name));

        let wanted: HashSet<&str> = filter_zip_codes.iter().map(|z| zip_base(z)).collect();
        let filtered: Vec<Dispensary> = listings
            .into_iter()
            .filter(|d| {
                wanted.is_empty()
                    || d.zip_code.as_deref().is_some_and(|z| wanted.contains(zip_base(z)))
            })
            .collect();
        info!(count = filtered.len(), "Filtered to dispensaries in specified ZIP codes");

        stream::iter(filtered)
            .map(|listing| self.with_details(listing))
            .buffered(self.detail_concurrency)
            .collect()
            .await
    }

    /// Merge a listing with its detail page; on any failure the listing is returned unchanged.
    async fn with_details(&self, mut listing: Dispensary) -> Dispensary {
        let Some(href) = listing.url.clone() else {
            warn!(name = %listing.name, "No URL for dispensary");
            return listing;
        };
        let detail_url = match self.base_url.join(&href) {
            Ok(u) => u.to_string(),
            Err(e) => {
                warn!(name = %listing.name, %href, error = %e, "Unusable detail URL");
                return listing;
            }
        };

        debug!(name = %listing.name, %detail_url, "Crawling details");
        match self.fetcher.fetch(&detail_url).await {
            Ok(html) => {
                if let Some(detail) = self.extract_detail(&html) {
                    listing.merge(detail);
                    if let Some(zip) = extract_zip_from_address(&listing.address) {
                        listing.zip_code = Some(zip);
                    }
                }
                listing.url = Some(detail_url);
            }
            Err(e) => {
                warn!(name = %listing.name, %detail_url, error = %e, "Failed to get details");
            }
        }
        listing
    }

    /// Crawl every state in `state_mapping` and save the non-empty results.
    ///
    /// Returns state code → file written. States with no records, or whose
    /// file could not be written, are left out.
    #[instrument(level = "info", skip_all, fields(states = state_mapping.len()))]
    pub async fn crawl_and_save(
        &self,
        state_mapping: &StateUrlMap,
        filter_zips_by_state: &StateGroups,
    ) -> BTreeMap<String, PathBuf> {
        let mut output_files = BTreeMap::new();

        for (state_abbr, target) in state_mapping {
            let filter: HashSet<String> = filter_zips_by_state
                .get(state_abbr)
                .unwrap_or_default()
                .iter()
                .cloned()
                .collect();

            let dispensaries = self
                .crawl_state(state_abbr, &target.state_name, &target.url, &filter)
                .await;

            if dispensaries.is_empty() {
                warn!(state = %state_abbr, "No dispensaries found for {}", display_state_name(&target.state_name));
                continue;
            }

            match json::write_state_dispensaries(&self.output_dir, &target.state_name, &dispensaries).await {
                Ok(path) => {
                    output_files.insert(state_abbr.clone(), path);
                }
                Err(e) => {
                    error!(state = %state_abbr, error = %e, "Error saving results");
                }
            }
        }

        output_files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::StaticFetcher;
    use crate::zip_state::states::{DEFAULT_BASE_URL, StateUrl};

    const AK_URL: &str = "https://potadvisor.com/states/alaska/alaska-dispensaries/";
    const WA_URL: &str = "https://potadvisor.com/states/washington/washington-dispensaries/";

    const AK_LISTING: &str = r#"
        <html><body>
          <article>
            <h2>Green Leaf</h2>
            <p>Address: 1200 W Northern Lights Blvd, Anchorage, AK 99501</p>
            <a href="/directory/green-leaf/">More</a>
          </article>
          <article>
            <h2>Arctic Buds</h2>
            <p>Address: 400 Spenard Rd, Anchorage, AK 99503-1234</p>
            <a href="/directory/arctic-buds/">More</a>
          </article>
          <article>
            <h2>Far Away</h2>
            <p>Address: 9 Elsewhere Ln, Fairbanks, AK 99701</p>
            <a href="/directory/far-away/">More</a>
          </article>
        </body></html>"#;

    const GREEN_LEAF_DETAIL: &str = r#"
        <html><body>
          <h1>Green Leaf Cannabis</h1>
          <p>Phone: (907) 555-0100</p>
          <p>Website: <a href="https://greenleaf.example">greenleaf.example</a></p>
          <p>Hours: Mon-Sun 8am-10pm</p>
          <span class="type">Recreational</span>
        </body></html>"#;

    fn fixture_fetcher() -> StaticFetcher {
        StaticFetcher::new()
            .with_page(AK_URL, AK_LISTING)
            .with_page("https://potadvisor.com/directory/green-leaf/", GREEN_LEAF_DETAIL)
    }

    fn tmp_dir(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("dispensary_intake_crawl_{}", name));
        let _ = std::fs::remove_dir_all(&p);
        p
    }

    fn filter(zips: &[&str]) -> HashSet<String> {
        zips.iter().map(|z| z.to_string()).collect()
    }

    #[test]
    fn test_extract_zip_from_address() {
        assert_eq!(
            extract_zip_from_address("12345 Main St, Anchorage, AK 99501").as_deref(),
            Some("99501")
        );
        assert_eq!(extract_zip_from_address("Seattle, WA 98101-2222").as_deref(), Some("98101-2222"));
        assert_eq!(
            extract_zip_from_address("10001 Broadway Ave, Seattle, WA 98101").as_deref(),
            Some("98101")
        );
        assert_eq!(extract_zip_from_address("no zip here"), None);
        assert_eq!(extract_zip_from_address("Suite 1234567"), None);
    }

    #[test]
    fn test_zip_base() {
        assert_eq!(zip_base("99501-1234"), "99501");
        assert_eq!(zip_base("99501"), "99501");
    }

    #[test]
    fn test_extract_listings_injects_zip() {
        let crawler = PotAdvisorCrawler::new(StaticFetcher::new(), tmp_dir("extract"), DEFAULT_BASE_URL).unwrap();
        let listings = crawler.extract_listings(AK_LISTING);
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[0].name, "Green Leaf");
        assert_eq!(listings[0].zip_code.as_deref(), Some("99501"));
        assert_eq!(listings[1].zip_code.as_deref(), Some("99503-1234"));
        assert_eq!(listings[0].url.as_deref(), Some("/directory/green-leaf/"));
    }

    #[tokio::test]
    async fn test_crawl_state_filters_and_merges_details() {
        let crawler = PotAdvisorCrawler::new(fixture_fetcher(), tmp_dir("state"), DEFAULT_BASE_URL).unwrap();
        let results = crawler
            .crawl_state("AK", "alaska", AK_URL, &filter(&["99501", "99503"]))
            .await;

        assert_eq!(results.len(), 2);

        let green = &results[0];
        assert_eq!(green.name, "Green Leaf Cannabis");
        assert_eq!(green.phone.as_deref(), Some("(907) 555-0100"));
        assert_eq!(green.website.as_deref(), Some("https://greenleaf.example"));
        assert_eq!(green.hours.as_deref(), Some("Mon-Sun 8am-10pm"));
        assert_eq!(green.kind.as_deref(), Some("Recreational"));
        assert_eq!(green.zip_code.as_deref(), Some("99501"));
        assert_eq!(green.url.as_deref(), Some("https://potadvisor.com/directory/green-leaf/"));

        // Detail page 404s: listing data survives untouched.
        let arctic = &results[1];
        assert_eq!(arctic.name, "Arctic Buds");
        assert_eq!(arctic.phone, None);
        assert_eq!(arctic.url.as_deref(), Some("/directory/arctic-buds/"));
    }

    #[tokio::test]
    async fn test_crawl_state_filter_matches_on_zip_base() {
        let crawler = PotAdvisorCrawler::new(fixture_fetcher(), tmp_dir("base"), DEFAULT_BASE_URL)
            .unwrap()
            .with_detail_concurrency(1);
        // ZIP+4 in the filter against a plain ZIP in the address.
        let results = crawler
            .crawl_state("AK", "alaska", AK_URL, &filter(&["99501-0001"]))
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].zip_code.as_deref(), Some("99501"));

        // Plain ZIP in the filter against ZIP+4 in the address.
        let results = crawler
            .crawl_state("AK", "alaska", AK_URL, &filter(&["99503"]))
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].zip_code.as_deref(), Some("99503-1234"));
    }

    #[tokio::test]
    async fn test_crawl_state_without_filter_keeps_everything() {
        let crawler = PotAdvisorCrawler::new(fixture_fetcher(), tmp_dir("nofilter"), DEFAULT_BASE_URL)
            .unwrap()
            .with_detail_concurrency(1);
        let results = crawler.crawl_state("AK", "alaska", AK_URL, &HashSet::new()).await;
        assert_eq!(results.len(), 3);
        let names: Vec<&str> = results.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Green Leaf Cannabis", "Arctic Buds", "Far Away"]);
    }

    #[tokio::test]
    async fn test_crawl_state_listing_failure_is_empty() {
        let crawler = PotAdvisorCrawler::new(StaticFetcher::new(), tmp_dir("fail"), DEFAULT_BASE_URL).unwrap();
        let results = crawler.crawl_state("AK", "alaska", AK_URL, &HashSet::new()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_crawl_and_save_omits_empty_states() {
        let dir = tmp_dir("save");
        let crawler = PotAdvisorCrawler::new(fixture_fetcher(), &dir, DEFAULT_BASE_URL).unwrap();

        let mut mapping = StateUrlMap::new();
        mapping.insert("AK".into(), StateUrl { url: AK_URL.into(), state_name: "alaska".into() });
        mapping.insert("WA".into(), StateUrl { url: WA_URL.into(), state_name: "washington".into() });

        let mut groups = StateGroups::new();
        groups.push("AK", "99501");
        groups.push("WA", "98101");

        let files = crawler.crawl_and_save(&mapping, &groups).await;
        assert_eq!(files.len(), 1);
        let path = &files["AK"];
        assert_eq!(path, &dir.join("alaska_dispensaries.json"));

        let written: Vec<Dispensary> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].zip_code.as_deref(), Some("99501"));
        assert!(!dir.join("washington_dispensaries.json").exists());
    }
}
