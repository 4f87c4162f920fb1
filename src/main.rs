//! # Dispensary Intake
//!
//! Collects dispensary listings for a set of ZIP codes and writes normalized
//! JSON.
//!
//! ## Usage
//!
//! ```sh
//! dispensary_intake collect --zips "99501, 98101" -o output/normalized
//! ```
//!
//! ## Architecture
//!
//! 1. **Classification**: parse the ZIP input and group valid ZIPs by state
//! 2. **Projection**: map each state onto its directory listing page
//! 3. **Crawling**: fetch each state page, keep listings in the requested
//!    ZIPs, merge in detail pages
//! 4. **Output**: one JSON file per state plus a run summary

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod fetch;
mod models;
mod outputs;
mod scrapers;
mod utils;
mod zip_state;

use cli::{Cli, Command, ZipArgs};
use config::{AppConfig, load_config};
use fetch::{HttpFetcher, RetryFetch};
use models::CollectionRun;
use outputs::json;
use scrapers::potadvisor::PotAdvisorCrawler;
use scrapers::vendor::VendorScraper;
use utils::ensure_writable_dir;
use zip_state::observer::TracingObserver;
use zip_state::states::StateUrlMap;
use zip_state::{StateGroups, ZipCodeMapper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("dispensary_intake starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = load_config(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(db) = args.zip_database {
        config.zip_database = Some(db);
    }

    match args.command {
        Command::Classify(zips) => classify(&config, &zips).await?,
        Command::Collect { zips, base_url } => {
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            collect(&config, &zips).await?;
        }
        Command::Vendors { urls } => vendors(&config, &urls).await?,
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), millis = elapsed.subsec_millis(), "Execution complete");
    Ok(())
}

/// Read ZIP text from `--zips`, `--zip-file`, or stdin.
async fn read_zip_input(args: &ZipArgs) -> Result<String, Box<dyn Error>> {
    if let Some(zips) = &args.zips {
        return Ok(zips.clone());
    }
    if let Some(path) = &args.zip_file {
        return Ok(tokio::fs::read_to_string(path).await?);
    }
    info!("Reading ZIP codes from stdin");
    let mut buf = String::new();
    tokio::io::stdin().read_to_string(&mut buf).await?;
    Ok(buf)
}

fn build_mapper(config: &AppConfig) -> ZipCodeMapper {
    ZipCodeMapper::with_bundled(
        config.zip_database.as_deref(),
        &config.bundled_database,
        Arc::new(TracingObserver),
    )
}

/// Parse and group the ZIP input, then project the states onto URLs.
///
/// Returns `None` when no ZIP in the input is usable.
#[instrument(level = "info", skip_all)]
async fn classify_input(config: &AppConfig, zips: &ZipArgs) -> Result<Option<(StateGroups, StateUrlMap)>, Box<dyn Error>> {
    let raw = read_zip_input(zips).await?;
    if raw.trim().is_empty() {
        warn!("No input: please enter at least one ZIP code");
        return Ok(None);
    }

    let mapper = build_mapper(config);
    let groups = mapper.process_zip_codes(raw.as_str());
    if groups.is_empty() {
        warn!("No valid ZIP codes found. Please check your input.");
        return Ok(None);
    }

    info!(
        zips = groups.total_zips(),
        states = groups.len(),
        "Successfully processed ZIP codes"
    );
    for (state, zips) in groups.iter() {
        info!(%state, count = zips.len(), "State ZIP codes");
    }

    let urls = mapper.states_to_urls(groups.states(), &config.base_url);
    for (state, target) in &urls {
        info!(%state, url = %target.url, "Generated URL");
    }
    Ok(Some((groups, urls)))
}

#[instrument(level = "info", skip_all)]
async fn classify(config: &AppConfig, zips: &ZipArgs) -> Result<(), Box<dyn Error>> {
    let Some((groups, urls)) = classify_input(config, zips).await? else {
        return Ok(());
    };
    let report = serde_json::json!({ "state_groups": groups, "urls": urls });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn collect(config: &AppConfig, zips: &ZipArgs) -> Result<(), Box<dyn Error>> {
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let Some((groups, urls)) = classify_input(config, zips).await? else {
        return Ok(());
    };

    let fetcher = RetryFetch::new(
        HttpFetcher::new(&config.user_agent, config.request_timeout())?,
        config.max_retries,
        config.retry_base_delay(),
    );
    let crawler = PotAdvisorCrawler::new(fetcher, &config.output_dir, &config.base_url)?
        .with_detail_concurrency(config.detail_concurrency);

    info!(states = urls.len(), "Initiating data collection");
    let output_files = crawler.crawl_and_save(&urls, &groups).await;

    for (state, path) in &output_files {
        info!(%state, path = %path.display(), "Results saved");
    }
    let missing: Vec<&str> = urls
        .keys()
        .filter(|s| !output_files.contains_key(*s))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        warn!(states = %missing.join(", "), "No output for some states");
    }

    let now = Local::now();
    let run = CollectionRun {
        local_date: now.date_naive().to_string(),
        local_time: now.time().format("%H:%M:%S").to_string(),
        state_groups: groups,
        urls,
        output_files: output_files
            .into_iter()
            .map(|(state, path)| (state, path.display().to_string()))
            .collect(),
    };
    if let Err(e) = json::write_run_summary(crawler.output_dir(), &run).await {
        error!(error = %e, "Failed to write run summary");
    }

    info!(saved = run.output_files.len(), "Data collection complete");
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn vendors(config: &AppConfig, urls: &[String]) -> Result<(), Box<dyn Error>> {
    ensure_writable_dir(&config.output_dir).await?;

    let fetcher = RetryFetch::new(
        HttpFetcher::new(&config.user_agent, config.request_timeout())?,
        config.max_retries,
        config.retry_base_delay(),
    );
    let scraper = VendorScraper::new(fetcher)?;
    let vendors = scraper.collect_batch_vendor_data(urls).await;
    if vendors.is_empty() {
        warn!("No vendor data collected");
        return Ok(());
    }

    let path = json::write_vendor_data(&config.output_dir, &vendors).await?;
    info!(path = %path.display(), count = vendors.len(), "Data collected and saved");
    Ok(())
}
