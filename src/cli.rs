//! Command-line interface definitions.
//!
//! Global options can also come from the environment; per-command options
//! override the YAML config file.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # See how ZIPs group by state, no network
/// dispensary_intake classify --zips "99501, 98101, 97201"
///
/// # Crawl the directory for those ZIPs
/// dispensary_intake collect --zip-file zips.txt -o output/normalized
///
/// # Scrape vendor sites directly
/// dispensary_intake vendors https://example-dispensary.com
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true, env = "DISPENSARY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output directory for JSON files
    #[arg(short, long, global = true, env = "DISPENSARY_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// ZIP code database CSV (falls back to the bundled database)
    #[arg(long, global = true, env = "ZIP_DATABASE")]
    pub zip_database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Group ZIP codes by state and print the directory URLs
    Classify(ZipArgs),
    /// Group ZIP codes by state, crawl each state, and write JSON
    Collect {
        #[command(flatten)]
        zips: ZipArgs,

        /// Root of the dispensary directory site
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Scrape vendor websites and write vendor_data.json
    Vendors {
        /// Vendor page URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

/// Where ZIP codes come from. With neither flag, stdin is read.
#[derive(Args, Debug, Clone)]
pub struct ZipArgs {
    /// ZIP codes separated by commas, spaces, or new lines
    #[arg(short, long, conflicts_with = "zip_file")]
    pub zips: Option<String>,

    /// File containing ZIP codes
    #[arg(long)]
    pub zip_file: Option<PathBuf>,
}
