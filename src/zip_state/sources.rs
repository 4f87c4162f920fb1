//! ZIP database loader strategies.
//!
//! A [`ZipDatabase`] comes from exactly one [`ZipSource`]. The classifier
//! tries its sources in order and keeps the first one that loads; the
//! synthesized [`FallbackRanges`] table always loads, so the chain as a
//! whole cannot fail.
//!
//! CSV sources accept several spellings for each logical column. The
//! aliases are resolved against the header row once per file, then each row
//! takes the first non-empty aliased column.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Accepted header names for the ZIP column, in priority order.
pub const ZIP_COLUMN_ALIASES: &[&str] = &["zip_code", "zipcode", "ZIP"];
/// Accepted header names for the state column, in priority order.
pub const STATE_COLUMN_ALIASES: &[&str] = &["state", "STATE", "state_abbr"];

/// Default location of the bundled reference database.
pub const DEFAULT_BUNDLED_DATABASE: &str = "data/zip_code_database.csv";

/// Numeric ZIP ranges for the synthesized fallback table (inclusive).
pub const FALLBACK_STATE_RANGES: &[(&str, u32, u32)] = &[
    ("AL", 35000, 36999),
    ("AK", 99500, 99999),
    ("AZ", 85000, 86999),
    ("AR", 71600, 72999),
    ("WA", 98000, 99499),
    ("OR", 97000, 97999),
    ("CA", 90000, 96199),
    ("CO", 80000, 81699),
    ("NV", 88900, 89899),
    ("MI", 48000, 49999),
    ("IL", 60000, 62999),
    ("MA", 1000, 2799),
];

/// Where the active table came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    Custom(PathBuf),
    Bundled(PathBuf),
    FallbackRanges,
}

impl fmt::Display for DatabaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseSource::Custom(p) => write!(f, "custom file {}", p.display()),
            DatabaseSource::Bundled(p) => write!(f, "bundled file {}", p.display()),
            DatabaseSource::FallbackRanges => write!(f, "synthesized fallback ranges"),
        }
    }
}

/// ZIP base → two-letter state abbreviation. Read-only once built.
#[derive(Debug, Clone)]
pub struct ZipDatabase {
    entries: HashMap<String, String>,
    source: DatabaseSource,
}

impl ZipDatabase {
    pub fn new(entries: HashMap<String, String>, source: DatabaseSource) -> Self {
        Self { entries, source }
    }

    pub fn get(&self, zip_base: &str) -> Option<&str> {
        self.entries.get(zip_base).map(String::as_str)
    }

    pub fn contains(&self, zip_base: &str) -> bool {
        self.entries.contains_key(zip_base)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn source(&self) -> &DatabaseSource {
        &self.source
    }
}

/// Why a loader strategy gave up.
#[derive(Debug)]
pub enum LoadError {
    /// The strategy has nothing to load from (no path given).
    NotConfigured,
    NotFound(PathBuf),
    Io(io::Error),
    Csv(csv::Error),
    /// The header row has none of the aliases for this field.
    MissingColumn(&'static str),
    /// The file parsed but produced no usable rows.
    Empty,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotConfigured => write!(f, "no path configured"),
            LoadError::NotFound(p) => write!(f, "file not found: {}", p.display()),
            LoadError::Io(e) => write!(f, "io error: {}", e),
            LoadError::Csv(e) => write!(f, "csv error: {}", e),
            LoadError::MissingColumn(field) => write!(f, "no {} column in header", field),
            LoadError::Empty => write!(f, "no usable rows"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            LoadError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        LoadError::Csv(e)
    }
}

/// One way of producing a [`ZipDatabase`].
pub trait ZipSource {
    /// Short label used in load events.
    fn describe(&self) -> String;
    fn load(&self) -> Result<ZipDatabase, LoadError>;
}

/// A caller-supplied CSV file. Fails when no path was given or the file is missing.
#[derive(Debug, Clone)]
pub struct CustomFile {
    pub path: Option<PathBuf>,
}

impl ZipSource for CustomFile {
    fn describe(&self) -> String {
        match &self.path {
            Some(p) => format!("custom file {}", p.display()),
            None => "custom file (none)".to_string(),
        }
    }

    fn load(&self) -> Result<ZipDatabase, LoadError> {
        let path = self.path.as_ref().ok_or(LoadError::NotConfigured)?;
        if !path.exists() {
            return Err(LoadError::NotFound(path.clone()));
        }
        let entries = load_csv_file(path)?;
        Ok(ZipDatabase::new(entries, DatabaseSource::Custom(path.clone())))
    }
}

/// The reference CSV shipped next to the binary.
///
/// When the file is absent its parent directory is created so a database
/// can be dropped in later.
#[derive(Debug, Clone)]
pub struct BundledFile {
    pub path: PathBuf,
}

impl Default for BundledFile {
    fn default() -> Self {
        Self { path: PathBuf::from(DEFAULT_BUNDLED_DATABASE) }
    }
}

impl ZipSource for BundledFile {
    fn describe(&self) -> String {
        format!("bundled file {}", self.path.display())
    }

    fn load(&self) -> Result<ZipDatabase, LoadError> {
        if !self.path.exists() {
            if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            return Err(LoadError::NotFound(self.path.clone()));
        }
        let entries = load_csv_file(&self.path)?;
        Ok(ZipDatabase::new(entries, DatabaseSource::Bundled(self.path.clone())))
    }
}

/// Table synthesized from [`FALLBACK_STATE_RANGES`]. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackRanges;

impl FallbackRanges {
    pub fn build(&self) -> ZipDatabase {
        let mut entries = HashMap::new();
        for &(state, start, end) in FALLBACK_STATE_RANGES {
            for zip in start..=end {
                entries.insert(format!("{:05}", zip), state.to_string());
            }
        }
        ZipDatabase::new(entries, DatabaseSource::FallbackRanges)
    }
}

impl ZipSource for FallbackRanges {
    fn describe(&self) -> String {
        "synthesized fallback ranges".to_string()
    }

    fn load(&self) -> Result<ZipDatabase, LoadError> {
        Ok(self.build())
    }
}

/// The standard chain: custom path, bundled path, synthesized ranges.
pub fn default_sources(custom: Option<&Path>, bundled: &Path) -> Vec<Box<dyn ZipSource>> {
    vec![
        Box::new(CustomFile { path: custom.map(Path::to_path_buf) }),
        Box::new(BundledFile { path: bundled.to_path_buf() }),
        Box::new(FallbackRanges),
    ]
}

fn load_csv_file(path: &Path) -> Result<HashMap<String, String>, LoadError> {
    let file = File::open(path)?;
    parse_zip_csv(file)
}

/// Parse a ZIP/state CSV from any reader.
pub fn parse_zip_csv<R: Read>(reader: R) -> Result<HashMap<String, String>, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let zip_cols = resolve_columns(&headers, ZIP_COLUMN_ALIASES);
    let state_cols = resolve_columns(&headers, STATE_COLUMN_ALIASES);
    if zip_cols.is_empty() {
        return Err(LoadError::MissingColumn("zip"));
    }
    if state_cols.is_empty() {
        return Err(LoadError::MissingColumn("state"));
    }

    let mut entries = HashMap::new();
    for record in rdr.records() {
        let record = record?;
        let (Some(zip), Some(state)) = (
            first_non_empty(&record, &zip_cols),
            first_non_empty(&record, &state_cols),
        ) else {
            continue;
        };
        let Some(zip) = normalize_zip_base(zip) else {
            continue;
        };
        entries.insert(zip, state.to_ascii_uppercase());
    }

    if entries.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(entries)
}

/// Header positions for `aliases`, in alias priority order.
fn resolve_columns(headers: &StringRecord, aliases: &[&str]) -> Vec<usize> {
    aliases
        .iter()
        .filter_map(|alias| headers.iter().position(|h| h == *alias))
        .collect()
}

fn first_non_empty<'r>(record: &'r StringRecord, cols: &[usize]) -> Option<&'r str> {
    cols.iter()
        .filter_map(|&i| record.get(i))
        .find(|v| !v.is_empty())
}

/// Numeric bases shorter than five digits lost their leading zeros somewhere
/// upstream (spreadsheets do this); pad them back.
fn normalize_zip_base(raw: &str) -> Option<String> {
    let base = raw.split('-').next().unwrap_or(raw).trim();
    if base.is_empty() || !base.bytes().all(|b| b.is_ascii_digit()) || base.len() > 5 {
        return None;
    }
    Some(format!("{:0>5}", base))
}
