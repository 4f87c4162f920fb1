//! ZIP code classification.
//!
//! [`ZipCodeMapper`] owns a read-only ZIP → state table and answers three
//! questions about user input:
//!
//! - is this string a plausible ZIP code ([`ZipCodeMapper::validate_zip_code`])
//! - which state does it belong to ([`ZipCodeMapper::get_state_for_zip`])
//! - how do the ZIPs in this blob of text group by state
//!   ([`ZipCodeMapper::process_zip_codes`])
//!
//! The table is loaded once from the first [`ZipSource`] that succeeds; see
//! [`sources`] for the chain. Validation is deliberately lenient: a
//! well-formed ZIP that is missing from the table still validates, and is
//! then dropped by `process_zip_codes` because no state resolves for it.

pub mod observer;
pub mod sources;
pub mod states;

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

use observer::{RejectReason, ZipEvent, ZipObserver};
use sources::{FallbackRanges, ZipDatabase, ZipSource};
use states::StateUrlMap;

static ZIP_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9]{5}(?:-[0-9]{4})?\b").expect("ZIP regex should be valid"));
static ZIP_EXACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{5}(?:-[0-9]{4})?$").expect("ZIP regex should be valid"));
static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;\s]+").expect("separator regex should be valid"));

/// Raw ZIP input: free-form text, or a list the caller already split.
#[derive(Debug, Clone)]
pub enum ZipInput<'a> {
    Text(&'a str),
    List(Vec<&'a str>),
}

impl<'a> From<&'a str> for ZipInput<'a> {
    fn from(s: &'a str) -> Self {
        ZipInput::Text(s)
    }
}

impl<'a> From<&'a String> for ZipInput<'a> {
    fn from(s: &'a String) -> Self {
        ZipInput::Text(s.as_str())
    }
}

impl<'a, S: AsRef<str>> From<&'a [S]> for ZipInput<'a> {
    fn from(list: &'a [S]) -> Self {
        ZipInput::List(list.iter().map(AsRef::as_ref).collect())
    }
}

impl<'a, S: AsRef<str>> From<&'a Vec<S>> for ZipInput<'a> {
    fn from(list: &'a Vec<S>) -> Self {
        ZipInput::from(list.as_slice())
    }
}

impl<'a, S: AsRef<str>, const N: usize> From<&'a [S; N]> for ZipInput<'a> {
    fn from(list: &'a [S; N]) -> Self {
        ZipInput::from(list.as_slice())
    }
}

/// State code → ZIPs in that state, both in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateGroups {
    groups: Vec<(String, Vec<String>)>,
}

impl StateGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `zip` to `state`'s sequence, creating it on first sight.
    pub fn push(&mut self, state: &str, zip: &str) {
        match self.groups.iter_mut().find(|(s, _)| s == state) {
            Some((_, zips)) => zips.push(zip.to_string()),
            None => self.groups.push((state.to_string(), vec![zip.to_string()])),
        }
    }

    pub fn get(&self, state: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(s, _)| s == state)
            .map(|(_, zips)| zips.as_slice())
    }

    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(s, _)| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups.iter().map(|(s, z)| (s.as_str(), z.as_slice()))
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of ZIPs across every state.
    pub fn total_zips(&self) -> usize {
        self.groups.iter().map(|(_, z)| z.len()).sum()
    }
}

impl serde::Serialize for StateGroups {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (state, zips) in &self.groups {
            map.serialize_entry(state, zips)?;
        }
        map.end()
    }
}

/// ZIP → state classifier over a table loaded once at construction.
pub struct ZipCodeMapper {
    db: ZipDatabase,
    observer: Arc<dyn ZipObserver>,
}

impl std::fmt::Debug for ZipCodeMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipCodeMapper")
            .field("source", self.db.source())
            .field("entries", &self.db.len())
            .finish()
    }
}

impl ZipCodeMapper {
    /// Load from `custom` if it exists, else the database at `bundled`, else
    /// the synthesized ranges.
    pub fn with_bundled(custom: Option<&Path>, bundled: &Path, observer: Arc<dyn ZipObserver>) -> Self {
        Self::from_sources(sources::default_sources(custom, bundled), observer)
    }

    /// Try `sources` in order and keep the first that loads. If none do, the
    /// synthesized range table is used.
    pub fn from_sources(sources: Vec<Box<dyn ZipSource>>, observer: Arc<dyn ZipObserver>) -> Self {
        let mut loaded = None;
        for source in &sources {
            match source.load() {
                Ok(db) => {
                    loaded = Some(db);
                    break;
                }
                Err(e) => observer.notify(&ZipEvent::SourceFailed {
                    source: source.describe(),
                    error: e.to_string(),
                }),
            }
        }
        let db = loaded.unwrap_or_else(|| FallbackRanges.build());
        observer.notify(&ZipEvent::DatabaseLoaded {
            source: db.source().to_string(),
            entries: db.len(),
        });
        Self { db, observer }
    }

    /// Wrap an already-built table.
    #[cfg(test)]
    pub fn from_database(db: ZipDatabase, observer: Arc<dyn ZipObserver>) -> Self {
        Self { db, observer }
    }

    #[cfg(test)]
    pub fn database(&self) -> &ZipDatabase {
        &self.db
    }

    /// `NNNNN` or `NNNNN-NNNN`, whose base is in the table or in 1..=99999.
    pub fn validate_zip_code(&self, zip_code: &str) -> bool {
        if !ZIP_EXACT.is_match(zip_code) {
            return false;
        }
        let base = &zip_code[..5];
        self.db.contains(base) || is_in_valid_range(base)
    }

    /// State for a ZIP, ignoring any `-NNNN` suffix.
    pub fn get_state_for_zip(&self, zip_code: &str) -> Option<&str> {
        let base = zip_code.split('-').next().unwrap_or(zip_code);
        self.db.get(base)
    }

    /// Extract ZIPs from `input` and group the valid ones by state.
    ///
    /// Text input is scanned for whole-word `NNNNN[-NNNN]` matches; if there
    /// are none, it is split on commas, semicolons and whitespace and the
    /// all-digit tokens are used instead. Rejected candidates are reported to
    /// the observer individually and in one summary. Duplicates are kept.
    pub fn process_zip_codes<'a>(&self, input: impl Into<ZipInput<'a>>) -> StateGroups {
        let candidates = extract_candidates(input.into());

        let mut groups = StateGroups::new();
        let mut rejected: Vec<String> = Vec::new();

        for zip in candidates {
            if !self.validate_zip_code(zip) {
                self.reject(zip, RejectReason::InvalidFormat, &mut rejected);
                continue;
            }
            match self.get_state_for_zip(zip) {
                Some(state) => groups.push(state, zip),
                None => self.reject(zip, RejectReason::UnknownState, &mut rejected),
            }
        }

        if !rejected.is_empty() {
            self.observer.notify(&ZipEvent::Unprocessed { zips: rejected });
        }
        groups
    }

    /// Directory pages for `states` rooted at `base_url`.
    pub fn states_to_urls<I, S>(&self, states: I, base_url: &str) -> StateUrlMap
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        states::states_to_urls(states, base_url, self.observer.as_ref())
    }

    fn reject(&self, zip: &str, reason: RejectReason, rejected: &mut Vec<String>) {
        self.observer.notify(&ZipEvent::Rejected { zip: zip.to_string(), reason });
        rejected.push(zip.to_string());
    }
}

fn extract_candidates(input: ZipInput<'_>) -> Vec<&str> {
    match input {
        ZipInput::List(list) => list,
        ZipInput::Text(text) => {
            let found: Vec<&str> = ZIP_IN_TEXT.find_iter(text).map(|m| m.as_str()).collect();
            if !found.is_empty() {
                return found;
            }
            SEPARATORS
                .split(text)
                .map(str::trim)
                .filter(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
                .collect()
        }
    }
}

fn is_in_valid_range(base: &str) -> bool {
    match base.parse::<u32>() {
        Ok(n) => n > 0 && n < 100_000,
        Err(_) => false,
    }
}
