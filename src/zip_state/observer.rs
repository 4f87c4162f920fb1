//! Event sink for the ZIP classifier.
//!
//! The classifier never talks to the global logger directly. Everything it
//! wants to report (a database source that failed to load, a rejected ZIP,
//! a state with no directory page) is handed to a [`ZipObserver`]. The
//! default [`TracingObserver`] forwards events to `tracing`; tests use
//! `RecordingObserver` to assert on what was reported.

#[cfg(test)]
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Why a ZIP candidate was dropped from a grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Not `NNNNN` or `NNNNN-NNNN`, or outside the numeric ZIP range.
    InvalidFormat,
    /// Well-formed, but the loaded database has no state for it.
    UnknownState,
}

/// Something the classifier wants the outside world to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZipEvent {
    /// A loader strategy failed and the next one will be tried.
    SourceFailed { source: String, error: String },
    /// A loader strategy succeeded and its table is now in use.
    DatabaseLoaded { source: String, entries: usize },
    /// A single ZIP candidate was rejected.
    Rejected { zip: String, reason: RejectReason },
    /// Summary of every rejected candidate from one `process_zip_codes` call.
    Unprocessed { zips: Vec<String> },
    /// A state code with no entry in the state name table.
    UnknownStateCode { state: String },
}

/// Receives classifier events.
pub trait ZipObserver: Send + Sync {
    fn notify(&self, event: &ZipEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ZipObserver for TracingObserver {
    fn notify(&self, event: &ZipEvent) {
        match event {
            ZipEvent::SourceFailed { source, error } => {
                error!(%source, %error, "Error loading ZIP code database; trying next source");
            }
            ZipEvent::DatabaseLoaded { source, entries } => {
                info!(%source, entries, "Loaded ZIP code database");
            }
            ZipEvent::Rejected { zip, reason } => match reason {
                RejectReason::InvalidFormat => warn!(%zip, "Invalid ZIP code format"),
                RejectReason::UnknownState => {
                    warn!(%zip, "Could not determine state for ZIP code")
                }
            },
            ZipEvent::Unprocessed { zips } => {
                warn!(count = zips.len(), zips = %zips.join(", "), "Unprocessed ZIP codes");
            }
            ZipEvent::UnknownStateCode { state } => {
                warn!(%state, "No URL mapping available for state");
            }
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ZipEvent>>,
}

#[cfg(test)]
impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<ZipEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
impl ZipObserver for RecordingObserver {
    fn notify(&self, event: &ZipEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
