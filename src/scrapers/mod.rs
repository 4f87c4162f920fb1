//! Page scrapers.
//!
//! | Module | Source | Output |
//! |--------|--------|--------|
//! | [`potadvisor`] | State directory listing + detail pages | `Vec<Dispensary>` per state |
//! | [`vendor`] | A vendor's own website | `VendorData` |
//!
//! Both fetch through [`crate::fetch::PageFetcher`] so tests can serve
//! pages from memory, and both log and skip pages that fail rather than
//! aborting the batch. [`schema`] holds the declarative selector schemas
//! the directory crawler runs.

pub mod potadvisor;
pub mod schema;
pub mod vendor;
