//! Output writers.
//!
//! - [`json`]: per-state dispensary files, vendor data, and the run summary

pub mod json;
