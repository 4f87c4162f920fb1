//! JSON output.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── alaska_dispensaries.json
//! ├── washington_dispensaries.json
//! ├── run_summary.json
//! └── vendor_data.json
//! ```
//!
//! Files are pretty-printed and written whole; a rerun overwrites them.

use crate::models::{CollectionRun, Dispensary, VendorData};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of a state's output file.
pub fn state_output_path(output_dir: &Path, state_name: &str) -> PathBuf {
    output_dir.join(format!("{}_dispensaries.json", state_name.to_lowercase()))
}

/// Write one state's dispensaries to `{output_dir}/{state_name}_dispensaries.json`.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), %state_name))]
pub async fn write_state_dispensaries(
    output_dir: &Path,
    state_name: &str,
    dispensaries: &[Dispensary],
) -> Result<PathBuf, Box<dyn Error>> {
    let path = state_output_path(output_dir, state_name);
    write_pretty(output_dir, &path, &dispensaries).await?;
    info!(path = %path.display(), count = dispensaries.len(), "Saved dispensaries");
    Ok(path)
}

/// Write normalized vendor records to `{output_dir}/vendor_data.json`.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_vendor_data(output_dir: &Path, vendors: &[VendorData]) -> Result<PathBuf, Box<dyn Error>> {
    let path = output_dir.join("vendor_data.json");
    write_pretty(output_dir, &path, &vendors).await?;
    info!(path = %path.display(), count = vendors.len(), "Saved vendor data");
    Ok(path)
}

/// Write the summary of a collection run to `{output_dir}/run_summary.json`.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_run_summary(output_dir: &Path, run: &CollectionRun) -> Result<PathBuf, Box<dyn Error>> {
    let path = output_dir.join("run_summary.json");
    write_pretty(output_dir, &path, run).await?;
    info!(path = %path.display(), "Wrote run summary");
    Ok(path)
}

async fn write_pretty<T: Serialize + ?Sized>(dir: &Path, path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;

    if let Err(e) = fs::create_dir_all(dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create output dir");
        return Err(e.into());
    }
    fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip_state::StateGroups;
    use crate::zip_state::states::StateUrlMap;
    use std::collections::BTreeMap;

    fn tmp_dir(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("dispensary_intake_json_{}", name));
        let _ = std::fs::remove_dir_all(&p);
        p
    }

    #[test]
    fn test_state_output_path() {
        let p = state_output_path(Path::new("output/normalized"), "New-Hampshire");
        assert_eq!(p, Path::new("output/normalized/new-hampshire_dispensaries.json"));
    }

    #[tokio::test]
    async fn test_write_state_dispensaries_keeps_unicode() {
        let dir = tmp_dir("state");
        let records = vec![Dispensary {
            name: "Café Kush".into(),
            address: "1 Main St, Anchorage, AK 99501".into(),
            zip_code: Some("99501".into()),
            ..Default::default()
        }];
        let path = write_state_dispensaries(&dir, "alaska", &records).await.unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("Café Kush"));
        assert!(body.contains("\n  {"));
        let back: Vec<Dispensary> = serde_json::from_str(&body).unwrap();
        assert_eq!(back, records);
    }

    #[tokio::test]
    async fn test_write_vendor_data_and_summary() {
        let dir = tmp_dir("vendor");
        let path = write_vendor_data(&dir, &[VendorData::default()]).await.unwrap();
        assert!(path.ends_with("vendor_data.json"));

        let mut groups = StateGroups::new();
        groups.push("AK", "99501");
        let run = CollectionRun {
            local_date: "2026-10-16".into(),
            local_time: "12:00:00".into(),
            state_groups: groups,
            urls: StateUrlMap::new(),
            output_files: BTreeMap::new(),
        };
        let path = write_run_summary(&dir, &run).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(v["state_groups"]["AK"][0], "99501");
    }
}
