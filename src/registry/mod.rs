//! Model artifacts: status listing, download and verification.

#![allow(clippy::print_stdout)]

pub mod installer;

pub use installer::{
    download_file, ensure_artifact, fetch_artifact, remove_oversized, sha256_file,
    verify_checksum,
};

use crate::config::{Config, Precision};
use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Presence of one configured artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStatus {
    /// Short artifact name (e.g., "blip.vision").
    pub name: &'static str,
    /// Resolved path for the configured precision.
    pub path: PathBuf,
    /// Whether the file exists.
    pub present: bool,
    /// File size in bytes when present.
    pub size: Option<u64>,
    /// Whether a download URL is configured.
    pub downloadable: bool,
}

/// Status of every configured artifact.
pub fn artifact_statuses(config: &Config, models_dir: &Path) -> Vec<ArtifactStatus> {
    let precision = config.runtime.precision;
    config
        .models
        .artifacts()
        .into_iter()
        .map(|(name, artifact)| {
            let path = artifact.resolve(models_dir, precision);
            let size = std::fs::metadata(&path)
                .ok()
                .filter(std::fs::Metadata::is_file)
                .map(|m| m.len());
            ArtifactStatus {
                name,
                present: size.is_some(),
                size,
                downloadable: artifact.url.is_some(),
                path,
            }
        })
        .collect()
}

/// Print the artifact table.
pub fn list_artifacts(statuses: &[ArtifactStatus], models_dir: &Path) {
    println!("Models directory: {}", models_dir.display());
    println!();
    for status in statuses {
        let state = match (status.present, status.downloadable) {
            (true, _) => "present",
            (false, true) => "missing (downloadable)",
            (false, false) => "missing",
        };
        println!("  {:<16} {:<24} {}", status.name, state, status.path.display());
    }
}

/// Download every missing artifact that has a URL. Returns how many were fetched.
pub fn fetch_missing(config: &Config, models_dir: &Path, progress: bool) -> Result<usize> {
    let mut fetched = 0;
    for (name, artifact) in config.models.artifacts() {
        let path = artifact.resolve(models_dir, Precision::Full);
        if path.is_file() {
            continue;
        }
        if artifact.url.is_none() {
            warn!("{name}: missing and no download URL configured");
            continue;
        }
        fetch_artifact(name, artifact, models_dir, progress)?;
        fetched += 1;
    }
    info!("Fetched {fetched} artifact(s)");
    Ok(fetched)
}

/// Verify present artifacts against configured checksums.
///
/// Returns `(name, result)` for each artifact that has a checksum and exists.
pub fn check_checksums(config: &Config, models_dir: &Path) -> Vec<(&'static str, Result<()>)> {
    config
        .models
        .artifacts()
        .into_iter()
        .filter_map(|(name, artifact)| {
            let expected = artifact.sha256.as_deref()?;
            let path = artifact.resolve(models_dir, Precision::Full);
            path.is_file()
                .then(|| (name, verify_checksum(&path, expected)))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_statuses_reports_presence() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("blip")).unwrap();
        std::fs::write(tmp.path().join("blip/tokenizer.json"), b"{}").unwrap();

        let statuses = artifact_statuses(&Config::default(), tmp.path());
        assert_eq!(statuses.len(), 9);

        let tokenizer = statuses.iter().find(|s| s.name == "blip.tokenizer").unwrap();
        assert!(tokenizer.present);
        assert_eq!(tokenizer.size, Some(2));

        let yaml = statuses.iter().find(|s| s.name == "ldsr.config").unwrap();
        assert!(!yaml.present);
        assert!(yaml.downloadable);
    }

    #[test]
    fn test_check_checksums_only_covers_configured() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("clip")).unwrap();
        std::fs::write(tmp.path().join("clip/tokenizer.json"), b"abc").unwrap();

        let mut config = Config::default();
        config.models.clip.tokenizer.sha256 =
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".to_string());

        let results = check_checksums(&config, tmp.path());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "clip.tokenizer");
        assert!(results[0].1.is_ok());
    }
}
