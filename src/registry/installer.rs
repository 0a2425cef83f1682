//! Artifact download and verification.

use crate::config::{ArtifactConfig, Precision};
use crate::error::{Error, Result};
use crate::output::progress::create_download_progress;
use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Download a file with an optional progress bar.
///
/// Data is streamed to `<dest>.part` and renamed once complete.
pub async fn download_file(client: &Client, url: &str, dest: &Path, progress: bool) -> Result<()> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::DownloadFailed {
            url: url.to_string(),
            source: Box::new(e),
        })?;

    if !response.status().is_success() {
        return Err(Error::DownloadFailed {
            url: url.to_string(),
            source: format!("HTTP {}", response.status()).into(),
        });
    }

    let pb = create_download_progress(response.content_length(), progress);
    if let Some(pb) = &pb {
        // Use to_string_lossy() to handle non-UTF-8 filenames gracefully
        pb.set_message(format!(
            "Downloading {}...",
            dest.file_name().map_or_else(
                || std::borrow::Cow::Borrowed("file"),
                |n| n.to_string_lossy()
            )
        ));
    }

    let mut partial = dest.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);
    let mut file = File::create(&partial).await.map_err(Error::Io)?;
    let mut stream = response.bytes_stream();
    let mut downloaded = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::DownloadFailed {
            url: url.to_string(),
            source: Box::new(e),
        })?;

        file.write_all(&chunk).await.map_err(Error::Io)?;

        downloaded += chunk.len() as u64;
        if let Some(pb) = &pb {
            pb.set_position(downloaded);
        }
    }
    file.flush().await.map_err(Error::Io)?;
    drop(file);

    tokio::fs::rename(&partial, dest).await.map_err(Error::Io)?;
    if let Some(pb) = pb {
        pb.finish_with_message("Download complete");
    }
    info!("Downloaded {} ({downloaded} bytes)", dest.display());
    Ok(())
}

/// Lowercase hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1 << 16];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Compare a file against an expected SHA-256 (case-insensitive).
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Delete `path` if it is at least `limit` bytes. Returns whether it was removed.
pub fn remove_oversized(path: &Path, limit: u64) -> Result<bool> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() >= limit => {
            warn!(
                "Removing invalid file {} ({} bytes)",
                path.display(),
                meta.len()
            );
            std::fs::remove_file(path)?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Io(e)),
    }
}

fn http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(std::time::Duration::from_secs(30))
        .timeout(std::time::Duration::from_secs(3600))
        .build()
        .map_err(|e| Error::Internal {
            message: format!("Failed to create HTTP client: {e}"),
        })
}

/// Download one artifact to its full precision path and verify it.
pub fn fetch_artifact(
    name: &str,
    artifact: &ArtifactConfig,
    models_dir: &Path,
    progress: bool,
) -> Result<PathBuf> {
    let dest = artifact.resolve(models_dir, Precision::Full);
    let Some(url) = artifact.url.as_deref() else {
        return Err(Error::ModelFileNotFound { path: dest });
    };

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(Error::Io)?;
    }
    info!("Fetching {name} from {url}");

    let client = http_client()?;
    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("Failed to create async runtime: {e}"),
    })?;
    runtime.block_on(async { download_file(&client, url, &dest, progress).await })?;

    if let Some(expected) = artifact.sha256.as_deref()
        && let Err(e) = verify_checksum(&dest, expected)
    {
        std::fs::remove_file(&dest)?;
        return Err(e);
    }
    Ok(dest)
}

/// Path of an artifact, downloading it when missing and a URL is configured.
///
/// A missing half precision variant falls back to the full precision file.
pub fn ensure_artifact(
    name: &str,
    artifact: &ArtifactConfig,
    models_dir: &Path,
    precision: Precision,
    progress: bool,
) -> Result<PathBuf> {
    let preferred = artifact.resolve(models_dir, precision);
    if preferred.is_file() {
        return Ok(preferred);
    }

    let full = artifact.resolve(models_dir, Precision::Full);
    if full != preferred && full.is_file() {
        warn!(
            "{name}: {} not found, using full precision file",
            preferred.display()
        );
        return Ok(full);
    }

    fetch_artifact(name, artifact, models_dir, progress)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_file_known_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert!(
            verify_checksum(
                &path,
                "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
            )
            .is_ok()
        );
        assert!(matches!(
            verify_checksum(&path, "00"),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_remove_oversized() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("project.yaml");
        std::fs::write(&path, vec![b'x'; 64]).unwrap();

        assert!(!remove_oversized(&path, 65).unwrap());
        assert!(path.exists());
        assert!(remove_oversized(&path, 64).unwrap());
        assert!(!path.exists());
        assert!(!remove_oversized(&path, 64).unwrap());
    }

    #[test]
    fn test_ensure_artifact_existing_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("ldsr")).unwrap();
        std::fs::write(tmp.path().join("ldsr/unet.onnx"), b"graph").unwrap();
        let artifact = ArtifactConfig::local("ldsr/unet.onnx");

        let path = ensure_artifact("ldsr.unet", &artifact, tmp.path(), Precision::Full, false)
            .unwrap();
        assert_eq!(path, tmp.path().join("ldsr/unet.onnx"));
    }

    #[test]
    fn test_ensure_artifact_half_falls_back_to_full() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("unet.onnx"), b"graph").unwrap();
        let artifact = ArtifactConfig {
            half_path: Some("unet.fp16.onnx".into()),
            ..ArtifactConfig::local("unet.onnx")
        };

        let path =
            ensure_artifact("ldsr.unet", &artifact, tmp.path(), Precision::Half, false).unwrap();
        assert_eq!(path, tmp.path().join("unet.onnx"));
    }

    #[test]
    fn test_ensure_artifact_missing_half_and_full_without_url() {
        let tmp = TempDir::new().unwrap();
        let artifact = ArtifactConfig {
            half_path: Some("unet.fp16.onnx".into()),
            ..ArtifactConfig::local("unet.onnx")
        };

        let result = ensure_artifact("ldsr.unet", &artifact, tmp.path(), Precision::Half, false);
        assert!(matches!(result, Err(Error::ModelFileNotFound { .. })));
    }

    #[test]
    fn test_ensure_artifact_missing_without_url() {
        let tmp = TempDir::new().unwrap();
        let artifact = ArtifactConfig::local("missing.onnx");
        let result = ensure_artifact("missing", &artifact, tmp.path(), Precision::Full, false);
        assert!(matches!(result, Err(Error::ModelFileNotFound { .. })));
    }
}
