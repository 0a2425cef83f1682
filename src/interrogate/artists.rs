//! Artist database (`artist,score,category` CSV).

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// One row of the artist database.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Artist {
    /// Artist name.
    #[serde(rename = "artist")]
    pub name: String,
    /// Popularity score.
    #[serde(default)]
    pub score: f32,
    /// Free-form category (e.g., "scribbles", "digipa-high-impact").
    #[serde(default)]
    pub category: String,
}

/// Read the artist database.
///
/// A missing file yields an empty list.
pub fn load_artists(path: &Path) -> Result<Vec<Artist>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path).map_err(|e| Error::ArtistsRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let artists = reader
        .deserialize()
        .collect::<std::result::Result<Vec<Artist>, _>>()
        .map_err(|e| Error::ArtistsRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    info!("Loaded {} artists from {}", artists.len(), path.display());
    Ok(artists)
}
