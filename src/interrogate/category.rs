//! Label category files.

use crate::constants::interrogate::DEFAULT_TOPN;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// A named list of candidate labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// File name the category was loaded from.
    pub name: String,
    /// How many labels to keep from this category.
    pub topn: usize,
    /// Candidate labels.
    pub items: Vec<String>,
}

/// Extract `N` from the first `.topN.` marker in a file name.
///
/// Returns the default of 1 when no marker is present.
pub fn parse_topn(filename: &str) -> usize {
    for (start, _) in filename.match_indices(".top") {
        let rest = &filename[start + 4..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0
            && rest[digits..].starts_with('.')
            && let Ok(n) = rest[..digits].parse()
        {
            return n;
        }
    }
    DEFAULT_TOPN
}

/// Read one category file.
///
/// # File Format
/// - One label per line
/// - Surrounding whitespace is trimmed
/// - Blank lines are ignored
pub fn read_category(path: &Path) -> Result<Category> {
    let file = File::open(path).map_err(|e| Error::CategoryRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut items = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| Error::CategoryRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            items.push(trimmed.to_string());
        }
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let topn = parse_topn(&name);
    debug!("Category {name}: {} labels, top {topn}", items.len());

    Ok(Category { name, topn, items })
}

/// Load every category file in a directory, ordered by file name.
///
/// A missing directory yields no categories.
pub fn load_categories(dir: &Path) -> Result<Vec<Category>> {
    if !dir.is_dir() {
        debug!("Categories directory {} not found", dir.display());
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let categories = paths
        .iter()
        .map(|p| read_category(p))
        .collect::<Result<Vec<_>>>()?;
    info!(
        "Loaded {} categories from {}",
        categories.len(),
        dir.display()
    );
    Ok(categories)
}
