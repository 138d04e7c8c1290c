//! Loaders for the image manifest and the similarity rows
//!
//! External JSON is shape-checked here and nowhere else: each parser returns
//! a [`SourceOutcome`], and the loaders turn an invalid or unreachable source
//! into empty data plus a warning. Nothing malformed reaches the game core.

use crate::game::{Catalog, SimilarityIndex};
use serde_json::Value;
use sm_common::config::ImagesConfig;
use sm_common::{Error, Result};
use std::path::Path;
use tracing::{info, warn};

/// Image file extensions listed by [`scan_image_dir`]
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Manifest file name inside the images directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Outcome of validating an external document
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome<T> {
    /// Document had the expected shape; unusable entries already dropped
    Valid(Vec<T>),
    /// Document had the wrong shape as a whole
    Invalid { reason: String },
}

impl<T> SourceOutcome<T> {
    fn invalid(reason: impl Into<String>) -> Self {
        SourceOutcome::Invalid {
            reason: reason.into(),
        }
    }

    /// Items of a valid document, or `error(reason)` for an invalid one
    pub fn into_result(self, error: impl FnOnce(String) -> Error) -> Result<Vec<T>> {
        match self {
            SourceOutcome::Valid(items) => Ok(items),
            SourceOutcome::Invalid { reason } => Err(error(reason)),
        }
    }
}

/// Validate a manifest document: an array whose string entries are kept
/// when non-blank; other entries are dropped.
pub fn parse_manifest(document: &Value) -> SourceOutcome<String> {
    match document.as_array() {
        Some(entries) => SourceOutcome::Valid(
            entries
                .iter()
                .filter_map(Value::as_str)
                .filter(|entry| !entry.trim().is_empty())
                .map(str::to_string)
                .collect(),
        ),
        None => SourceOutcome::invalid("manifest must be an array of filenames"),
    }
}

/// Validate a similarity document: it must be an array of rows
///
/// Rows themselves are checked later by the index, which skips bad ones.
pub fn parse_similarity(text: &str) -> SourceOutcome<Value> {
    let document: Value = match serde_json::from_str(strip_script_wrapper(text)) {
        Ok(document) => document,
        Err(e) => return SourceOutcome::invalid(format!("not valid JSON: {}", e)),
    };
    match document {
        Value::Array(rows) => SourceOutcome::Valid(rows),
        _ => SourceOutcome::invalid("similarity data is missing or not an array"),
    }
}

/// Accept `window.SIMILARITY_DATA = [...];` as well as bare JSON
///
/// A leading UTF-8 byte order mark is ignored.
pub fn strip_script_wrapper(text: &str) -> &str {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return trimmed;
    }
    match trimmed.split_once('=') {
        Some((_, rest)) => rest.trim().trim_end_matches(';').trim_end(),
        None => trimmed,
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Read a JSON document from a local path or an http(s) URL
pub async fn fetch_json(location: &str) -> Result<Value> {
    if is_remote(location) {
        let response = reqwest::get(location)
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", location, e)))?;
        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "{}: HTTP {}",
                location,
                response.status()
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", location, e)))
    } else {
        let text = tokio::fs::read_to_string(location).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Build the catalog from inline entries or the manifest
///
/// Never fails: an unreachable or malformed manifest yields an empty catalog.
pub async fn load_catalog(images: &ImagesConfig) -> Catalog {
    let (entries, source) = match &images.entries {
        Some(entries) => (entries.clone(), "inline entries".to_string()),
        None => {
            let location = images.manifest_location();
            let loaded = fetch_json(&location).await.and_then(|document| {
                parse_manifest(&document)
                    .into_result(|reason| Error::Manifest(format!("{}: {}", location, reason)))
            });
            let entries = match loaded {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Failed to load manifest {}: {}", location, e);
                    Vec::new()
                }
            };
            (entries, location)
        }
    };

    let catalog = Catalog::new(entries);
    if catalog.is_empty() {
        warn!("No usable manifest found; image list is empty");
    } else {
        info!("Loaded {} images from {}", catalog.len(), source);
    }
    catalog
}

/// Build the similarity index from a JSON (or script-wrapped) file
///
/// Never fails: problems are recorded as the index's `last_error`.
pub async fn load_similarity(path: &Path) -> SimilarityIndex {
    let mut index = SimilarityIndex::new();

    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            index.record_failure(format!("{}: {}", path.display(), e));
            return index;
        }
    };

    match parse_similarity(&text) {
        SourceOutcome::Valid(rows) => {
            let report = index.load_rows(&rows);
            info!(
                "Similarity data from {}: {} rows accepted, {} skipped, {} pairs",
                path.display(),
                report.accepted,
                report.skipped,
                report.pairs
            );
        }
        SourceOutcome::Invalid { reason } => {
            let error = Error::Similarity(format!("{}: {}", path.display(), reason));
            index.record_failure(error.to_string());
        }
    }
    index
}

/// File names of the images in `dir`, sorted
pub fn scan_image_dir(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_image = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
        let name = entry.file_name().to_string_lossy().to_string();
        if is_image && name != MANIFEST_FILE {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Regenerate `<dir>/manifest.json`; returns the number of entries written
pub fn write_manifest(dir: &Path) -> Result<usize> {
    let names = scan_image_dir(dir)?;
    let json = serde_json::to_string_pretty(&names)?;
    std::fs::write(dir.join(MANIFEST_FILE), json)?;
    Ok(names.len())
}
