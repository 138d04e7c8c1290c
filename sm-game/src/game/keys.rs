//! Normalized identities for catalog entries and image pairs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized identity of a catalog entry: its lower-cased base filename
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogKey(String);

impl CatalogKey {
    /// Normalize a raw identifier (path segments stripped, trimmed, lower-cased)
    pub fn from_entry(raw: &str) -> Self {
        let base = raw.rsplit('/').next().unwrap_or(raw);
        Self(base.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CatalogKey {
    fn from(raw: &str) -> Self {
        Self::from_entry(raw)
    }
}

/// Order-independent identity of an unordered pair of catalog keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    /// Join two keys in lexicographic order so `new(a, b) == new(b, a)`
    pub fn new(a: &CatalogKey, b: &CatalogKey) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}|{}", lo, hi))
    }

    /// Normalize two raw identifiers and join them
    pub fn from_entries(a: &str, b: &str) -> Self {
        Self::new(&CatalogKey::from_entry(a), &CatalogKey::from_entry(b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_key_strips_path_and_case() {
        assert_eq!(CatalogKey::from_entry("Foo/Bar.jpg").as_str(), "bar.jpg");
        assert_eq!(CatalogKey::from_entry("  street/Corner.PNG ").as_str(), "corner.png");
        assert_eq!(CatalogKey::from_entry("plain.webp").as_str(), "plain.webp");
    }

    #[test]
    fn test_catalog_key_trailing_slash_is_empty() {
        assert!(CatalogKey::from_entry("dir/").is_empty());
    }

    #[test]
    fn test_pair_key_is_symmetric() {
        let ab = PairKey::from_entries("a.jpg", "b.jpg");
        let ba = PairKey::from_entries("b.jpg", "a.jpg");
        assert_eq!(ab, ba);
        assert_eq!(ab.as_str(), "a.jpg|b.jpg");
    }

    #[test]
    fn test_pair_key_is_case_and_path_insensitive() {
        let left = PairKey::from_entries("Foo/Bar.jpg", "x.jpg");
        let right = PairKey::from_entries("X.JPG", "bar.JPG");
        assert_eq!(left, right);
    }
}
