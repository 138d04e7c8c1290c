//! Image catalog and the batch provider built on it
//!
//! The [`Catalog`] is loaded once and then only read, apart from the
//! randomizer's bag which advances on every draw. The provider waits on the
//! catalog's [`LoadHandle`] before drawing, so callers never see a
//! half-loaded catalog.

use crate::game::keys::CatalogKey;
use crate::game::randomizer::SequenceRandomizer;
use crate::game::ready::LoadHandle;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One tile of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDescriptor {
    /// Normalized identity (lower-cased base filename)
    pub id: CatalogKey,
    /// Catalog entry as listed (trimmed)
    pub label: String,
    /// Location the presentation layer loads the image from
    pub src: String,
    pub selected: bool,
}

impl ImageDescriptor {
    /// Describe a raw catalog entry relative to `base_path`
    pub fn from_entry(entry: &str, base_path: &str) -> Self {
        let trimmed = entry.trim();
        Self {
            id: CatalogKey::from_entry(trimmed),
            label: trimmed.to_string(),
            src: format!("{}{}", base_path, trimmed),
            selected: false,
        }
    }
}

/// Deduplicated set of image identifiers plus its randomizer
#[derive(Debug)]
pub struct Catalog {
    randomizer: Mutex<SequenceRandomizer>,
    len: usize,
}

impl Catalog {
    /// Build from raw entries; blank entries are dropped, duplicates collapse
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_randomizer(SequenceRandomizer::new(usable(entries)))
    }

    /// Build with a fixed shuffle seed
    pub fn with_seed<I, S>(entries: I, seed: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_randomizer(SequenceRandomizer::with_seed(usable(entries), seed))
    }

    pub fn empty() -> Self {
        Self::new(Vec::<String>::new())
    }

    fn from_randomizer(randomizer: SequenceRandomizer) -> Self {
        let len = randomizer.len();
        Self {
            randomizer: Mutex::new(randomizer),
            len,
        }
    }

    /// Number of unique entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Snapshot of the catalog entries
    pub fn entries(&self) -> Vec<String> {
        self.lock().items().to_vec()
    }

    /// Draw up to `n` unique raw entries
    pub fn draw(&self, n: usize) -> Vec<String> {
        self.lock().next(n)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SequenceRandomizer> {
        // The randomizer stays consistent even if a holder panicked mid-draw
        self.randomizer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn usable<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    entries
        .into_iter()
        .map(Into::into)
        .filter(|entry| !entry.trim().is_empty())
        .collect()
}

/// Serves randomized batches of [`ImageDescriptor`]s
#[derive(Debug, Clone)]
pub struct ImageCatalogProvider {
    base_path: String,
    catalog: LoadHandle<Catalog>,
}

impl ImageCatalogProvider {
    pub fn new(base_path: impl Into<String>, catalog: LoadHandle<Catalog>) -> Self {
        Self {
            base_path: base_path.into(),
            catalog,
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Wait for the catalog load to finish
    ///
    /// A load that never published counts as an empty catalog.
    pub async fn ready(&self) -> Arc<Catalog> {
        match self.catalog.wait().await {
            Some(catalog) => catalog,
            None => Arc::new(Catalog::empty()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.catalog.is_ready()
    }

    /// Catalog size without waiting (0 while loading)
    pub fn loaded_len(&self) -> usize {
        self.catalog.current().map_or(0, |catalog| catalog.len())
    }

    /// Up to `n` unique descriptors; empty when the catalog is empty
    pub async fn list_batch(&self, n: usize) -> Vec<ImageDescriptor> {
        let catalog = self.ready().await;
        if catalog.is_empty() {
            return Vec::new();
        }

        let batch: Vec<ImageDescriptor> = catalog
            .draw(n)
            .iter()
            .map(|entry| ImageDescriptor::from_entry(entry, &self.base_path))
            .collect();
        debug!("Drew {} of {} requested images", batch.len(), n);
        batch
    }
}
