//! Pairwise similarity index keyed by unordered image pairs
//!
//! Observations are folded into one value per [`PairKey`], keeping the
//! maximum seen. Lookups never fail: an unknown pair reports `hit = false`
//! and the [`UNKNOWN_SIMILARITY`] sentinel.

use crate::game::keys::{CatalogKey, PairKey};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Value reported for pairs with no observation.
/// Similarity sources must only supply non-negative values.
pub const UNKNOWN_SIMILARITY: f64 = -1.0;

/// One validated similarity row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityObservation {
    pub image_a: String,
    pub image_b: String,
    pub value: f64,
}

impl SimilarityObservation {
    pub fn new(image_a: impl Into<String>, image_b: impl Into<String>, value: f64) -> Self {
        Self {
            image_a: image_a.into(),
            image_b: image_b.into(),
            value,
        }
    }

    /// Validate a raw JSON row
    ///
    /// Accepts `image1`/`image2`/`similarity` (or `imageA`/`imageB`/`value`).
    /// The value may be a number or a numeric string. Returns `None` when an
    /// identifier is missing or empty, or the value is not a finite number.
    pub fn from_row(row: &Value) -> Option<Self> {
        let object = row.as_object()?;
        let image_a = non_empty_str(object.get("image1").or_else(|| object.get("imageA")))?;
        let image_b = non_empty_str(object.get("image2").or_else(|| object.get("imageB")))?;
        let value = numeric(object.get("similarity").or_else(|| object.get("value")))?;
        Some(Self::new(image_a, image_b, value))
    }

    pub fn pair_key(&self) -> PairKey {
        PairKey::from_entries(&self.image_a, &self.image_b)
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Result of a similarity lookup
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Lookup {
    pub hit: bool,
    pub value: f64,
}

impl Lookup {
    pub const MISS: Lookup = Lookup {
        hit: false,
        value: UNKNOWN_SIMILARITY,
    };

    /// The stored value, if the pair was known
    pub fn known(&self) -> Option<f64> {
        self.hit.then_some(self.value)
    }
}

/// Row counts from one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub accepted: usize,
    pub skipped: usize,
    /// Distinct pairs in the index after the load
    pub pairs: usize,
}

/// Max-wins map from unordered pair to similarity
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    pairs: HashMap<PairKey, f64>,
    last_error: Option<String>,
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build directly from validated observations
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = SimilarityObservation>,
    {
        let mut index = Self::new();
        for observation in observations {
            index.insert(&observation);
        }
        index.check_usable();
        index
    }

    /// Fold raw JSON rows into the index, skipping malformed ones
    pub fn load_rows(&mut self, rows: &[Value]) -> LoadReport {
        let mut report = LoadReport::default();
        for row in rows {
            match SimilarityObservation::from_row(row) {
                Some(observation) => {
                    self.insert(&observation);
                    report.accepted += 1;
                }
                None => report.skipped += 1,
            }
        }
        report.pairs = self.pairs.len();
        self.check_usable();
        debug!(
            "Similarity load: {} accepted, {} skipped, {} pairs",
            report.accepted, report.skipped, report.pairs
        );
        report
    }

    /// Store `max(existing, value)` under the observation's pair key
    pub fn insert(&mut self, observation: &SimilarityObservation) {
        let key = observation.pair_key();
        self.pairs
            .entry(key)
            .and_modify(|existing| {
                if observation.value > *existing {
                    *existing = observation.value;
                }
            })
            .or_insert(observation.value);
    }

    /// Record a source-level failure (missing file, wrong shape)
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Similarity data unavailable: {}", reason);
        self.last_error = Some(reason);
    }

    /// Look up a pair by raw or normalized identifiers, in either order
    pub fn lookup(&self, a: &str, b: &str) -> Lookup {
        self.lookup_key(&PairKey::from_entries(a, b))
    }

    /// Look up a pair of normalized keys
    pub fn lookup_keys(&self, a: &CatalogKey, b: &CatalogKey) -> Lookup {
        self.lookup_key(&PairKey::new(a, b))
    }

    fn lookup_key(&self, key: &PairKey) -> Lookup {
        match self.pairs.get(key) {
            Some(&value) => Lookup { hit: true, value },
            None => Lookup::MISS,
        }
    }

    /// Number of distinct pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Diagnostic from the last load, if it produced no usable data
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn check_usable(&mut self) {
        if self.pairs.is_empty() {
            if self.last_error.is_none() {
                self.record_failure("similarity data had 0 usable rows");
            }
        } else {
            self.last_error = None;
        }
    }
}
