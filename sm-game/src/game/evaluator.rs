//! Best-pair search over a batch
//!
//! Exhaustive O(k²) scan; batches are a dozen images at most.

use crate::game::catalog::ImageDescriptor;
use crate::game::keys::CatalogKey;
use crate::game::similarity::SimilarityIndex;
use serde::Serialize;

/// Highest-similarity pair in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestPair {
    /// Batch position of the first member (always `< b_index`)
    pub a_index: usize,
    pub b_index: usize,
    pub a: CatalogKey,
    pub b: CatalogKey,
    pub value: f64,
}

impl BestPair {
    /// Whether `id` is one of the two members
    pub fn contains(&self, id: &CatalogKey) -> bool {
        &self.a == id || &self.b == id
    }
}

/// Find the pair with the strictly greatest known similarity
///
/// Pairs are visited as `(i, j)` with `i < j`; the first pair reaching the
/// maximum wins ties. Pairs with equal ids and pairs without a known value
/// are skipped. Returns `None` when no pair has a known value.
pub fn best_pair(batch: &[ImageDescriptor], index: &SimilarityIndex) -> Option<BestPair> {
    let mut best: Option<BestPair> = None;

    for (i, first) in batch.iter().enumerate() {
        for (j, second) in batch.iter().enumerate().skip(i + 1) {
            if first.id == second.id {
                continue;
            }
            let Some(value) = index.lookup_keys(&first.id, &second.id).known() else {
                continue;
            };
            if value < 0.0 {
                continue;
            }
            if best.as_ref().map_or(true, |current| value > current.value) {
                best = Some(BestPair {
                    a_index: i,
                    b_index: j,
                    a: first.id.clone(),
                    b: second.id.clone(),
                    value,
                });
            }
        }
    }

    best
}
