//! Sequence randomizer: unique per batch, capped to what is available, safe on 0 items
//!
//! Keeps a shuffled bag of the (deduplicated) catalog and pops from its end.
//! When the bag runs dry it is refilled with a fresh Fisher-Yates permutation,
//! skipping anything already emitted in the current call, so a returned batch
//! never repeats an item even across a reshuffle boundary.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Shuffled-bag sampler over a set of unique strings
#[derive(Debug, Clone)]
pub struct SequenceRandomizer<R = StdRng> {
    items: Vec<String>,
    bag: Vec<String>,
    rng: R,
}

impl SequenceRandomizer<StdRng> {
    /// Build from raw identifiers, seeded from OS entropy
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_rng(items, StdRng::from_entropy())
    }

    /// Build with a fixed seed (reproducible draws)
    pub fn with_seed<I, S>(items: I, seed: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_rng(items, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SequenceRandomizer<R> {
    /// Build from raw identifiers using the given RNG
    ///
    /// Duplicates (by exact string equality) are dropped.
    pub fn with_rng<I, S>(items: I, rng: R) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let items: Vec<String> = items
            .into_iter()
            .map(Into::into)
            .filter(|item| seen.insert(item.clone()))
            .collect();

        let mut randomizer = Self {
            items,
            bag: Vec::new(),
            rng,
        };
        randomizer.refill();
        randomizer
    }

    /// Number of unique items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The deduplicated catalog
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Items left in the current bag before the next reshuffle
    pub fn remaining(&self) -> usize {
        self.bag.len()
    }

    /// Return up to `n` unique items
    ///
    /// `n` is clamped to `[1, len()]`, so a request for 0 yields one item.
    /// An empty catalog yields an empty batch.
    pub fn next(&mut self, n: usize) -> Vec<String> {
        let total = self.items.len();
        if total == 0 {
            return Vec::new();
        }
        let target = n.clamp(1, total);

        let mut out = Vec::with_capacity(target);
        let mut seen: HashSet<String> = HashSet::with_capacity(target);

        while out.len() < target {
            if self.bag.is_empty() {
                self.refill();
            }

            match self.bag.iter().rposition(|candidate| !seen.contains(candidate)) {
                Some(idx) => {
                    let value = self.bag.remove(idx);
                    seen.insert(value.clone());
                    out.push(value);
                }
                None => {
                    // Everything left in the bag was already drawn this call
                    if seen.len() >= total {
                        break;
                    }
                    self.refill();
                }
            }
        }

        out
    }

    fn refill(&mut self) {
        self.bag = self.items.clone();
        self.bag.shuffle(&mut self.rng);
    }
}
