//! Batch randomization and pairing-evaluation core
//!
//! - `randomizer`: shuffled-bag sampler with no repeats inside a batch
//! - `similarity`: max-wins index over unordered image pairs
//! - `catalog`: deduplicated catalog and the batch provider
//! - `evaluator`: best-pair search
//! - `session`: per-player controller (selection, evaluation, marks)
//! - `ready`: readiness handles for the asynchronously loaded data

pub mod catalog;
pub mod evaluator;
pub mod keys;
pub mod randomizer;
pub mod ready;
pub mod session;
pub mod similarity;

pub use catalog::{Catalog, ImageCatalogProvider, ImageDescriptor};
pub use evaluator::{best_pair, BestPair};
pub use keys::{CatalogKey, PairKey};
pub use randomizer::SequenceRandomizer;
pub use ready::{LoadHandle, LoadSlot, LoadTicket};
pub use session::{
    request_next_batch, BatchOutcome, BatchTicket, Evaluation, GameSession, Mark, Notice,
    SessionError, SessionState, SessionView, SharedSession, Tile,
};
pub use similarity::{Lookup, SimilarityIndex, SimilarityObservation, UNKNOWN_SIMILARITY};
