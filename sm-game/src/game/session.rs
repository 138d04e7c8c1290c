//! Game session controller
//!
//! Owns one player's batch, selection (at most two tiles) and evaluation
//! marks. Everything it exposes is plain data; the presentation layer maps
//! tile positions to whatever it renders.
//!
//! State machine:
//!
//! ```text
//! Idle -> Loading -> BatchLoaded <-> Selecting <-> Evaluated
//!                 \-> Empty | Insufficient
//! ```
//!
//! Rejected operations return a [`SessionError`] and leave the session
//! untouched.

use crate::game::catalog::{ImageCatalogProvider, ImageDescriptor};
use crate::game::evaluator::{best_pair, BestPair};
use crate::game::keys::CatalogKey;
use crate::game::ready::LoadHandle;
use crate::game::similarity::SimilarityIndex;
use serde::Serialize;
use sm_common::events::{BatchStatus, Severity, Verdict};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Most tiles a player may select at once
pub const MAX_SELECTED: usize = 2;

/// Session handle shared between requests
pub type SharedSession = Arc<Mutex<GameSession>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No batch requested yet
    Idle,
    /// Batch request in flight
    Loading,
    /// Batch on screen, nothing selected
    BatchLoaded,
    /// One or two tiles selected
    Selecting,
    /// Marks reflect the last evaluation
    Evaluated,
    /// Catalog had no images
    Empty,
    /// Catalog had a single image
    Insufficient,
}

/// Evaluation mark of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Neutral,
    /// Member of the best pair
    Match,
    /// Selected by the player but outside the best pair
    Divergent,
}

/// Batch entry plus its mark
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tile {
    #[serde(flatten)]
    pub descriptor: ImageDescriptor,
    pub mark: Mark,
}

/// User-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Rejected session operations; the message is shown to the player
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("You can only select two images.")]
    SelectionFull,

    #[error("Pick two images first.")]
    TooFewSelected { selected: usize },

    #[error("No similarity info for this batch.")]
    NoSimilarityData,

    #[error("No images loaded yet. Press Next to get a batch.")]
    NoBatch,

    #[error("There is no image at position {0}.")]
    UnknownTile(usize),
}

impl SessionError {
    pub fn notice(&self) -> Notice {
        Notice::warning(self.to_string())
    }
}

/// Generation ticket for one batch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTicket(u64);

/// Result of installing a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Loaded { count: usize },
    Empty,
    Insufficient,
    /// A newer request superseded this one; nothing changed
    Stale,
}

impl BatchOutcome {
    /// Event status, `None` for a discarded stale batch
    pub fn status(&self) -> Option<BatchStatus> {
        match self {
            BatchOutcome::Loaded { .. } => Some(BatchStatus::Loaded),
            BatchOutcome::Empty => Some(BatchStatus::Empty),
            BatchOutcome::Insufficient => Some(BatchStatus::Insufficient),
            BatchOutcome::Stale => None,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            BatchOutcome::Loaded { count } => *count,
            BatchOutcome::Insufficient => 1,
            BatchOutcome::Empty | BatchOutcome::Stale => 0,
        }
    }
}

/// Result of a successful evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub best: BestPair,
    pub verdict: Verdict,
    /// Tile positions marked divergent
    pub divergent: Vec<usize>,
}

/// Snapshot handed to the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub state: SessionState,
    pub tiles: Vec<Tile>,
    pub selected: Vec<usize>,
    pub best: Option<BestPair>,
    pub verdict: Option<Verdict>,
    pub notice: Option<Notice>,
}

/// One player's game
#[derive(Debug, Clone)]
pub struct GameSession {
    id: Uuid,
    state: SessionState,
    tiles: Vec<Tile>,
    evaluation: Option<Evaluation>,
    notice: Option<Notice>,
    generation: u64,
}

impl GameSession {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            tiles: Vec::new(),
            evaluation: None,
            notice: None,
            generation: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    /// Positions of selected tiles, in batch order
    pub fn selected_indices(&self) -> Vec<usize> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| tile.descriptor.selected)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.tiles.iter().filter(|tile| tile.descriptor.selected).count()
    }

    /// Drop the current batch and start a new request
    ///
    /// Any ticket issued earlier becomes stale.
    pub fn begin_request(&mut self) -> BatchTicket {
        self.generation += 1;
        self.tiles.clear();
        self.evaluation = None;
        self.notice = None;
        self.state = SessionState::Loading;
        BatchTicket(self.generation)
    }

    /// Install the batch fetched for `ticket`
    pub fn install_batch(&mut self, ticket: BatchTicket, batch: Vec<ImageDescriptor>) -> BatchOutcome {
        if ticket.0 != self.generation {
            debug!(
                "Session {}: discarding stale batch (ticket {}, current {})",
                self.id, ticket.0, self.generation
            );
            return BatchOutcome::Stale;
        }

        let outcome = match batch.len() {
            0 => {
                self.state = SessionState::Empty;
                self.notice = Some(Notice::warning(
                    "No images left. Add more images or update the manifest.",
                ));
                BatchOutcome::Empty
            }
            1 => {
                self.state = SessionState::Insufficient;
                self.notice = Some(Notice::warning(
                    "Not enough images to form a pair. Please add more.",
                ));
                BatchOutcome::Insufficient
            }
            count => {
                self.tiles = batch
                    .into_iter()
                    .map(|mut descriptor| {
                        descriptor.selected = false;
                        Tile {
                            descriptor,
                            mark: Mark::Neutral,
                        }
                    })
                    .collect();
                self.state = SessionState::BatchLoaded;
                self.notice = Some(Notice::info(format!(
                    "Loaded {} images. Pick two, then press \u{201c}Check answer\u{201d}.",
                    count
                )));
                BatchOutcome::Loaded { count }
            }
        };
        debug!("Session {}: batch outcome {:?}", self.id, outcome);
        outcome
    }

    /// Flip the selection of the tile at `index`
    ///
    /// Returns the tile's new selected state. Selecting a third tile is
    /// rejected. Changing the selection after an evaluation clears its marks.
    pub fn toggle_select(&mut self, index: usize) -> Result<bool, SessionError> {
        if self.tiles.is_empty() {
            return Err(SessionError::NoBatch);
        }
        let selected_count = self.selected_count();
        let tile = self
            .tiles
            .get_mut(index)
            .ok_or(SessionError::UnknownTile(index))?;

        if !tile.descriptor.selected && selected_count >= MAX_SELECTED {
            return Err(SessionError::SelectionFull);
        }

        tile.descriptor.selected = !tile.descriptor.selected;
        let now_selected = tile.descriptor.selected;

        self.clear_marks();
        self.notice = None;
        self.state = if self.selected_count() == 0 {
            SessionState::BatchLoaded
        } else {
            SessionState::Selecting
        };
        Ok(now_selected)
    }

    /// Clear every selection and evaluation mark
    pub fn reset_selection(&mut self) {
        for tile in &mut self.tiles {
            tile.descriptor.selected = false;
        }
        self.clear_marks();
        if !self.tiles.is_empty() {
            self.state = SessionState::BatchLoaded;
            self.notice = None;
        }
    }

    /// Compare the player's two picks with the best pair of the batch
    ///
    /// The best pair is always marked `Match`; selected tiles outside it are
    /// marked `Divergent`.
    pub fn evaluate(&mut self, index: &SimilarityIndex) -> Result<&Evaluation, SessionError> {
        if self.tiles.is_empty() {
            return Err(SessionError::NoBatch);
        }
        let selected = self.selected_indices();
        if selected.len() < MAX_SELECTED {
            return Err(SessionError::TooFewSelected {
                selected: selected.len(),
            });
        }
        if selected.len() > MAX_SELECTED {
            return Err(SessionError::SelectionFull);
        }

        let descriptors: Vec<ImageDescriptor> =
            self.tiles.iter().map(|tile| tile.descriptor.clone()).collect();
        let best = best_pair(&descriptors, index).ok_or(SessionError::NoSimilarityData)?;

        for tile in &mut self.tiles {
            tile.mark = Mark::Neutral;
        }
        self.tiles[best.a_index].mark = Mark::Match;
        self.tiles[best.b_index].mark = Mark::Match;

        let mut divergent = Vec::new();
        for &i in &selected {
            if !best.contains(&self.tiles[i].descriptor.id) {
                self.tiles[i].mark = Mark::Divergent;
                divergent.push(i);
            }
        }

        let chosen: HashSet<&CatalogKey> =
            selected.iter().map(|&i| &self.tiles[i].descriptor.id).collect();
        let expected: HashSet<&CatalogKey> = [&best.a, &best.b].into_iter().collect();
        let verdict = if chosen == expected {
            Verdict::Agrees
        } else {
            Verdict::Diverges
        };

        self.notice = Some(Notice::info(match verdict {
            Verdict::Agrees => "This is also what AI believes to be the most similar pair.",
            Verdict::Diverges => "Nice pick! AI\u{2019}s current best guess is highlighted.",
        }));
        self.state = SessionState::Evaluated;
        debug!(
            "Session {}: evaluated {:?} against {}|{} ({})",
            self.id, verdict, best.a, best.b, best.value
        );

        Ok(self.evaluation.insert(Evaluation {
            best,
            verdict,
            divergent,
        }))
    }

    /// Snapshot for the presentation layer
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            state: self.state,
            tiles: self.tiles.clone(),
            selected: self.selected_indices(),
            best: self.evaluation.as_ref().map(|e| e.best.clone()),
            verdict: self.evaluation.as_ref().map(|e| e.verdict),
            notice: self.notice.clone(),
        }
    }

    fn clear_marks(&mut self) {
        for tile in &mut self.tiles {
            tile.mark = Mark::Neutral;
        }
        self.evaluation = None;
    }
}

/// Fetch and install a fresh batch of `count` images
///
/// The session is unlocked while the similarity data and the catalog are
/// awaited, so a newer request for the same session can start meanwhile.
/// This batch is then discarded and the outcome is [`BatchOutcome::Stale`].
/// Returns the outcome with the view taken right after installing.
pub async fn request_next_batch(
    session: &SharedSession,
    provider: &ImageCatalogProvider,
    similarity: &LoadHandle<SimilarityIndex>,
    count: usize,
) -> (BatchOutcome, SessionView) {
    let ticket = session.lock().await.begin_request();

    similarity.wait().await;
    let batch = provider.list_batch(count).await;

    let mut session = session.lock().await;
    let outcome = session.install_batch(ticket, batch);
    (outcome, session.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::Catalog;
    use crate::game::ready::LoadSlot;
    use crate::game::similarity::SimilarityObservation;

    fn batch(entries: &[&str]) -> Vec<ImageDescriptor> {
        entries
            .iter()
            .map(|entry| ImageDescriptor::from_entry(entry, "images/"))
            .collect()
    }

    fn loaded(entries: &[&str]) -> GameSession {
        let mut session = GameSession::new(Uuid::new_v4());
        let ticket = session.begin_request();
        session.install_batch(ticket, batch(entries));
        session
    }

    fn abc_index() -> SimilarityIndex {
        SimilarityIndex::from_observations([
            SimilarityObservation::new("a.jpg", "b.jpg", 0.9),
            SimilarityObservation::new("a.jpg", "c.jpg", 0.2),
        ])
    }

    fn marks(session: &GameSession) -> Vec<Mark> {
        session.tiles().iter().map(|tile| tile.mark).collect()
    }

    #[test]
    fn test_install_outcomes() {
        let mut session = GameSession::new(Uuid::nil());
        assert_eq!(session.state(), SessionState::Idle);

        let ticket = session.begin_request();
        assert_eq!(session.state(), SessionState::Loading);
        assert_eq!(session.install_batch(ticket, Vec::new()), BatchOutcome::Empty);
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.notice().unwrap().message.contains("No images left"));

        let ticket = session.begin_request();
        assert_eq!(
            session.install_batch(ticket, batch(&["only.jpg"])),
            BatchOutcome::Insufficient
        );
        assert_eq!(session.state(), SessionState::Insufficient);
        assert!(session.tiles().is_empty());

        let ticket = session.begin_request();
        assert_eq!(
            session.install_batch(ticket, batch(&["a.jpg", "b.jpg", "c.jpg"])),
            BatchOutcome::Loaded { count: 3 }
        );
        assert_eq!(session.state(), SessionState::BatchLoaded);
        assert_eq!(session.tiles().len(), 3);
        assert_eq!(session.notice().unwrap().severity, Severity::Info);
    }

    #[test]
    fn test_stale_batch_is_discarded() {
        let mut session = GameSession::new(Uuid::nil());
        let old = session.begin_request();
        let new = session.begin_request();

        assert_eq!(
            session.install_batch(new, batch(&["a.jpg", "b.jpg"])),
            BatchOutcome::Loaded { count: 2 }
        );
        assert_eq!(
            session.install_batch(old, batch(&["x.jpg", "y.jpg", "z.jpg"])),
            BatchOutcome::Stale
        );
        assert_eq!(session.tiles().len(), 2);
        assert_eq!(session.tiles()[0].descriptor.id.as_str(), "a.jpg");
    }

    #[test]
    fn test_third_selection_rejected_without_change() {
        let mut session = loaded(&["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(session.toggle_select(0), Ok(true));
        assert_eq!(session.toggle_select(1), Ok(true));
        assert_eq!(session.state(), SessionState::Selecting);

        assert_eq!(session.toggle_select(2), Err(SessionError::SelectionFull));
        assert_eq!(session.selected_indices(), vec![0, 1]);
        assert_eq!(
            SessionError::SelectionFull.notice().message,
            "You can only select two images."
        );

        // Deselecting frees a slot
        assert_eq!(session.toggle_select(1), Ok(false));
        assert_eq!(session.toggle_select(2), Ok(true));
        assert_eq!(session.selected_indices(), vec![0, 2]);
    }

    #[test]
    fn test_toggle_without_batch_or_out_of_range() {
        let mut empty = GameSession::new(Uuid::nil());
        assert_eq!(empty.toggle_select(0), Err(SessionError::NoBatch));

        let mut session = loaded(&["a.jpg", "b.jpg"]);
        assert_eq!(session.toggle_select(5), Err(SessionError::UnknownTile(5)));
        assert_eq!(session.selected_count(), 0);
    }

    #[test]
    fn test_evaluate_requires_two_selected() {
        let mut session = loaded(&["a.jpg", "b.jpg", "c.jpg"]);
        session.toggle_select(0).unwrap();

        let err = session.evaluate(&abc_index()).unwrap_err();
        assert_eq!(err, SessionError::TooFewSelected { selected: 1 });
        assert_eq!(session.state(), SessionState::Selecting);
        assert!(marks(&session).iter().all(|m| *m == Mark::Neutral));
    }

    #[test]
    fn test_evaluate_divergent_selection() {
        let mut session = loaded(&["a.jpg", "b.jpg", "c.jpg"]);
        session.toggle_select(0).unwrap();
        session.toggle_select(2).unwrap();

        let evaluation = session.evaluate(&abc_index()).unwrap().clone();
        assert_eq!(evaluation.verdict, Verdict::Diverges);
        assert_eq!(evaluation.best.a.as_str(), "a.jpg");
        assert_eq!(evaluation.best.b.as_str(), "b.jpg");
        assert_eq!(evaluation.divergent, vec![2]);
        assert_eq!(marks(&session), vec![Mark::Match, Mark::Match, Mark::Divergent]);
        assert_eq!(session.state(), SessionState::Evaluated);
        assert!(session.notice().unwrap().message.starts_with("Nice pick!"));
    }

    #[test]
    fn test_evaluate_matching_selection() {
        let mut session = loaded(&["c.jpg", "b.jpg", "a.jpg"]);
        session.toggle_select(1).unwrap();
        session.toggle_select(2).unwrap();

        let evaluation = session.evaluate(&abc_index()).unwrap();
        assert_eq!(evaluation.verdict, Verdict::Agrees);
        assert!(evaluation.divergent.is_empty());
        assert_eq!(marks(&session), vec![Mark::Neutral, Mark::Match, Mark::Match]);
        assert!(session.notice().unwrap().message.contains("most similar pair"));
    }

    #[test]
    fn test_best_pair_revealed_even_when_both_picks_diverge() {
        let mut session = loaded(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        session.toggle_select(2).unwrap();
        session.toggle_select(3).unwrap();

        session.evaluate(&abc_index()).unwrap();
        assert_eq!(
            marks(&session),
            vec![Mark::Match, Mark::Match, Mark::Divergent, Mark::Divergent]
        );
    }

    #[test]
    fn test_evaluate_without_similarity_data_keeps_marks() {
        let mut session = loaded(&["x.jpg", "y.jpg"]);
        session.toggle_select(0).unwrap();
        session.toggle_select(1).unwrap();

        let err = session.evaluate(&SimilarityIndex::new()).unwrap_err();
        assert_eq!(err, SessionError::NoSimilarityData);
        assert_eq!(err.notice().message, "No similarity info for this batch.");
        assert_eq!(session.state(), SessionState::Selecting);
        assert!(session.evaluation().is_none());
    }

    #[test]
    fn test_reset_is_idempotent_and_clears_marks() {
        let mut session = loaded(&["a.jpg", "b.jpg", "c.jpg"]);
        session.toggle_select(0).unwrap();
        session.toggle_select(2).unwrap();
        session.evaluate(&abc_index()).unwrap();

        session.reset_selection();
        let after_first = session.view();
        session.reset_selection();
        let after_second = session.view();

        assert_eq!(after_first.state, SessionState::BatchLoaded);
        assert!(after_first.selected.is_empty());
        assert!(after_first.best.is_none());
        assert!(after_first.tiles.iter().all(|t| t.mark == Mark::Neutral));
        assert_eq!(after_first.tiles, after_second.tiles);
        assert_eq!(after_first.state, after_second.state);
    }

    #[test]
    fn test_toggle_after_evaluation_clears_marks() {
        let mut session = loaded(&["a.jpg", "b.jpg", "c.jpg"]);
        session.toggle_select(0).unwrap();
        session.toggle_select(2).unwrap();
        session.evaluate(&abc_index()).unwrap();

        session.toggle_select(2).unwrap();
        assert_eq!(session.state(), SessionState::Selecting);
        assert!(session.evaluation().is_none());
        assert!(marks(&session).iter().all(|m| *m == Mark::Neutral));
    }

    #[test]
    fn test_view_serializes_tiles_flat() {
        let mut session = loaded(&["a.jpg", "b.jpg"]);
        session.toggle_select(1).unwrap();

        let json = serde_json::to_value(session.view()).unwrap();
        assert_eq!(json["state"], "selecting");
        assert_eq!(json["tiles"][1]["id"], "b.jpg");
        assert_eq!(json["tiles"][1]["selected"], true);
        assert_eq!(json["tiles"][1]["mark"], "neutral");
        assert_eq!(json["selected"], serde_json::json!([1]));
    }

    fn shared() -> SharedSession {
        Arc::new(Mutex::new(GameSession::new(Uuid::new_v4())))
    }

    fn provider_over(entries: &[&str]) -> (LoadSlot<Catalog>, ImageCatalogProvider) {
        let slot = LoadSlot::new();
        slot.set(Catalog::with_seed(entries.iter().copied(), 3));
        let provider = ImageCatalogProvider::new("images/", slot.handle());
        (slot, provider)
    }

    #[tokio::test]
    async fn test_request_next_batch_installs() {
        let session = shared();
        let (_catalog, provider) = provider_over(&["a.jpg", "b.jpg", "c.jpg"]);
        let similarity = LoadSlot::new();
        similarity.set(abc_index());

        let (outcome, view) =
            request_next_batch(&session, &provider, &similarity.handle(), 2).await;
        assert_eq!(outcome, BatchOutcome::Loaded { count: 2 });
        assert_eq!(view.state, SessionState::BatchLoaded);
        assert_eq!(view.tiles.len(), 2);
        assert_eq!(session.lock().await.tiles().len(), 2);
    }

    #[tokio::test]
    async fn test_superseded_request_is_stale() {
        let session = shared();
        let (_catalog, provider) = provider_over(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        let similarity = LoadSlot::new();
        let handle = similarity.handle();

        // Both requests take their ticket before the similarity data arrives.
        let (first, second, ()) = tokio::join!(
            request_next_batch(&session, &provider, &handle, 2),
            request_next_batch(&session, &provider, &handle, 3),
            async { similarity.set(abc_index()) },
        );

        assert_eq!(first.0, BatchOutcome::Stale);
        assert_eq!(second.0, BatchOutcome::Loaded { count: 3 });

        let session = session.lock().await;
        assert_eq!(session.state(), SessionState::BatchLoaded);
        assert_eq!(session.tiles().len(), 3);
    }
}
