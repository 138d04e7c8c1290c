//! Shared server state
//!
//! The catalog and similarity index are process-wide and published through
//! [`LoadSlot`]s; sessions are per player, each behind its own async mutex so
//! one session handles one request at a time. Sessions nobody touched for
//! `[game] session_ttl_secs` are dropped by [`AppState::spawn_session_sweeper`].

use crate::game::{
    Catalog, GameSession, ImageCatalogProvider, LoadHandle, LoadSlot, LoadTicket,
    SimilarityIndex,
};
use crate::sources;
use sm_common::config::TomlConfig;
use sm_common::events::{EventBus, GameEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

pub use crate::game::SharedSession;

/// Longest pause between two idle-session sweeps
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Summary of one catalog/similarity load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
    pub catalog_size: usize,
    pub similarity_pairs: usize,
    /// False when a newer reload superseded this one
    pub applied: bool,
}

/// Write side of the process-wide data
#[derive(Debug, Default)]
pub struct GameData {
    catalog: LoadSlot<Catalog>,
    similarity: LoadSlot<SimilarityIndex>,
    reserving: std::sync::Mutex<()>,
}

impl GameData {
    /// Tickets for one catalog + similarity load
    ///
    /// Both are taken under one lock, so concurrent reloads are ordered the
    /// same way in both slots and the newest one publishes both halves.
    fn reserve(&self) -> (LoadTicket, LoadTicket) {
        let _guard = self
            .reserving
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (self.catalog.reserve(), self.similarity.reserve())
    }
}

#[derive(Debug)]
struct SessionEntry {
    session: SharedSession,
    last_active: Instant,
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TomlConfig>,
    pub provider: ImageCatalogProvider,
    pub similarity: LoadHandle<SimilarityIndex>,
    pub events: EventBus,
    data: Arc<GameData>,
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl AppState {
    /// Create state with catalog and similarity still pending
    pub fn new(config: TomlConfig) -> Self {
        let data = Arc::new(GameData::default());
        let provider =
            ImageCatalogProvider::new(config.images.base_path.clone(), data.catalog.handle());
        let similarity = data.similarity.handle();
        Self {
            config: Arc::new(config),
            provider,
            similarity,
            events: EventBus::default(),
            data,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create state with already-loaded data
    pub fn with_data(config: TomlConfig, catalog: Catalog, similarity: SimilarityIndex) -> Self {
        let state = Self::new(config);
        state.data.catalog.set(catalog);
        state.data.similarity.set(similarity);
        state
    }

    /// (Re)load catalog and similarity data from the configured sources
    ///
    /// Both loads run concurrently. Readiness resolves even when a source
    /// fails; it then holds empty data.
    pub async fn reload(&self) -> ReloadSummary {
        let (catalog_ticket, similarity_ticket) = self.data.reserve();

        let (catalog, similarity) = tokio::join!(
            sources::load_catalog(&self.config.images),
            sources::load_similarity(&self.config.similarity.path),
        );
        let catalog_size = catalog.len();
        let similarity_pairs = similarity.len();

        let applied_catalog = self.data.catalog.publish(catalog_ticket, catalog);
        let applied_similarity = self.data.similarity.publish(similarity_ticket, similarity);
        let applied = applied_catalog && applied_similarity;

        if applied {
            info!(
                "Game data ready: {} images, {} similarity pairs",
                catalog_size, similarity_pairs
            );
            self.events.emit(GameEvent::CatalogReloaded {
                catalog_size,
                similarity_pairs,
                timestamp: chrono::Utc::now(),
            });
        } else {
            info!("Discarded superseded game data load");
        }

        ReloadSummary {
            catalog_size,
            similarity_pairs,
            applied,
        }
    }

    /// Open a new session and return its id
    pub async fn create_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        let entry = SessionEntry {
            session: Arc::new(Mutex::new(GameSession::new(id))),
            last_active: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
        self.events.emit(GameEvent::SessionCreated {
            session_id: id,
            timestamp: chrono::Utc::now(),
        });
        id
    }

    /// Look up a session and mark it active
    pub async fn session(&self, id: Uuid) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_active = Instant::now();
        Some(entry.session.clone())
    }

    /// Drop a session; returns whether it existed
    pub async fn remove_session(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for longer than the configured TTL as of `now`;
    /// returns how many were dropped
    pub async fn expire_idle_sessions(&self, now: Instant) -> usize {
        let ttl = self.config.game.session_ttl();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_active) <= ttl);
        let expired = before - sessions.len();
        if expired > 0 {
            info!(
                "Dropped {} idle sessions ({} remain)",
                expired,
                sessions.len()
            );
        }
        expired
    }

    /// Start the background task that drops idle sessions
    pub fn spawn_session_sweeper(&self) -> JoinHandle<()> {
        let state = self.clone();
        let period = self.config.game.session_ttl().min(MAX_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("Session sweeper started ({}s interval)", period.as_secs());

            loop {
                interval.tick().await;
                let expired = state.expire_idle_sessions(Instant::now()).await;
                debug!("Session sweep dropped {}", expired);
            }
        })
    }
}
