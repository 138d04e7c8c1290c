//! Event types for the StreetMatch event system
//!
//! Sessions publish [`GameEvent`]s on an [`EventBus`]; the game server relays
//! them to browsers over SSE.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// StreetMatch event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    /// A new game session was opened
    SessionCreated {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A batch request finished
    BatchLoaded {
        session_id: Uuid,
        status: BatchStatus,
        count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Selected tiles changed (toggle or reset)
    SelectionChanged {
        session_id: Uuid,
        selected: Vec<usize>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An answer was evaluated against the best pair
    Evaluated {
        session_id: Uuid,
        verdict: Verdict,
        best_a: String,
        best_b: String,
        value: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User-facing message for a session
    Notice {
        session_id: Uuid,
        severity: Severity,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Catalog and similarity sources were (re)loaded
    CatalogReloaded {
        catalog_size: usize,
        similarity_pairs: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl GameEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            GameEvent::SessionCreated { .. } => "SessionCreated",
            GameEvent::BatchLoaded { .. } => "BatchLoaded",
            GameEvent::SelectionChanged { .. } => "SelectionChanged",
            GameEvent::Evaluated { .. } => "Evaluated",
            GameEvent::Notice { .. } => "Notice",
            GameEvent::CatalogReloaded { .. } => "CatalogReloaded",
        }
    }

    /// Session this event belongs to (None for server-wide events)
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            GameEvent::SessionCreated { session_id, .. }
            | GameEvent::BatchLoaded { session_id, .. }
            | GameEvent::SelectionChanged { session_id, .. }
            | GameEvent::Evaluated { session_id, .. }
            | GameEvent::Notice { session_id, .. } => Some(*session_id),
            GameEvent::CatalogReloaded { .. } => None,
        }
    }
}

/// How a batch request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// At least two images were drawn
    Loaded,
    /// The catalog produced nothing
    Empty,
    /// The catalog produced a single image, not enough for a pair
    Insufficient,
}

/// Whether the user's pick agreed with the best pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The selection is exactly the best pair
    Agrees,
    /// At least one selected image is outside the best pair
    Diverges,
}

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

/// Broadcast bus for [`GameEvent`]s
///
/// Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GameEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use sm_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Having no subscribers is normal (no browser listening), so the send
    /// result is not reported.
    pub fn emit(&self, event: GameEvent) {
        let _ = self.tx.send(event);
    }

    /// Channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
