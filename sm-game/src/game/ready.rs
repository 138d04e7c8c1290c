//! Explicit readiness handles for asynchronously loaded data
//!
//! A [`LoadSlot`] is written by the loader; any number of [`LoadHandle`]s
//! await it. Every load reserves a [`LoadTicket`] first, and only the most
//! recently reserved ticket may publish, so a slow superseded load can never
//! overwrite the result of a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Generation number handed out by [`LoadSlot::reserve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct Published<T> {
    generation: u64,
    value: Option<Arc<T>>,
}

/// Write side of a readiness channel
#[derive(Debug)]
pub struct LoadSlot<T> {
    tx: watch::Sender<Published<T>>,
    latest: AtomicU64,
}

impl<T> LoadSlot<T> {
    /// Create an empty (pending) slot
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Published {
            generation: 0,
            value: None,
        });
        Self {
            tx,
            latest: AtomicU64::new(0),
        }
    }

    /// Start a load; supersedes every earlier ticket
    pub fn reserve(&self) -> LoadTicket {
        LoadTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Publish a loaded value
    ///
    /// Returns `false` (and drops `value`) when a newer ticket has been
    /// reserved since `ticket` was issued.
    pub fn publish(&self, ticket: LoadTicket, value: T) -> bool {
        let latest = &self.latest;
        let mut value = Some(Arc::new(value));
        self.tx.send_if_modified(|state| {
            if ticket.0 != latest.load(Ordering::SeqCst) || ticket.0 <= state.generation {
                return false;
            }
            state.generation = ticket.0;
            state.value = value.take();
            true
        })
    }

    /// Reserve and publish in one step
    pub fn set(&self, value: T) {
        let ticket = self.reserve();
        self.publish(ticket, value);
    }

    /// New read handle
    pub fn handle(&self) -> LoadHandle<T> {
        LoadHandle {
            rx: self.tx.subscribe(),
        }
    }
}

impl<T> Default for LoadSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of a readiness channel
#[derive(Debug)]
pub struct LoadHandle<T> {
    rx: watch::Receiver<Published<T>>,
}

impl<T> Clone for LoadHandle<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> LoadHandle<T> {
    /// Wait until a value has been published
    ///
    /// Resolves to `None` only if the slot was dropped without ever publishing.
    pub async fn wait(&self) -> Option<Arc<T>> {
        let mut rx = self.rx.clone();
        rx.wait_for(|state| state.value.is_some())
            .await
            .ok()
            .and_then(|state| state.value.clone())
    }

    /// Latest published value without waiting
    pub fn current(&self) -> Option<Arc<T>> {
        self.rx.borrow().value.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().value.is_some()
    }

    /// Generation of the value currently published (0 while pending)
    pub fn generation(&self) -> u64 {
        self.rx.borrow().generation
    }
}
