//! Shared API state

use std::sync::Arc;
use std::time::Instant;

use drill_core::{SessionManager, Storage};
use tokio::sync::broadcast;

use super::events::DrillEvent;

/// Capacity of the event channel; slow WebSocket clients drop older events
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shared application state for the API
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub storage: Arc<Storage>,
    pub event_tx: broadcast::Sender<DrillEvent>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(manager: Arc<SessionManager>, storage: Arc<Storage>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self::with_event_tx(manager, storage, event_tx)
    }

    /// State sharing an external event channel
    pub fn with_event_tx(
        manager: Arc<SessionManager>,
        storage: Arc<Storage>,
        event_tx: broadcast::Sender<DrillEvent>,
    ) -> Self {
        Self {
            manager,
            storage,
            event_tx,
            start_time: Instant::now(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DrillEvent> {
        self.event_tx.subscribe()
    }

    /// Broadcast an event; having no subscribers is fine
    pub fn emit(&self, event: DrillEvent) {
        let _ = self.event_tx.send(event);
    }
}
