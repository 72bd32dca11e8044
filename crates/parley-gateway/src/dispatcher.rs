use std::sync::Arc;

use tokio::sync::broadcast;

use parley_db::Database;
use parley_types::events::ServerEvent;
use parley_types::participant::ParticipantKey;

use crate::registry::Registry;
use crate::rooms::Rooms;

/// The composed routing service handed to every connection: a global
/// broadcast channel for roster events, the connection registry for
/// targeted pushes, the room map for conversation multicast, and the
/// storage handle.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Events every connected client receives, e.g. the active roster
    broadcast_tx: broadcast::Sender<ServerEvent>,
    registry: Registry,
    rooms: Rooms,
    db: Arc<Database>,
}

impl Dispatcher {
    pub fn new(db: Arc<Database>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                registry: Registry::new(),
                rooms: Rooms::new(),
                db,
            }),
        }
    }

    /// Subscribe to global events. Every connection holds one receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Push an event to all connected clients, identified or anonymous.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn rooms(&self) -> &Rooms {
        &self.inner.rooms
    }

    pub fn db(&self) -> Arc<Database> {
        self.inner.db.clone()
    }

    /// Targeted push to one participant's registered channel. Returns
    /// false when the participant is not currently reachable — a normal
    /// condition under presence churn, never an error.
    pub async fn send_to_key(&self, key: &ParticipantKey, event: ServerEvent) -> bool {
        match self.inner.registry.lookup(key).await {
            Some(handle) => handle.send(event),
            None => false,
        }
    }
}
