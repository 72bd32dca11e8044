use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use parley_types::events::ServerEvent;
use parley_types::participant::ParticipantKey;

/// One live connection's targeted send channel.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ChannelHandle {
    pub fn new(conn_id: Uuid, tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { conn_id, tx }
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Push an event to this channel. Returns false when the connection's
    /// send loop has already gone away.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Maps each connected identity to its single live channel.
///
/// A second connect from the same identity silently replaces the mapping
/// (last-connected-wins), after which the stale connection's unregister
/// finds nothing to remove. Constructed once at startup and injected
/// wherever reachability is decided; presence broadcasting belongs to the
/// callers, not to the registry.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<ParticipantKey, ChannelHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Unconditionally map `key` to `handle`, replacing any prior channel.
    pub async fn register(&self, key: ParticipantKey, handle: ChannelHandle) {
        self.inner.write().await.insert(key, handle);
    }

    /// Remove whichever entry currently holds `conn_id` and return its key.
    /// Disconnect events only carry the connection id, so this scans the
    /// map (O(n), acceptable at single-process scale).
    pub async fn unregister(&self, conn_id: Uuid) -> Option<ParticipantKey> {
        let mut map = self.inner.write().await;
        let key = map
            .iter()
            .find(|(_, handle)| handle.conn_id == conn_id)
            .map(|(key, _)| key.clone())?;
        map.remove(&key);
        Some(key)
    }

    pub async fn lookup(&self, key: &ParticipantKey) -> Option<ChannelHandle> {
        self.inner.read().await.get(key).cloned()
    }

    /// Snapshot of every connected key; iteration order is irrelevant.
    pub async fn all_keys(&self) -> Vec<ParticipantKey> {
        self.inner.read().await.keys().cloned().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
