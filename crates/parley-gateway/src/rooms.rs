use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use parley_types::events::ServerEvent;

/// Server-side multicast groups, one per conversation.
///
/// Membership is per-connection: a client explicitly joins the rooms of
/// conversations it has on screen and leaves them on navigation. This is
/// deliberately separate from the registry — a participant can be
/// connected without having joined any room.
#[derive(Clone)]
pub struct Rooms {
    inner: Arc<RwLock<HashMap<String, HashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>>>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn join(
        &self,
        conversation_id: &str,
        conn_id: Uuid,
        tx: mpsc::UnboundedSender<ServerEvent>,
    ) {
        self.inner
            .write()
            .await
            .entry(conversation_id.to_string())
            .or_default()
            .insert(conn_id, tx);
    }

    pub async fn leave(&self, conversation_id: &str, conn_id: Uuid) {
        let mut rooms = self.inner.write().await;
        if let Some(members) = rooms.get_mut(conversation_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(conversation_id);
            }
        }
    }

    /// Drop a connection from every room it joined. Called on disconnect.
    pub async fn leave_all(&self, conn_id: Uuid) {
        let mut rooms = self.inner.write().await;
        rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Multicast an event to every member of the conversation's room,
    /// optionally excluding one connection (room-minus-self semantics for
    /// typing indicators). Dead members' send failures are ignored.
    pub async fn send(&self, conversation_id: &str, event: &ServerEvent, exclude: Option<Uuid>) {
        let rooms = self.inner.read().await;
        let Some(members) = rooms.get(conversation_id) else {
            return;
        };
        for (&conn_id, tx) in members.iter() {
            if Some(conn_id) == exclude {
                continue;
            }
            let _ = tx.send(event.clone());
        }
    }
}

impl Default for Rooms {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> (Uuid, mpsc::UnboundedSender<ServerEvent>, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Uuid::new_v4(), tx, rx)
    }

    fn typing_event() -> ServerEvent {
        ServerEvent::UserTyping {
            conversation_id: "c1".into(),
            user_id: "alice".into(),
            user_name: "Alice Arden".into(),
            is_typing: true,
        }
    }

    #[tokio::test]
    async fn send_reaches_members_only() {
        let rooms = Rooms::new();
        let (in_room, tx1, mut rx1) = member();
        let (_outside, _tx2, mut rx2) = member();

        rooms.join("c1", in_room, tx1).await;
        rooms.send("c1", &typing_event(), None).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn exclude_skips_the_sender() {
        let rooms = Rooms::new();
        let (typist, tx1, mut rx1) = member();
        let (peer, tx2, mut rx2) = member();

        rooms.join("c1", typist, tx1).await;
        rooms.join("c1", peer, tx2).await;
        rooms.send("c1", &typing_event(), Some(typist)).await;

        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn leave_all_clears_every_membership() {
        let rooms = Rooms::new();
        let (conn, tx, mut rx) = member();

        rooms.join("c1", conn, tx.clone()).await;
        rooms.join("c2", conn, tx).await;
        rooms.leave_all(conn).await;

        rooms.send("c1", &typing_event(), None).await;
        rooms.send("c2", &typing_event(), None).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_is_scoped_to_one_room() {
        let rooms = Rooms::new();
        let (conn, tx, mut rx) = member();

        rooms.join("c1", conn, tx.clone()).await;
        rooms.join("c2", conn, tx).await;
        rooms.leave("c1", conn).await;

        rooms.send("c1", &typing_event(), None).await;
        assert!(rx.try_recv().is_err());
        rooms.send("c2", &typing_event(), None).await;
        assert!(rx.try_recv().is_ok());
    }
}
