use tracing::warn;
use uuid::Uuid;

use parley_types::events::ServerEvent;
use parley_types::participant::ParticipantKey;

use crate::dispatcher::Dispatcher;
use crate::registry::ChannelHandle;

/// Push the full connected-key snapshot to every client. Admin keys render
/// with their prefix; consumers filter the list client-side.
pub async fn broadcast_roster(dispatcher: &Dispatcher) {
    let roster = dispatcher
        .registry()
        .all_keys()
        .await
        .iter()
        .map(ToString::to_string)
        .collect();
    dispatcher.broadcast(ServerEvent::ActiveUsers(roster));
}

/// Register an identified connection and announce the new roster.
pub async fn attach(dispatcher: &Dispatcher, key: ParticipantKey, handle: ChannelHandle) {
    dispatcher.registry().register(key, handle).await;
    broadcast_roster(dispatcher).await;
}

/// Disconnect cleanup: leave every room, drop the registry entry, stamp
/// last-seen, announce the shrunk roster. Anonymous connections (no
/// registry entry) only leave their rooms.
pub async fn detach(dispatcher: &Dispatcher, conn_id: Uuid) {
    dispatcher.rooms().leave_all(conn_id).await;

    let Some(key) = dispatcher.registry().unregister(conn_id).await else {
        return;
    };

    // Best effort: a missed last-seen stamp is an observability gap, a
    // stale registry entry would corrupt presence for everyone. Never let
    // the write block the roster broadcast.
    let db = dispatcher.db();
    let stamp_key = key.clone();
    let result = tokio::task::spawn_blocking(move || match &stamp_key {
        ParticipantKey::User(id) => db.set_user_last_seen(id),
        ParticipantKey::Admin(id) => db.set_admin_last_seen(id),
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!("Failed to update last_seen for {}: {}", key, err),
        Err(err) => warn!("last_seen task for {} failed: {}", key, err),
    }

    broadcast_roster(dispatcher).await;
}
