use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_types::events::{ClientCommand, ServerEvent};
use parley_types::participant::ParticipantKey;

use crate::dispatcher::Dispatcher;
use crate::registry::ChannelHandle;
use crate::{messages, presence, reactions, receipts, signaling};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle one WebSocket connection for its whole lifetime.
///
/// The identity, when present, was validated at the HTTP upgrade layer —
/// connections without one are anonymous: they receive broadcasts and can
/// join rooms but never enter the registry.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    identity: Option<ParticipantKey>,
) {
    let (mut sender, mut receiver) = socket.split();

    let conn_id = Uuid::new_v4();
    let (tx, mut user_rx) = mpsc::unbounded_channel();

    // Subscribe before registering so this connection sees its own roster
    // broadcast.
    let mut broadcast_rx = dispatcher.subscribe();

    match &identity {
        Some(key) => {
            info!("{} connected ({})", key, conn_id);
            presence::attach(&dispatcher, key.clone(), ChannelHandle::new(conn_id, tx.clone()))
                .await;
        }
        None => info!("anonymous client connected ({})", conn_id),
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Forward broadcasts + targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let Some(event) = result else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client
    let recv_dispatcher = dispatcher.clone();
    let recv_identity = identity.clone();
    let recv_tx = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&recv_dispatcher, &recv_identity, conn_id, &recv_tx, cmd)
                            .await;
                    }
                    Err(e) => {
                        warn!(
                            "bad command on {}: {} -- raw: {}",
                            conn_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    presence::detach(&dispatcher, conn_id).await;
    match &identity {
        Some(key) => info!("{} disconnected ({})", key, conn_id),
        None => info!("anonymous client disconnected ({})", conn_id),
    }
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).unwrap();
    sender.send(Message::Text(text.into())).await
}

async fn handle_command(
    dispatcher: &Dispatcher,
    identity: &Option<ParticipantKey>,
    conn_id: Uuid,
    origin: &mpsc::UnboundedSender<ServerEvent>,
    cmd: ClientCommand,
) {
    match cmd {
        ClientCommand::JoinConversation { conversation_id } => {
            debug!("{} joined conversation {}", describe(identity, conn_id), conversation_id);
            dispatcher
                .rooms()
                .join(&conversation_id, conn_id, origin.clone())
                .await;
        }

        ClientCommand::LeaveConversation { conversation_id } => {
            debug!("{} left conversation {}", describe(identity, conn_id), conversation_id);
            dispatcher.rooms().leave(&conversation_id, conn_id).await;
        }

        ClientCommand::SendMessage(payload) => {
            if let Err(err) = messages::submit(dispatcher, payload).await {
                warn!("sendMessage on {} failed: {}", conn_id, err);
                let _ = origin.send(err.to_client_event("Error processing your message."));
            }
        }

        ClientCommand::MarkMessagesAsRead { conversation_id } => {
            // The reader is the connection identity; anonymous connections
            // cannot mark anything read. Failures here are logged, never
            // surfaced to the client.
            let Some(reader) = identity else {
                warn!("markMessagesAsRead from anonymous connection {}", conn_id);
                return;
            };
            if let Err(err) = receipts::mark_read(dispatcher, &conversation_id, reader).await {
                warn!("markMessagesAsRead on {} failed: {}", conn_id, err);
            }
        }

        ClientCommand::ReactToMessage {
            conversation_id,
            message_id,
            emoji,
        } => {
            let Some(reactor) = identity else {
                let _ = origin.send(ServerEvent::MessageError {
                    message: "Missing data for reaction.".to_string(),
                    details: None,
                });
                return;
            };
            if let Err(err) =
                reactions::react(dispatcher, &conversation_id, &message_id, &emoji, reactor).await
            {
                warn!("reactToMessage on {} failed: {}", conn_id, err);
                let _ = origin.send(err.to_client_event("Error processing your reaction."));
            }
        }

        ClientCommand::Typing {
            conversation_id,
            user_id,
            user_name,
        } => {
            if identity.is_some() {
                signaling::typing(dispatcher, conn_id, &conversation_id, &user_id, &user_name, true)
                    .await;
            }
        }

        ClientCommand::StopTyping {
            conversation_id,
            user_id,
            user_name,
        } => {
            if identity.is_some() {
                signaling::typing(dispatcher, conn_id, &conversation_id, &user_id, &user_name, false)
                    .await;
            }
        }

        ClientCommand::ShareGroupKey {
            conversation_id,
            sender_id,
            recipient_id,
            encrypted_key,
        } => {
            signaling::share_group_key(
                dispatcher,
                conversation_id,
                sender_id,
                recipient_id,
                encrypted_key,
            )
            .await;
        }
    }
}

fn describe(identity: &Option<ParticipantKey>, conn_id: Uuid) -> String {
    match identity {
        Some(key) => key.to_string(),
        None => conn_id.to_string(),
    }
}
