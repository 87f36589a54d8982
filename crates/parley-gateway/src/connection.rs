use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_chat::{Chat, SessionHandle};
use parley_types::events::{GatewayCommand, GatewayEvent};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a client has to announce itself with `user:connect`.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a WebSocket whose bearer token was validated at the upgrade. The
/// client still has to send `user:connect` naming the same user before it is
/// registered.
pub async fn handle_connection(socket: WebSocket, chat: Chat, user_id: Uuid, username: String) {
    let (mut sender, mut receiver) = socket.split();

    match wait_for_connect(&mut receiver).await {
        Some(claimed) if claimed == user_id => {}
        Some(claimed) => {
            warn!(
                "{} ({}) announced as {}, closing",
                username, user_id, claimed
            );
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
        None => {
            warn!("{} ({}) never sent user:connect, closing", username, user_id);
            return;
        }
    }

    let (handle, events) = SessionHandle::channel();
    chat.directory().register(user_id, handle.clone());
    info!("{} ({}) connected to gateway", username, user_id);

    if send_event(&mut sender, &GatewayEvent::Ready { user_id }).await {
        run_connection_loop(sender, receiver, events, &chat, user_id, &username, handle.clone()).await;
    }

    chat.directory().unregister(handle.conn_id());
    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn wait_for_connect(receiver: &mut SplitStream<WebSocket>) -> Option<Uuid> {
    let wait = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(GatewayCommand::UserConnect { user_id }) => return Some(user_id),
                    Ok(other) => debug!("Ignoring command before user:connect: {:?}", other),
                    Err(e) => debug!("Unparseable frame before user:connect: {}", e),
                }
            }
        }
        None
    };

    tokio::time::timeout(CONNECT_TIMEOUT, wait).await.ok().flatten()
}

/// Serialize and send one event. Returns false if the socket is gone.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.name(), e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut events: tokio::sync::mpsc::UnboundedReceiver<GatewayEvent>,
    chat: &Chat,
    user_id: Uuid,
    username: &str,
    handle: SessionHandle,
) {
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Forward queued events to the client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if !send_event(&mut sender, &event).await {
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
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let chat_recv = chat.clone();
    let username_recv = username.to_string();
    let mut recv_task = tokio::spawn(async move {
        let mut joined: HashSet<Uuid> = HashSet::new();

        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&chat_recv, user_id, &username_recv, &handle, &mut joined, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            username_recv,
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
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

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

/// Socket commands are live mirrors only; nothing here writes to the store.
/// Membership is checked on `room:join` and again on every `chat:group`.
/// The sender id on relayed chat events is always the authenticated user.
async fn handle_command(
    chat: &Chat,
    user_id: Uuid,
    username: &str,
    handle: &SessionHandle,
    joined: &mut HashSet<Uuid>,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::UserConnect { user_id: claimed } => {
            if claimed != user_id {
                warn!("{} ({}) tried to re-announce as {}", username, user_id, claimed);
            }
        }

        GatewayCommand::RoomJoin { room_id } => match chat.assert_member(room_id, user_id).await {
            Ok(_) => {
                chat.directory().join_room(room_id, handle.clone());
                joined.insert(room_id);
                debug!("{} ({}) joined room {}", username, user_id, room_id);
            }
            Err(e) => warn!("{} ({}) cannot join room {}: {}", username, user_id, room_id, e),
        },

        GatewayCommand::ChatPrivate { to_user_id, message, .. } => {
            let delivered = chat.directory().send_to_user(
                to_user_id,
                GatewayEvent::ChatPrivate {
                    message,
                    from_user_id: user_id,
                },
            );
            if !delivered {
                debug!("chat:private from {} to offline user {}", user_id, to_user_id);
            }
        }

        GatewayCommand::ChatGroup { room_id, message, .. } => {
            if !joined.contains(&room_id) {
                warn!("{} ({}) sent chat:group to unjoined room {}", username, user_id, room_id);
                return;
            }
            // Membership can end after the join
            if let Err(e) = chat.assert_member(room_id, user_id).await {
                warn!("{} ({}) dropped from room {}: {}", username, user_id, room_id, e);
                joined.remove(&room_id);
                chat.directory().leave_room(room_id, handle.conn_id());
                return;
            }
            chat.directory().room_broadcast(
                room_id,
                GatewayEvent::ChatGroup {
                    message,
                    from_user_id: user_id,
                    room_id,
                },
            );
        }
    }
}
