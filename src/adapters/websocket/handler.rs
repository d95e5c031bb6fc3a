//! WebSocket upgrade handler and connection lifecycle.
//!
//! 1. Upgrade to WebSocket
//! 2. First message must be `authenticate{token}`; it binds the channel to a
//!    user identity
//! 3. Join the user's room and ensure their session is initialized
//! 4. Forward room broadcasts (and caller-only replies) until disconnect
//! 5. Leave the room; the session itself lives on for later reconnects

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::application::{CheckPipeline, ObserverId, SessionManager, SubscriberRegistry};
use crate::domain::foundation::UserId;
use crate::domain::session::SessionEvent;
use crate::ports::TokenService;

use super::messages::{ClientMessage, ServerMessage};

/// State required for WebSocket handling, extracted from the app state.
#[derive(Clone)]
pub struct WsState {
    pub sessions: Arc<SessionManager>,
    pub pipeline: Arc<CheckPipeline>,
    pub subscribers: Arc<SubscriberRegistry>,
    pub tokens: Arc<dyn TokenService>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`. Authentication happens in-band via the first message,
/// since browsers cannot set headers on WebSocket upgrades.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, mut receiver) = socket.split();

    // The channel does nothing until it is bound to a user.
    let user_id = match authenticate(&mut sender, &mut receiver, &state).await {
        Some(user_id) => user_id,
        None => return,
    };

    let observer_id = ObserverId::new();
    let room_rx = state.subscribers.subscribe(&user_id, observer_id.clone()).await;

    // Caller-only replies (validation errors, state sync) bypass the room.
    let (direct_tx, direct_rx) = mpsc::channel::<ServerMessage>(32);

    // Ensure the session exists; an observer connecting is what kicks off the
    // engine handshake.
    if let Err(e) = state.sessions.init(user_id).await {
        warn!(user_id = %user_id, error = %e, "session init failed on connect");
        let _ = direct_tx
            .send(ServerMessage::Error {
                message: e.message.clone(),
            })
            .await;
    }

    // Late joiners see current state without waiting for the next natural
    // transition.
    if let Some(identity) = state.sessions.identity(&user_id).await {
        let _ = direct_tx
            .send(ServerMessage::Authenticated {
                account_name: identity.display_name,
                account_number: identity.address_id,
            })
            .await;
    }

    let mut send_task = tokio::spawn(forward_events(sender, room_rx, direct_rx));

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    handle_client_message(&text, user_id, &recv_state, &direct_tx).await;
                }
                Ok(Message::Close(_)) => {
                    debug!(user_id = %user_id, "observer sent close frame");
                    break;
                }
                Ok(_) => {
                    // Binary frames are not part of the protocol; protocol
                    // pings are answered by axum.
                }
                Err(e) => {
                    debug!(user_id = %user_id, "receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.subscribers.unsubscribe(&observer_id).await;
    debug!(user_id = %user_id, observer_id = %observer_id, "observer disconnected");
}

/// Reads messages until a valid `authenticate` arrives, or gives up.
async fn authenticate(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
    state: &WsState,
) -> Option<UserId> {
    while let Some(result) = receiver.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Authenticate { token }) => {
                match state.tokens.validate(&token).await {
                    Ok(user) => return Some(user.id),
                    Err(e) => {
                        // Invalid credential terminates the channel.
                        let _ = send_message(
                            sender,
                            &ServerMessage::Error {
                                message: e.to_string(),
                            },
                        )
                        .await;
                        let _ = sender.close().await;
                        return None;
                    }
                }
            }
            _ => {
                let _ = send_message(
                    sender,
                    &ServerMessage::Error {
                        message: "Authentication required".to_string(),
                    },
                )
                .await;
            }
        }
    }
    None
}

/// Forwards room broadcasts and caller-only replies to the observer, in
/// arrival order, until either source or the socket closes.
async fn forward_events(
    mut sender: SplitSink<WebSocket, Message>,
    mut room_rx: broadcast::Receiver<SessionEvent>,
    mut direct_rx: mpsc::Receiver<ServerMessage>,
) {
    loop {
        let message = tokio::select! {
            event = room_rx.recv() => match event {
                Ok(event) => ServerMessage::from(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "observer lagged; dropping missed events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            reply = direct_rx.recv() => match reply {
                Some(reply) => reply,
                None => break,
            },
        };

        if send_message(&mut sender, &message).await.is_err() {
            break;
        }
    }
}

async fn handle_client_message(
    text: &str,
    user_id: UserId,
    state: &WsState,
    direct_tx: &mpsc::Sender<ServerMessage>,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            let _ = direct_tx
                .send(ServerMessage::Error {
                    message: format!("Malformed message: {}", e),
                })
                .await;
            return;
        }
    };

    match message {
        ClientMessage::StartCheck { numbers } => {
            let pipeline = state.pipeline.clone();
            let direct_tx = direct_tx.clone();
            // The run outlives this message; progress flows through the room.
            tokio::spawn(async move {
                if let Err(e) = pipeline.run(user_id, numbers).await {
                    // Caller-only: rejections (bad input, session not ready,
                    // run already active) never reach other observers.
                    let _ = direct_tx
                        .send(ServerMessage::Error {
                            message: e.message.clone(),
                        })
                        .await;
                }
            });
        }
        ClientMessage::StopCheck => {
            if !state.sessions.cancel_run(&user_id).await {
                debug!(user_id = %user_id, "stop requested with no active run");
            }
        }
        ClientMessage::Authenticate { .. } => {
            // Already bound; re-authentication on a live channel is ignored.
        }
    }
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json =
        serde_json::to_string(message).expect("ServerMessage serialization should not fail");
    sender.send(Message::Text(json)).await
}
