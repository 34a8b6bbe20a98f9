// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signaling WebSocket upgrade handler (§4.7, §6).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};

use teleop_crypto::token::CapabilityToken;
use teleop_proto::signaling::{PeerRole, SignalMessage};

use crate::state::GatewayState;

/// `GET /v1/signal` (§4.8): upgrade to the signaling hub. The first message
/// on the socket must be `join`; everything before it is discarded.
pub async fn signal_handler(
    State(state): State<Arc<GatewayState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (session_id, role) = loop {
        match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<SignalMessage>(&text) {
                Ok(SignalMessage::Join { session_id, role, token }) => {
                    if !authenticate(&state, &session_id, role, token.as_deref()) {
                        let _ = send(&mut ws_tx, SignalMessage::error("UNAUTHORIZED", "join rejected")).await;
                        return;
                    }
                    break (session_id, role);
                }
                Ok(_) => {
                    let _ = send(&mut ws_tx, SignalMessage::error("INVALID_MESSAGE", "expected join")).await;
                    continue;
                }
                Err(_) => {
                    let _ = send(&mut ws_tx, SignalMessage::error("INVALID_MESSAGE", "malformed json")).await;
                    continue;
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(_)) => return,
        }
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SignalMessage>();
    let room = state.hub.room(&session_id);
    if room.join(role, tx) {
        room.send_to_both(SignalMessage::SessionState {
            session_id: session_id.clone(),
            state: "ready".to_string(),
        });
    }

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => {
                        if send(&mut ws_tx, message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<SignalMessage>(&text) {
                            Ok(message) if matches!(message, SignalMessage::Leave { .. }) => {
                                break;
                            }
                            Ok(message) => {
                                room.relay(role, message);
                            }
                            Err(_) => {
                                let _ = send(&mut ws_tx, SignalMessage::error("INVALID_MESSAGE", "malformed json")).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    if room.leave(role) {
        state.hub.remove_room(&session_id);
    }
}

async fn send(
    tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    message: SignalMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(&message).unwrap_or_else(|_| "{}".to_string());
    tx.send(Message::Text(text.into())).await
}

/// Operators must present a capability token bound to this session and
/// still valid in the registry; a robot's identity is the session it was
/// dispatched to, established out of band at provisioning (§4.7).
fn authenticate(state: &GatewayState, session_id: &str, role: PeerRole, token: Option<&str>) -> bool {
    match role {
        PeerRole::Robot => true,
        PeerRole::Operator => {
            let Some(token) = token else { return false };
            let Ok(token) = CapabilityToken::decode(token) else { return false };
            if token.payload.sid != session_id {
                return false;
            }
            if token.verify_signature(&state.key_manager.verifying_key()).is_err() {
                return false;
            }
            state.registry.is_valid(&token.payload.jti, Utc::now())
        }
    }
}
