//! WebSocket endpoints
//!
//! Two upgrade points: `/ws` registers a global connection that sees every
//! broadcast, `/ws/{entity_type}/{entity_id}` scopes the connection to one
//! entity. Each socket task owns the receiving end of its registry channel
//! and pumps broadcasts onto the wire; inbound traffic is limited to the
//! `ping`/`pong` keepalive. Either side closing tears the registration down.

use axum::extract::{
    ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    Path, State,
};
use axum::response::IntoResponse;
use tokio::sync::mpsc;
use tracing::debug;

use crate::registry::Scope;
use crate::routes::AppState;

const OUTBOUND_BUFFER: usize = 32;

pub async fn ws_global(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, None))
}

pub async fn ws_entity(
    ws: WebSocketUpgrade,
    Path((entity_type, entity_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Some((entity_type, entity_id))))
}

/// Reply for an inbound control frame, if the text is one.
fn control_reply(text: &str) -> Option<&'static str> {
    (text == "ping").then_some("pong")
}

async fn handle_socket(mut socket: WebSocket, state: AppState, scope: Scope) {
    let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
    let conn = state.registry.connection(tx);
    let conn_id = conn.id();
    state.registry.connect(conn, scope.clone()).await;
    debug!(conn_id, ?scope, "websocket connected");

    loop {
        tokio::select! {
            // Broadcasts fanned out by the registry
            outbound = rx.recv() => {
                match outbound {
                    Some(text) => {
                        if socket.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            // Frames from this client: keepalive only
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(reply) = control_reply(&text) {
                            if socket.send(WsMessage::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.registry.disconnect(conn_id, &scope).await;
    debug!(conn_id, "websocket disconnected");
}
