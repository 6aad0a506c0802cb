//! WebSocket push endpoint for live in-app notifications.
//!
//! Protocol:
//! ← Server sends: {"event":"connected"}
//! ← Server sends: {"event":"notification","data":{...}} for each delivery
//!
//! Clients authenticate with `?token=<jwt>` because browsers cannot set an
//! Authorization header on a WebSocket handshake. A connection joins both the
//! recipient room and the role room from its claims.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::routes::auth::{decode_jwt, Claims};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

/// WebSocket upgrade handler. Rejects before upgrading when the token is bad.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let claims = decode_jwt(&state.config.jwt.secret, &query.token).map_err(|e| {
        tracing::debug!("WebSocket token rejected: {:?}", e);
        AppError::Unauthorized
    })?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, claims)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, claims: Claims) {
    tracing::info!(user = %claims.sub, role = %claims.role, "WebSocket client connected");

    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn_id = state.push.register(&claims.sub, &claims.role, tx).await;

    let greeting = serde_json::json!({ "event": "connected" });
    if sink.send(Message::Text(greeting.to_string())).await.is_err() {
        state.push.unregister(&claims.sub, &claims.role, conn_id).await;
        return;
    }

    loop {
        tokio::select! {
            notification = rx.recv() => {
                let Some(notification) = notification else { break };
                let frame = serde_json::json!({
                    "event": "notification",
                    "data": notification,
                });
                if sink.send(Message::Text(frame.to_string())).await.is_err() {
                    tracing::debug!(user = %claims.sub, "WebSocket send failed, dropping connection");
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(user = %claims.sub, "WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(user = %claims.sub, "WebSocket error: {e}");
                        break;
                    }
                    // Inbound text/binary frames carry no meaning here.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.push.unregister(&claims.sub, &claims.role, conn_id).await;
}
