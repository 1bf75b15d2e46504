//! WebSocket Handler
//!
//! Upgrades `/ws?user_id=...` and streams that user's events until either
//! side closes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use super::hub::EventHub;
use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: String,
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.events);
    ws.on_upgrade(move |socket| handle_socket(socket, hub, params.user_id))
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> bool {
    match serde_json::to_string(message) {
        Ok(text) => sender.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, hub: Arc<EventHub>, user_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let connection_id = match hub.register(&user_id).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register WebSocket connection");
            let _ = send_message(
                &mut sender,
                &ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    let connected = ServerMessage::Connected {
        connection_id: connection_id.clone(),
        user_id: user_id.clone(),
    };
    if !send_message(&mut sender, &connected).await {
        hub.unregister(&connection_id).await;
        return;
    }

    let mut events = hub.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                let message = match event {
                    Ok(event) if event.user_id() == user_id => ServerMessage::Event { event },
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => ServerMessage::Lagged { skipped },
                    Err(RecvError::Closed) => break,
                };
                if !send_message(&mut sender, &message).await {
                    tracing::debug!(connection_id = %connection_id, "WebSocket send failed, closing connection");
                    break;
                }
            }
            incoming = receiver.next() => {
                let reply = match incoming {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Ping) => Some(ServerMessage::Pong),
                        Err(e) => Some(ServerMessage::Error {
                            message: format!("Invalid message format: {}", e),
                        }),
                    },
                    Some(Ok(Message::Binary(_))) => Some(ServerMessage::Error {
                        message: "Binary messages not supported".to_string(),
                    }),
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => None,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                        break;
                    }
                };
                if let Some(reply) = reply {
                    if !send_message(&mut sender, &reply).await {
                        break;
                    }
                }
            }
        }
    }

    hub.unregister(&connection_id).await;
}
