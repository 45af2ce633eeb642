use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::error::ProctorError;
use crate::proctor::{ClientEvent, ProctorHub, ProctorSession, ServerEvent};

pub async fn handle_alert_websocket(websocket: WebSocket, hub: Arc<ProctorHub>) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let session = hub.open_session(tx).await;
    let connection_id = session.connection_id();

    // Spawn task to send events to client
    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize outbound event");
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::text(text)).await {
                tracing::warn!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) if message.is_close() => break,
            Ok(message) => handle_websocket_message(&session, message).await,
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    session.close().await;
    sender_task.abort();
}

async fn handle_websocket_message(session: &ProctorSession, message: Message) {
    let Ok(text) = message.to_str() else {
        return;
    };

    match parse_client_event(text) {
        Ok(event) => session.handle_message(event).await,
        Err(e) => {
            tracing::warn!(
                connection_id = %session.connection_id(),
                error = %e,
                raw_message = %text,
                "Ignoring unparseable channel message"
            );
        }
    }
}

fn parse_client_event(text: &str) -> Result<ClientEvent, ProctorError> {
    serde_json::from_str(text).map_err(|e| ProctorError::InvalidMessage(e.to_string()))
}
