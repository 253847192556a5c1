use crate::protocol::ClientMessage;
use crate::room::RoomEngine;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

/// Connection Session (`spec.md` §4.2): owns the socket, decodes inbound
/// frames, and drains the engine's outbound queue for this session until
/// either side closes.
pub(super) async fn handle_socket(socket: WebSocket, engine: Arc<RoomEngine>, room_id: String) {
    let session_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let mut rx = engine.join_session(&room_id, session_id);

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(message.as_ref()) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(%session_id, error = %err, "failed to serialize outbound message");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let receive_engine = Arc::clone(&engine);
    let receive_room_id = room_id.clone();
    let receive_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::debug!(%session_id, error = %err, "websocket error, closing connection");
                    break;
                }
            };

            match frame {
                Message::Text(text) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => {
                            receive_engine
                                .handle_message(&receive_room_id, session_id, message)
                                .await;
                        }
                        Err(err) => {
                            // Unknown type or malformed frame: dropped without
                            // terminating the connection (`spec.md` §4.2, §7).
                            tracing::debug!(%session_id, error = %err, "dropped malformed client frame");
                        }
                    }
                }
                Message::Close(_) => {
                    tracing::debug!(%session_id, "client closed websocket");
                    break;
                }
                _ => {
                    // Binary/ping/pong frames carry no protocol meaning here.
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = receive_task => {}
    }

    engine.leave(&room_id, session_id).await;
    tracing::debug!(%session_id, room_id = %room_id, "session closed");
}
