use crate::room::RoomEngine;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;

use super::connection::handle_socket;

/// `roomId` is optional and defaults to `"default"`, matching the original
/// handler's behavior of placing unscoped connections into a shared room.
#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    #[serde(rename = "roomId")]
    room_id: Option<String>,
}

/// WebSocket handler for the quiz room protocol.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<RoomQuery>,
    State(engine): State<Arc<RoomEngine>>,
) -> Response {
    let room_id = query.room_id.unwrap_or_else(|| "default".to_string());

    ws.on_upgrade(move |socket| handle_socket(socket, engine, room_id))
}
