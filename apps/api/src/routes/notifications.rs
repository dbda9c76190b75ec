use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::notifications::NotificationHub;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/notifications/ws?user_id=
///
/// Upgrades to a WebSocket that streams the user's notifications as JSON text
/// frames. Inbound frames other than close are ignored.
pub async fn handle_notifications_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.notifications, query.user_id))
}

async fn handle_socket(socket: WebSocket, hub: Arc<NotificationHub>, user_id: Uuid) {
    let (conn_id, mut rx) = hub.connect(user_id).await;
    let connections = hub.connection_count().await;
    tracing::info!(
        conn_id = %conn_id,
        user_id = %user_id,
        connections,
        "Notification socket connected"
    );

    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload)).await.is_err() {
                tracing::debug!(conn_id = %conn_id, "Notification socket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "Notification socket receive error");
                break;
            }
        }
    }

    hub.disconnect(conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Notification socket disconnected");
}
