use std::sync::Arc;

use crate::notifications::NotificationHub;
use crate::pipeline::Pipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Per-user WebSocket fan-out; the pipeline holds the same hub.
    pub notifications: Arc<NotificationHub>,
}
