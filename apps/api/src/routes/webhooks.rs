use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::pipeline::webhook::{VideoProviderEvent, WebhookOutcome};
use crate::state::AppState;

/// POST /webhooks/video-provider
///
/// Responds 400 for payloads that cannot be parsed and 200 for everything
/// else, so the provider never retries on an unknown video id.
pub async fn handle_video_provider(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let event = match VideoProviderEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejected video provider webhook: {e}");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    info!(event = ?event, "Video provider webhook received");

    match state.pipeline.handle_video_webhook(event).await {
        Ok(WebhookOutcome::Attached { question_id }) => {
            info!(question_id = %question_id, "Question video attached from webhook")
        }
        Ok(WebhookOutcome::UnknownVideo) => info!("Webhook video id matched no question"),
        Ok(WebhookOutcome::Ignored) => {}
        Err(e) => error!("Video provider webhook processing failed: {e}"),
    }

    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
