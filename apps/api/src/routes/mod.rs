pub mod auth;
pub mod feedback;
pub mod health;
pub mod interview;
pub mod notifications;
pub mod sessions;
pub mod webhooks;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pipeline::WEBHOOK_PATH;
use crate::state::AppState;

/// Upper bound for multipart uploads (answer recordings, resumes).
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Provider callback, outside user auth
        .route(WEBHOOK_PATH, post(webhooks::handle_video_provider))
        // Sessions
        .route(
            "/api/v1/sessions",
            get(sessions::handle_list_sessions).post(sessions::handle_create_session),
        )
        .route(
            "/api/v1/sessions/:id",
            get(sessions::handle_get_session).delete(sessions::handle_delete_session),
        )
        .route(
            "/api/v1/sessions/:id/videos/refresh",
            post(sessions::handle_refresh_videos),
        )
        // Interview taking
        .route(
            "/api/v1/sessions/:id/interview",
            get(interview::handle_current_question),
        )
        .route(
            "/api/v1/sessions/:id/answers",
            post(interview::handle_submit_answer),
        )
        .route(
            "/api/v1/sessions/:id/advance",
            post(interview::handle_advance),
        )
        .route(
            "/api/v1/sessions/:id/feedback",
            get(feedback::handle_get_feedback),
        )
        .route(
            "/api/v1/notifications/ws",
            get(notifications::handle_notifications_ws),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
