use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::feedback::OverallFeedbackRow;
use crate::routes::auth::CurrentUser;
use crate::state::AppState;

/// GET /api/v1/sessions/:id/feedback
///
/// 404 until the feedback stage has stored a result.
pub async fn handle_get_feedback(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<OverallFeedbackRow>, AppError> {
    state
        .pipeline
        .load_owned_session(session_id, user_id)
        .await?;

    state
        .pipeline
        .feedback(session_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Feedback has not been generated yet".to_string()))
}
