//! Axum route handlers for interview sessions.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::session::{InterviewCategory, InterviewSessionRow, SessionProgress};
use crate::pipeline::sessions::{ResumeUpload, SessionDetail, SessionForm};
use crate::routes::auth::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshVideosResponse {
    pub attached: usize,
    pub progress: SessionProgress,
}

/// POST /api/v1/sessions
///
/// Multipart form: `title`, `category`, `position_level`, optional `job_url`,
/// `questions_count`, `custom_requirements` and a `resume` PDF file.
pub async fn handle_create_session(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<InterviewSessionRow>), AppError> {
    let mut form = SessionForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "resume" {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?;
            // An empty file input means no resume was chosen.
            if !bytes.is_empty() {
                form.resume = Some(ResumeUpload { bytes, file_name });
            }
            continue;
        }

        let slot = match name.as_str() {
            "title" => &mut form.title,
            "job_url" => &mut form.job_url,
            "category" | "interview_category" => &mut form.category,
            "position_level" => &mut form.position_level,
            "questions_count" => &mut form.questions_count,
            "custom_requirements" => &mut form.custom_requirements,
            _ => continue,
        };
        *slot = Some(
            field
                .text()
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?,
        );
    }

    let (new_session, resume) = form
        .validate(user_id)
        .map_err(|errors| AppError::Validation(errors.join("; ")))?;

    let session = state.pipeline.create_session(new_session, resume).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/sessions[?category=]
///
/// Most recent first.
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<InterviewSessionRow>>, AppError> {
    let category = query
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(str::parse::<InterviewCategory>)
        .transpose()
        .map_err(AppError::Validation)?;

    let sessions = state.pipeline.list_sessions(user_id, category).await?;
    Ok(Json(sessions))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionDetail>, AppError> {
    state
        .pipeline
        .load_owned_session(session_id, user_id)
        .await?;
    let detail = state.pipeline.session_detail(session_id).await?;
    Ok(Json(detail))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.pipeline.delete_session(session_id, user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "InterviewSession {session_id} not found"
        )))
    }
}

/// POST /api/v1/sessions/:id/videos/refresh
///
/// Pulls render status from the avatar provider for videos the webhook has
/// not delivered yet.
pub async fn handle_refresh_videos(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<RefreshVideosResponse>, AppError> {
    state
        .pipeline
        .load_owned_session(session_id, user_id)
        .await?;
    let attached = state.pipeline.refresh_video_status(session_id).await?;
    let progress = state.pipeline.progress(session_id).await?;
    Ok(Json(RefreshVideosResponse { attached, progress }))
}
