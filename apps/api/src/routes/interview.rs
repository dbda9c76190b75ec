//! Interview-taking endpoints. JSON failures use `{success: false, error}`
//! so the recording client can treat every response uniformly.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::errors::{AppError, PipelineError};
use crate::pipeline::answers::{
    AdvanceOutcome, CurrentQuestion, Recording, DEFAULT_RECORDING_TYPE,
};
use crate::routes::auth::CurrentUser;
use crate::state::AppState;

/// `AppError` rendered in the interview endpoints' envelope.
#[derive(Debug)]
pub struct InterviewError(AppError);

impl From<AppError> for InterviewError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<PipelineError> for InterviewError {
    fn from(err: PipelineError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for InterviewError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let body = Json(json!({
            "success": false,
            "error": self.0.public_message()
        }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CurrentQuestionQuery {
    pub question_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub content: String,
    pub video_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CurrentQuestionResponse {
    pub question: QuestionView,
    pub question_number: usize,
    pub total_questions: usize,
    pub answered: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub question_id: Uuid,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AdvanceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_number: Option<usize>,
    pub has_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl From<AdvanceOutcome> for AdvanceResponse {
    fn from(outcome: AdvanceOutcome) -> Self {
        match outcome {
            AdvanceOutcome::Next {
                question_id,
                question_number,
            } => AdvanceResponse {
                success: true,
                next_question_id: Some(question_id),
                question_number: Some(question_number),
                has_next: true,
                redirect_url: None,
            },
            AdvanceOutcome::Finished { redirect_url } => AdvanceResponse {
                success: true,
                next_question_id: None,
                question_number: None,
                has_next: false,
                redirect_url: Some(redirect_url),
            },
        }
    }
}

/// GET /api/v1/sessions/:id/interview[?question_id=]
///
/// 409 while any question video is still rendering.
pub async fn handle_current_question(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
    Query(query): Query<CurrentQuestionQuery>,
) -> Result<Json<CurrentQuestionResponse>, AppError> {
    state
        .pipeline
        .load_owned_session(session_id, user_id)
        .await?;

    match state
        .pipeline
        .current_question(session_id, query.question_id)
        .await?
    {
        CurrentQuestion::NotReady(progress) => Err(AppError::Conflict(format!(
            "Interview is not ready yet: {} of {} question videos are available",
            progress.videos_attached, progress.total_questions
        ))),
        CurrentQuestion::Question {
            question,
            number,
            total,
            answered,
        } => Ok(Json(CurrentQuestionResponse {
            question: QuestionView {
                id: question.id,
                content: question.content,
                video_url: question.video_url,
            },
            question_number: number,
            total_questions: total,
            answered,
        })),
    }
}

/// POST /api/v1/sessions/:id/answers
///
/// Multipart form: `question_id` and a `video` recording. Returns once the
/// recording is stored; transcription runs in the background.
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SubmitAnswerResponse>, InterviewError> {
    state
        .pipeline
        .load_owned_session(session_id, user_id)
        .await?;

    let mut question_id: Option<String> = None;
    let mut recording: Option<Recording> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "question_id" => {
                question_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            "video" => {
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_RECORDING_TYPE)
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                if !bytes.is_empty() {
                    recording = Some(Recording {
                        bytes,
                        content_type,
                    });
                }
            }
            _ => {}
        }
    }

    let question_id = question_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("question_id is required".to_string()))?;
    let question_id = Uuid::parse_str(question_id)
        .map_err(|_| AppError::Validation("question_id is not a valid id".to_string()))?;
    let recording =
        recording.ok_or_else(|| AppError::UnprocessableEntity("No video provided".to_string()))?;

    state
        .pipeline
        .submit_answer(session_id, question_id, recording)
        .await?;

    Ok(Json(SubmitAnswerResponse {
        success: true,
        message: "Answer saved successfully".to_string(),
    }))
}

/// POST /api/v1/sessions/:id/advance
pub async fn handle_advance(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<AdvanceResponse>, InterviewError> {
    state
        .pipeline
        .load_owned_session(session_id, user_id)
        .await?;

    let outcome = state
        .pipeline
        .advance(session_id, request.question_id)
        .await?;
    Ok(Json(outcome.into()))
}
