//! Persistence seam for sessions, questions, answers and feedback.
//!
//! Every mutation the pipeline performs is a single-field, idempotent update
//! (attach a video URL, set a transcription, create feedback if absent), so
//! duplicate or concurrent deliveries need no explicit locking.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::answer::AnswerRow;
use crate::models::feedback::{NewFeedback, OverallFeedbackRow};
use crate::models::question::QuestionRow;
use crate::models::session::{InterviewCategory, InterviewSessionRow, NewSession, SessionStatus};

pub mod postgres;

pub use postgres::PgStore;

/// Recording metadata stored on an answer.
#[derive(Debug, Clone)]
pub struct RecordingRef {
    pub key: String,
    pub content_type: String,
}

#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn create_session(&self, session: NewSession) -> Result<InterviewSessionRow>;

    async fn get_session(&self, session_id: Uuid) -> Result<Option<InterviewSessionRow>>;

    /// Most recent first.
    async fn list_sessions(
        &self,
        user_id: Uuid,
        category: Option<InterviewCategory>,
    ) -> Result<Vec<InterviewSessionRow>>;

    /// Removes the session with its questions, answers and feedback.
    /// Returns false when the session does not exist for this user.
    async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn set_resume_key(&self, session_id: Uuid, key: &str) -> Result<()>;

    async fn set_status(&self, session_id: Uuid, status: SessionStatus) -> Result<()>;

    /// Compare-and-set. Returns true only if the session was in one of `from`.
    async fn transition_status(
        &self,
        session_id: Uuid,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<bool>;

    async fn mark_failed(&self, session_id: Uuid, reason: &str) -> Result<()>;

    /// Appends questions after any existing ones, preserving the given order.
    async fn insert_questions(
        &self,
        session_id: Uuid,
        contents: &[String],
    ) -> Result<Vec<QuestionRow>>;

    /// Ordered by creation position.
    async fn list_questions(&self, session_id: Uuid) -> Result<Vec<QuestionRow>>;

    async fn get_question(&self, question_id: Uuid) -> Result<Option<QuestionRow>>;

    async fn set_question_video_id(&self, question_id: Uuid, video_id: &str) -> Result<()>;

    /// Attaches the finished render URL to the question that owns `video_id`.
    async fn attach_video_url(&self, video_id: &str, url: &str) -> Result<Option<QuestionRow>>;

    async fn get_answer(&self, answer_id: Uuid) -> Result<Option<AnswerRow>>;

    async fn get_answer_for_question(&self, question_id: Uuid) -> Result<Option<AnswerRow>>;

    /// Creates the answer on first submission, otherwise replaces its recording.
    async fn save_answer_recording(
        &self,
        question_id: Uuid,
        recording: &RecordingRef,
    ) -> Result<AnswerRow>;

    /// Sets the transcription unless one is already present.
    async fn set_transcription(&self, answer_id: Uuid, text: &str) -> Result<bool>;

    async fn list_answers(&self, session_id: Uuid) -> Result<Vec<AnswerRow>>;

    async fn get_feedback(&self, session_id: Uuid) -> Result<Option<OverallFeedbackRow>>;

    /// Returns `None` if feedback already existed; the stored row is left untouched.
    async fn create_feedback_if_absent(
        &self,
        session_id: Uuid,
        feedback: &NewFeedback,
    ) -> Result<Option<OverallFeedbackRow>>;
}
