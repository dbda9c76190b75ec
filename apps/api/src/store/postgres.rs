use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::answer::AnswerRow;
use crate::models::feedback::{NewFeedback, OverallFeedbackRow};
use crate::models::question::QuestionRow;
use crate::models::session::{InterviewCategory, InterviewSessionRow, NewSession, SessionStatus};
use crate::store::{InterviewStore, RecordingRef};

/// Postgres-backed store. Cascading deletes are enforced by the schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InterviewStore for PgStore {
    async fn create_session(&self, session: NewSession) -> Result<InterviewSessionRow> {
        let row = sqlx::query_as::<_, InterviewSessionRow>(
            r#"
            INSERT INTO interview_sessions
                (id, user_id, title, job_url, interview_category, position_level,
                 questions_count, custom_requirements, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(&session.title)
        .bind(&session.job_url)
        .bind(session.category.as_str())
        .bind(session.level.as_str())
        .bind(session.questions_count)
        .bind(&session.custom_requirements)
        .bind(SessionStatus::Created.as_str())
        .fetch_one(&self.pool)
        .await?;

        info!("Created interview session {} for user {}", row.id, row.user_id);
        Ok(row)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<InterviewSessionRow>> {
        Ok(sqlx::query_as::<_, InterviewSessionRow>(
            "SELECT * FROM interview_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        category: Option<InterviewCategory>,
    ) -> Result<Vec<InterviewSessionRow>> {
        Ok(sqlx::query_as::<_, InterviewSessionRow>(
            r#"
            SELECT * FROM interview_sessions
            WHERE user_id = $1 AND ($2::text IS NULL OR interview_category = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM interview_sessions WHERE id = $1 AND user_id = $2")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_resume_key(&self, session_id: Uuid, key: &str) -> Result<()> {
        sqlx::query("UPDATE interview_sessions SET resume_key = $2, updated_at = now() WHERE id = $1")
            .bind(session_id)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_status(&self, session_id: Uuid, status: SessionStatus) -> Result<()> {
        sqlx::query("UPDATE interview_sessions SET status = $2, updated_at = now() WHERE id = $1")
            .bind(session_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn transition_status(
        &self,
        session_id: Uuid,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<bool> {
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let result = sqlx::query(
            r#"
            UPDATE interview_sessions
            SET status = $3, updated_at = now()
            WHERE id = $1 AND status = ANY($2)
            "#,
        )
        .bind(session_id)
        .bind(&from)
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(&self, session_id: Uuid, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE interview_sessions
            SET status = $2, failure_reason = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(SessionStatus::Failed.as_str())
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_questions(
        &self,
        session_id: Uuid,
        contents: &[String],
    ) -> Result<Vec<QuestionRow>> {
        let mut tx = self.pool.begin().await?;

        let current_max: Option<i32> =
            sqlx::query_scalar("SELECT MAX(position) FROM questions WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await?;
        let start = current_max.map(|p| p + 1).unwrap_or(0);

        let mut rows = Vec::with_capacity(contents.len());
        for (offset, content) in contents.iter().enumerate() {
            let row = sqlx::query_as::<_, QuestionRow>(
                r#"
                INSERT INTO questions (id, session_id, position, content)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(start + offset as i32)
            .bind(content)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }

        tx.commit().await?;
        Ok(rows)
    }

    async fn list_questions(&self, session_id: Uuid) -> Result<Vec<QuestionRow>> {
        Ok(sqlx::query_as::<_, QuestionRow>(
            "SELECT * FROM questions WHERE session_id = $1 ORDER BY position ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_question(&self, question_id: Uuid) -> Result<Option<QuestionRow>> {
        Ok(
            sqlx::query_as::<_, QuestionRow>("SELECT * FROM questions WHERE id = $1")
                .bind(question_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn set_question_video_id(&self, question_id: Uuid, video_id: &str) -> Result<()> {
        sqlx::query("UPDATE questions SET video_id = $2, updated_at = now() WHERE id = $1")
            .bind(question_id)
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn attach_video_url(&self, video_id: &str, url: &str) -> Result<Option<QuestionRow>> {
        Ok(sqlx::query_as::<_, QuestionRow>(
            r#"
            UPDATE questions
            SET video_url = $2, updated_at = now()
            WHERE video_id = $1
            RETURNING *
            "#,
        )
        .bind(video_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_answer(&self, answer_id: Uuid) -> Result<Option<AnswerRow>> {
        Ok(
            sqlx::query_as::<_, AnswerRow>("SELECT * FROM answers WHERE id = $1")
                .bind(answer_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_answer_for_question(&self, question_id: Uuid) -> Result<Option<AnswerRow>> {
        Ok(
            sqlx::query_as::<_, AnswerRow>("SELECT * FROM answers WHERE question_id = $1")
                .bind(question_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn save_answer_recording(
        &self,
        question_id: Uuid,
        recording: &RecordingRef,
    ) -> Result<AnswerRow> {
        Ok(sqlx::query_as::<_, AnswerRow>(
            r#"
            INSERT INTO answers (id, question_id, recording_key, recording_content_type)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (question_id) DO UPDATE
                SET recording_key = EXCLUDED.recording_key,
                    recording_content_type = EXCLUDED.recording_content_type,
                    updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(question_id)
        .bind(&recording.key)
        .bind(&recording.content_type)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn set_transcription(&self, answer_id: Uuid, text: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE answers
            SET transcription = $2, updated_at = now()
            WHERE id = $1 AND (transcription IS NULL OR transcription = '')
            "#,
        )
        .bind(answer_id)
        .bind(text)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_answers(&self, session_id: Uuid) -> Result<Vec<AnswerRow>> {
        Ok(sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT a.* FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE q.session_id = $1
            ORDER BY q.position ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_feedback(&self, session_id: Uuid) -> Result<Option<OverallFeedbackRow>> {
        Ok(sqlx::query_as::<_, OverallFeedbackRow>(
            "SELECT * FROM overall_feedbacks WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_feedback_if_absent(
        &self,
        session_id: Uuid,
        feedback: &NewFeedback,
    ) -> Result<Option<OverallFeedbackRow>> {
        Ok(sqlx::query_as::<_, OverallFeedbackRow>(
            r#"
            INSERT INTO overall_feedbacks
                (id, session_id, overall_score, summary, key_strengths,
                 areas_for_improvement, recommendations)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (session_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(feedback.overall_score)
        .bind(&feedback.summary)
        .bind(&feedback.key_strengths)
        .bind(&feedback.areas_for_improvement)
        .bind(&feedback.recommendations)
        .fetch_optional(&self.pool)
        .await?)
    }
}
