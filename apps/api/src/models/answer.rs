use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerRow {
    pub id: Uuid,
    pub question_id: Uuid,
    pub recording_key: Option<String>,
    pub recording_content_type: Option<String>,
    pub transcription: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnswerRow {
    pub fn is_transcribed(&self) -> bool {
        self.transcription
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}
