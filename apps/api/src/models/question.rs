use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub session_id: Uuid,
    /// 0-based creation order within the session.
    pub position: i32,
    pub content: String,
    /// Render job id returned by the avatar provider.
    pub video_id: Option<String>,
    /// Set only by the provider callback (or a status refresh) once the render finishes.
    pub video_url: Option<String>,
    pub attachment_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuestionRow {
    pub fn has_video(&self) -> bool {
        self.video_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}
