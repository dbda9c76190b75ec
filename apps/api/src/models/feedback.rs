use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OverallFeedbackRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub overall_score: i32,
    pub summary: String,
    pub key_strengths: String,
    pub areas_for_improvement: String,
    pub recommendations: String,
    pub created_at: DateTime<Utc>,
}

/// Feedback payload produced by the feedback stage, before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    /// 0 – 100
    pub overall_score: i32,
    pub summary: String,
    pub key_strengths: String,
    pub areas_for_improvement: String,
    pub recommendations: String,
}
