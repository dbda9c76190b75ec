use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::answer::AnswerRow;
use crate::models::question::QuestionRow;

pub const DEFAULT_QUESTIONS_COUNT: i32 = 5;
pub const MAX_QUESTIONS_COUNT: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterviewCategory {
    General,
    Technical,
    Behavioral,
    #[serde(rename = "System Design")]
    SystemDesign,
    Coding,
    Leadership,
}

impl InterviewCategory {
    pub const ALL: [InterviewCategory; 6] = [
        InterviewCategory::General,
        InterviewCategory::Technical,
        InterviewCategory::Behavioral,
        InterviewCategory::SystemDesign,
        InterviewCategory::Coding,
        InterviewCategory::Leadership,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewCategory::General => "General",
            InterviewCategory::Technical => "Technical",
            InterviewCategory::Behavioral => "Behavioral",
            InterviewCategory::SystemDesign => "System Design",
            InterviewCategory::Coding => "Coding",
            InterviewCategory::Leadership => "Leadership",
        }
    }
}

impl FromStr for InterviewCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("'{s}' is not a valid interview category"))
    }
}

impl fmt::Display for InterviewCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionLevel {
    Intern,
    Junior,
    #[serde(rename = "Mid-Level")]
    MidLevel,
    Senior,
    Lead,
    Principal,
    Executive,
}

impl PositionLevel {
    pub const ALL: [PositionLevel; 7] = [
        PositionLevel::Intern,
        PositionLevel::Junior,
        PositionLevel::MidLevel,
        PositionLevel::Senior,
        PositionLevel::Lead,
        PositionLevel::Principal,
        PositionLevel::Executive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionLevel::Intern => "Intern",
            PositionLevel::Junior => "Junior",
            PositionLevel::MidLevel => "Mid-Level",
            PositionLevel::Senior => "Senior",
            PositionLevel::Lead => "Lead",
            PositionLevel::Principal => "Principal",
            PositionLevel::Executive => "Executive",
        }
    }
}

impl FromStr for PositionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("'{s}' is not a valid position level"))
    }
}

impl fmt::Display for PositionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored pipeline state of a session. Only `Pipeline::apply` writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    QuestionsPending,
    QuestionsGenerated,
    VideosPending,
    Ready,
    Answering,
    FeedbackPending,
    Complete,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::QuestionsPending => "questions_pending",
            SessionStatus::QuestionsGenerated => "questions_generated",
            SessionStatus::VideosPending => "videos_pending",
            SessionStatus::Ready => "ready",
            SessionStatus::Answering => "answering",
            SessionStatus::FeedbackPending => "feedback_pending",
            SessionStatus::Complete => "complete",
            SessionStatus::Failed => "failed",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "created" => SessionStatus::Created,
            "questions_pending" => SessionStatus::QuestionsPending,
            "questions_generated" => SessionStatus::QuestionsGenerated,
            "videos_pending" => SessionStatus::VideosPending,
            "ready" => SessionStatus::Ready,
            "answering" => SessionStatus::Answering,
            "feedback_pending" => SessionStatus::FeedbackPending,
            "complete" => SessionStatus::Complete,
            "failed" => SessionStatus::Failed,
            other => return Err(format!("unknown session status '{other}'")),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewSessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub job_url: Option<String>,
    pub interview_category: String,
    pub position_level: String,
    pub questions_count: i32,
    pub custom_requirements: Option<String>,
    pub resume_key: Option<String>,
    pub status: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewSessionRow {
    /// Unknown values (e.g. written by an older build) read as `Created`.
    pub fn status(&self) -> SessionStatus {
        self.status.parse().unwrap_or(SessionStatus::Created)
    }
}

/// Validated input for a new session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub title: String,
    pub job_url: Option<String>,
    pub category: InterviewCategory,
    pub level: PositionLevel,
    pub questions_count: i32,
    pub custom_requirements: Option<String>,
}

/// Derived readiness and completion flags. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub total_questions: usize,
    pub videos_attached: usize,
    pub answered: usize,
    /// Every question has a finished video.
    pub ready: bool,
    /// Every question has an answer.
    pub complete: bool,
}

impl SessionProgress {
    /// A session without questions is neither ready nor complete.
    pub fn compute(questions: &[QuestionRow], answers: &[AnswerRow]) -> Self {
        let answered_ids: HashSet<Uuid> = answers.iter().map(|a| a.question_id).collect();
        let videos_attached = questions.iter().filter(|q| q.has_video()).count();
        let answered = questions
            .iter()
            .filter(|q| answered_ids.contains(&q.id))
            .count();
        let total = questions.len();

        SessionProgress {
            total_questions: total,
            videos_attached,
            answered,
            ready: total > 0 && videos_attached == total,
            complete: total > 0 && answered == total,
        }
    }
}
