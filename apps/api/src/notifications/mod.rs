//! Best-effort, user-scoped real-time notifications.
//!
//! Delivery is fire-and-forget: nothing is persisted and a user with no open
//! connection simply misses the message. Pipeline state never depends on it;
//! clients can always recompute it from `GET /api/v1/sessions/:id`.

use serde::Serialize;
use uuid::Uuid;

pub mod hub;

pub use hub::NotificationHub;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SessionReady,
    FeedbackReady,
    GenerationFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub session_id: Uuid,
    pub title: String,
    pub message: String,
    pub link_url: String,
    pub link_text: String,
    pub icon: String,
}

impl Notification {
    pub fn session_ready(session_id: Uuid, title: &str, host: &str) -> Self {
        Self {
            kind: NotificationKind::SessionReady,
            session_id,
            title: "Interview Ready!".to_string(),
            message: format!("All question videos for \"{title}\" are ready. You can start your interview."),
            link_url: link(host, &format!("/sessions/{session_id}/interview")),
            link_text: "Start Interview".to_string(),
            icon: "play".to_string(),
        }
    }

    pub fn feedback_ready(session_id: Uuid, score: i32, host: &str) -> Self {
        Self {
            kind: NotificationKind::FeedbackReady,
            session_id,
            title: "Feedback Ready!".to_string(),
            message: format!("Your interview feedback is ready. Score: {score}/100"),
            link_url: link(host, &format!("/sessions/{session_id}/feedback")),
            link_text: "View Feedback".to_string(),
            icon: score_icon(score).to_string(),
        }
    }

    pub fn generation_failed(session_id: Uuid, stage: &str, host: &str) -> Self {
        Self {
            kind: NotificationKind::GenerationFailed,
            session_id,
            title: "Something went wrong".to_string(),
            message: format!("We could not complete {stage} for your interview session."),
            link_url: link(host, &format!("/sessions/{session_id}")),
            link_text: "View Session".to_string(),
            icon: "alert".to_string(),
        }
    }
}

fn link(host: &str, path: &str) -> String {
    format!("{}{}", host.trim_end_matches('/'), path)
}

pub fn score_icon(score: i32) -> &'static str {
    match score {
        80..=100 => "star",
        60..=79 => "check",
        40..=59 => "trending-up",
        _ => "book",
    }
}
