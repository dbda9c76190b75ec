//! Overall feedback stage.
//!
//! Runs at most once per session. The model's JSON is parsed leniently; any
//! response that does not yield every required field is replaced by the
//! default payload so the session can still complete.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::llm_client::prompts::JSON_OBJECT_INSTRUCTION;
use crate::llm_client::ChatMessage;
use crate::models::answer::AnswerRow;
use crate::models::feedback::{NewFeedback, OverallFeedbackRow};
use crate::models::question::QuestionRow;
use crate::models::session::{InterviewSessionRow, SessionStatus};
use crate::pipeline::prompts::{FEEDBACK_SYSTEM, FEEDBACK_USER_TEMPLATE, NO_ANSWER_PLACEHOLDER};
use crate::pipeline::{Pipeline, SessionCommand};

const DEFAULT_SCORE: i32 = 50;

impl Pipeline {
    pub async fn feedback(
        &self,
        session_id: Uuid,
    ) -> Result<Option<OverallFeedbackRow>, PipelineError> {
        Ok(self.store.get_feedback(session_id).await?)
    }

    /// Returns the created row, or `None` if feedback already existed.
    pub async fn generate_feedback(
        &self,
        session_id: Uuid,
    ) -> Result<Option<OverallFeedbackRow>, PipelineError> {
        let session = self.load_session(session_id).await?;

        if let Some(existing) = self.store.get_feedback(session_id).await? {
            info!(session_id = %session_id, "Feedback already exists; skipping");
            // An earlier attempt stored the feedback but did not complete the session.
            if session.status() != SessionStatus::Complete {
                self.apply(SessionCommand::FeedbackGenerated {
                    session_id,
                    score: existing.overall_score,
                })
                .await?;
            }
            return Ok(None);
        }

        let questions = self.store.list_questions(session_id).await?;
        let answers = self.store.list_answers(session_id).await?;

        let messages = build_feedback_messages(&session, &questions, &answers);
        let response = self.llm.complete(&messages, None).await?;
        let feedback = parse_feedback(&response, questions.len());

        let Some(row) = self
            .store
            .create_feedback_if_absent(session_id, &feedback)
            .await?
        else {
            info!(session_id = %session_id, "Feedback was created concurrently; keeping it");
            return Ok(None);
        };

        info!(
            session_id = %session_id,
            score = row.overall_score,
            "Overall feedback generated"
        );
        self.apply(SessionCommand::FeedbackGenerated {
            session_id,
            score: row.overall_score,
        })
        .await?;

        Ok(Some(row))
    }
}

pub fn build_feedback_messages(
    session: &InterviewSessionRow,
    questions: &[QuestionRow],
    answers: &[AnswerRow],
) -> Vec<ChatMessage> {
    let transcripts: HashMap<Uuid, &str> = answers
        .iter()
        .filter_map(|a| {
            a.transcription
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(|t| (a.question_id, t))
        })
        .collect();

    let qa_block = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let answer = transcripts
                .get(&q.id)
                .copied()
                .unwrap_or(NO_ANSWER_PLACEHOLDER);
            format!("Question {}: {}\nAnswer: {}", i + 1, q.content, answer)
        })
        .collect::<Vec<_>>()
        .join("\n---\n");

    let user = FEEDBACK_USER_TEMPLATE
        .replace("{title}", &session.title)
        .replace("{level}", &session.position_level)
        .replace("{category}", &session.interview_category)
        .replace("{count}", &questions.len().to_string())
        .replace("{qa_block}", &qa_block);

    vec![
        ChatMessage::system(format!("{FEEDBACK_SYSTEM}\n\n{JSON_OBJECT_INSTRUCTION}")),
        ChatMessage::user(user),
    ]
}

pub fn default_feedback(question_count: usize) -> NewFeedback {
    NewFeedback {
        overall_score: DEFAULT_SCORE,
        summary: format!("Interview completed with {question_count} questions answered."),
        key_strengths: "Completed all questions in the interview session.".to_string(),
        areas_for_improvement: "Could not generate detailed feedback at this time.".to_string(),
        recommendations: "Review your answers and practice more interviews to improve your skills."
            .to_string(),
    }
}

/// Parses the model response, falling back to `default_feedback`.
pub fn parse_feedback(text: &str, question_count: usize) -> NewFeedback {
    match try_parse_feedback(text) {
        Some(feedback) => feedback,
        None => {
            warn!("Feedback response was not usable JSON; using default feedback");
            default_feedback(question_count)
        }
    }
}

fn try_parse_feedback(text: &str) -> Option<NewFeedback> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: Value = serde_json::from_str(&text[start..=end]).ok()?;

    Some(NewFeedback {
        overall_score: score_field(value.get("overall_score")?)?,
        summary: text_field(value.get("summary")?)?,
        key_strengths: text_field(value.get("key_strengths")?)?,
        areas_for_improvement: text_field(value.get("areas_for_improvement")?)?,
        recommendations: text_field(value.get("recommendations")?)?,
    })
}

fn score_field(value: &Value) -> Option<i32> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as i32)
}

/// Strings are trimmed; arrays of strings become a numbered list.
fn text_field(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, s)| format!("{}. {s}", i + 1))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
