//! Answer capture, transcription and question navigation.

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::blobs::recording_key;
use crate::errors::PipelineError;
use crate::models::answer::AnswerRow;
use crate::models::question::QuestionRow;
use crate::models::session::SessionProgress;
use crate::pipeline::{Pipeline, SessionCommand};
use crate::store::RecordingRef;

/// Assumed for recordings stored without a content type.
pub const DEFAULT_RECORDING_TYPE: &str = "video/webm";

/// An uploaded answer recording.
#[derive(Debug, Clone)]
pub struct Recording {
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Next {
        question_id: Uuid,
        /// 1-based.
        question_number: usize,
    },
    Finished {
        redirect_url: String,
    },
}

/// Result of resolving which question the user should see.
#[derive(Debug, Clone)]
pub enum CurrentQuestion {
    /// Readiness gate: some question still has no video.
    NotReady(SessionProgress),
    Question {
        question: QuestionRow,
        /// 1-based.
        number: usize,
        total: usize,
        answered: bool,
    },
}

impl Pipeline {
    /// Stores the recording and queues its transcription. Returns as soon as
    /// the recording is persisted.
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        question_id: Uuid,
        recording: Recording,
    ) -> Result<AnswerRow, PipelineError> {
        let question = self
            .store
            .get_question(question_id)
            .await?
            .filter(|q| q.session_id == session_id)
            .ok_or_else(|| PipelineError::NotFound(format!("Question {question_id}")))?;

        let previous_key = self
            .store
            .get_answer_for_question(question.id)
            .await?
            .and_then(|a| a.recording_key);

        let key = recording_key(question.id, &recording.content_type);
        self.blobs
            .put(&key, recording.bytes, &recording.content_type)
            .await?;

        let answer = self
            .store
            .save_answer_recording(
                question.id,
                &RecordingRef {
                    key: key.clone(),
                    content_type: recording.content_type,
                },
            )
            .await?;
        info!(
            question_id = %question.id,
            answer_id = %answer.id,
            "Answer recording saved"
        );

        // Re-recording replaces the stored object.
        if let Some(old) = previous_key.filter(|old| *old != key) {
            if let Err(e) = self.blobs.delete(&old).await {
                warn!(answer_id = %answer.id, key = %old, "Could not delete replaced recording: {e}");
            }
        }

        self.apply(SessionCommand::AnswerSubmitted {
            session_id,
            answer_id: answer.id,
        })
        .await?;

        Ok(answer)
    }

    /// Returns the stored text, or `None` when the job had nothing to do.
    pub async fn transcribe_answer(&self, answer_id: Uuid) -> Result<Option<String>, PipelineError> {
        let answer = self
            .store
            .get_answer(answer_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("Answer {answer_id}")))?;

        if answer.is_transcribed() {
            info!(answer_id = %answer_id, "Answer already transcribed; skipping");
            return Ok(None);
        }
        let Some(key) = answer.recording_key.as_deref() else {
            info!(answer_id = %answer_id, "Answer has no recording; skipping");
            return Ok(None);
        };

        let content_type = answer
            .recording_content_type
            .as_deref()
            .unwrap_or(DEFAULT_RECORDING_TYPE);
        let audio = self.blobs.get(key).await?;
        let text = self.speech.transcribe(audio.to_vec(), content_type).await?;
        if text.trim().is_empty() {
            warn!(answer_id = %answer_id, "Transcription came back empty; nothing stored");
            return Ok(None);
        }

        if self.store.set_transcription(answer_id, &text).await? {
            info!(answer_id = %answer_id, "Answer transcribed ({} chars)", text.len());
            Ok(Some(text))
        } else {
            info!(answer_id = %answer_id, "Transcription raced with another job; kept existing");
            Ok(None)
        }
    }

    /// Moves past `question_id`. After the last question, hands the session to
    /// feedback generation.
    pub async fn advance(
        &self,
        session_id: Uuid,
        question_id: Uuid,
    ) -> Result<AdvanceOutcome, PipelineError> {
        let questions = self.store.list_questions(session_id).await?;
        let index = questions
            .iter()
            .position(|q| q.id == question_id)
            .ok_or_else(|| PipelineError::NotFound(format!("Question {question_id}")))?;

        if let Some(next) = questions.get(index + 1) {
            return Ok(AdvanceOutcome::Next {
                question_id: next.id,
                question_number: index + 2,
            });
        }

        self.apply(SessionCommand::AnswersExhausted { session_id })
            .await?;
        Ok(AdvanceOutcome::Finished {
            redirect_url: format!("/sessions/{session_id}/feedback"),
        })
    }

    pub async fn current_question(
        &self,
        session_id: Uuid,
        requested: Option<Uuid>,
    ) -> Result<CurrentQuestion, PipelineError> {
        let questions = self.store.list_questions(session_id).await?;
        let answers = self.store.list_answers(session_id).await?;

        let progress = SessionProgress::compute(&questions, &answers);
        if !progress.ready {
            return Ok(CurrentQuestion::NotReady(progress));
        }

        let index = match requested {
            Some(id) => questions
                .iter()
                .position(|q| q.id == id)
                .ok_or_else(|| PipelineError::NotFound(format!("Question {id}")))?,
            None => resume_position(&questions, &answers),
        };

        let question = questions[index].clone();
        let answered = answers.iter().any(|a| a.question_id == question.id);
        Ok(CurrentQuestion::Question {
            question,
            number: index + 1,
            total: questions.len(),
            answered,
        })
    }
}

/// First question without an answer, else the first question.
/// Callers guarantee `questions` is non-empty.
pub fn resume_position(questions: &[QuestionRow], answers: &[AnswerRow]) -> usize {
    questions
        .iter()
        .position(|q| !answers.iter().any(|a| a.question_id == q.id))
        .unwrap_or(0)
}
