//! Session lifecycle: validated creation, listing, detail and deletion.

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::blobs::resume_key;
use crate::errors::PipelineError;
use crate::models::question::QuestionRow;
use crate::models::session::{
    InterviewCategory, InterviewSessionRow, NewSession, PositionLevel, SessionProgress,
    DEFAULT_QUESTIONS_COUNT, MAX_QUESTIONS_COUNT,
};
use crate::pipeline::{Pipeline, SessionCommand};

pub const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub bytes: Bytes,
    pub file_name: Option<String>,
}

/// Raw create-session input as received from the client.
#[derive(Debug, Clone, Default)]
pub struct SessionForm {
    pub title: Option<String>,
    pub job_url: Option<String>,
    pub category: Option<String>,
    pub position_level: Option<String>,
    pub questions_count: Option<String>,
    pub custom_requirements: Option<String>,
    pub resume: Option<ResumeUpload>,
}

/// Session with its questions and derived flags.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: InterviewSessionRow,
    pub questions: Vec<QuestionRow>,
    pub progress: SessionProgress,
}

impl SessionForm {
    /// Collects every problem rather than stopping at the first.
    pub fn validate(self, user_id: Uuid) -> Result<(NewSession, Option<ResumeUpload>), Vec<String>> {
        let mut errors = Vec::new();

        let title = non_blank(self.title);
        if title.is_none() {
            errors.push("Title can't be blank".to_string());
        }

        let category = match non_blank(self.category) {
            Some(raw) => raw.parse::<InterviewCategory>().map_err(|e| errors.push(e)).ok(),
            None => {
                errors.push("Interview category can't be blank".to_string());
                None
            }
        };

        let level = match non_blank(self.position_level) {
            Some(raw) => raw.parse::<PositionLevel>().map_err(|e| errors.push(e)).ok(),
            None => {
                errors.push("Position level can't be blank".to_string());
                None
            }
        };

        let questions_count = match non_blank(self.questions_count) {
            None => DEFAULT_QUESTIONS_COUNT,
            Some(raw) => match raw.parse::<i32>() {
                Ok(n) if (1..=MAX_QUESTIONS_COUNT).contains(&n) => n,
                Ok(_) => {
                    errors.push(format!(
                        "Questions count must be between 1 and {MAX_QUESTIONS_COUNT}"
                    ));
                    DEFAULT_QUESTIONS_COUNT
                }
                Err(_) => {
                    errors.push("Questions count must be an integer".to_string());
                    DEFAULT_QUESTIONS_COUNT
                }
            },
        };

        if let Some(resume) = &self.resume {
            errors.extend(validate_resume(&resume.bytes));
        }

        match (title, category, level) {
            (Some(title), Some(category), Some(level)) if errors.is_empty() => Ok((
                NewSession {
                    user_id,
                    title,
                    job_url: non_blank(self.job_url),
                    category,
                    level,
                    questions_count,
                    custom_requirements: non_blank(self.custom_requirements),
                },
                self.resume,
            )),
            _ => Err(errors),
        }
    }
}

/// Resume must be a PDF (by content) of at most 5MB.
pub fn validate_resume(bytes: &[u8]) -> Vec<String> {
    let mut errors = Vec::new();
    if bytes.len() > MAX_RESUME_BYTES {
        errors.push("Resume must be less than 5MB".to_string());
    }
    if !bytes.starts_with(PDF_MAGIC) {
        errors.push("Resume must be a PDF file".to_string());
    }
    errors
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Pipeline {
    /// Persists the session and its resume, then starts question generation.
    pub async fn create_session(
        &self,
        new_session: NewSession,
        resume: Option<ResumeUpload>,
    ) -> Result<InterviewSessionRow, PipelineError> {
        let mut session = self.store.create_session(new_session).await?;

        if let Some(resume) = resume {
            let key = resume_key(session.id);
            info!(
                session_id = %session.id,
                "Storing resume {}",
                resume.file_name.as_deref().unwrap_or("(unnamed)")
            );
            if let Err(e) = self.blobs.put(&key, resume.bytes, "application/pdf").await {
                warn!(session_id = %session.id, "Resume upload failed; removing session");
                if let Err(cleanup) = self.store.delete_session(session.id, session.user_id).await {
                    warn!(session_id = %session.id, "Failed to remove session: {cleanup}");
                }
                return Err(e);
            }
            self.store.set_resume_key(session.id, &key).await?;
            session.resume_key = Some(key);
        }

        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            "Interview session created"
        );
        self.apply(SessionCommand::SessionCreated {
            session_id: session.id,
        })
        .await?;

        self.load_session(session.id).await
    }

    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        category: Option<InterviewCategory>,
    ) -> Result<Vec<InterviewSessionRow>, PipelineError> {
        Ok(self.store.list_sessions(user_id, category).await?)
    }

    /// Another user's session reads as missing.
    pub async fn load_owned_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<InterviewSessionRow, PipelineError> {
        let session = self.load_session(session_id).await?;
        if session.user_id != user_id {
            return Err(PipelineError::NotFound(format!("InterviewSession {session_id}")));
        }
        Ok(session)
    }

    pub async fn session_detail(&self, session_id: Uuid) -> Result<SessionDetail, PipelineError> {
        let session = self.load_session(session_id).await?;
        let questions = self.store.list_questions(session_id).await?;
        let answers = self.store.list_answers(session_id).await?;
        let progress = SessionProgress::compute(&questions, &answers);
        Ok(SessionDetail {
            session,
            questions,
            progress,
        })
    }

    /// Deletes rows first, then blobs best-effort. Returns false if nothing was deleted.
    pub async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> Result<bool, PipelineError> {
        let session = match self.load_owned_session(session_id, user_id).await {
            Ok(session) => session,
            Err(PipelineError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };

        let mut keys: Vec<String> = self
            .store
            .list_answers(session_id)
            .await?
            .into_iter()
            .filter_map(|a| a.recording_key)
            .collect();
        keys.extend(session.resume_key);

        if !self.store.delete_session(session_id, user_id).await? {
            return Ok(false);
        }

        for key in &keys {
            if let Err(e) = self.blobs.delete(key).await {
                warn!(session_id = %session_id, "Failed to delete blob {key}: {e}");
            }
        }

        info!(
            session_id = %session_id,
            "Interview session deleted with {} blobs",
            keys.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Job;
    use crate::models::session::SessionStatus;
    use crate::pipeline::answers::Recording;
    use crate::store::InterviewStore;
    use crate::testing::TestHarness;

    fn pdf(size: usize) -> Bytes {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.resize(size.max(bytes.len()), b' ');
        Bytes::from(bytes)
    }

    fn form() -> SessionForm {
        SessionForm {
            title: Some("Backend Engineer".to_string()),
            category: Some("Technical".to_string()),
            position_level: Some("Senior".to_string()),
            ..SessionForm::default()
        }
    }

    #[test]
    fn test_valid_form_defaults_question_count() {
        let (session, resume) = form().validate(Uuid::new_v4()).unwrap();
        assert_eq!(session.questions_count, DEFAULT_QUESTIONS_COUNT);
        assert_eq!(session.category, InterviewCategory::Technical);
        assert!(resume.is_none());
    }

    #[test]
    fn test_invalid_form_reports_every_problem() {
        let errors = SessionForm {
            title: Some("   ".to_string()),
            category: Some("Astrology".to_string()),
            position_level: None,
            questions_count: Some("21".to_string()),
            ..SessionForm::default()
        }
        .validate(Uuid::new_v4())
        .unwrap_err();

        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("Title")));
        assert!(errors.iter().any(|e| e.contains("between 1 and 20")));
    }

    #[test]
    fn test_resume_must_be_pdf_and_at_most_5mb() {
        assert!(validate_resume(&pdf(1024)).is_empty());
        assert!(validate_resume(&pdf(MAX_RESUME_BYTES)).is_empty());
        assert_eq!(
            validate_resume(&pdf(MAX_RESUME_BYTES + 1)),
            vec!["Resume must be less than 5MB".to_string()]
        );
        assert_eq!(
            validate_resume(b"PK\x03\x04 not a pdf"),
            vec!["Resume must be a PDF file".to_string()]
        );
    }

    #[test]
    fn test_non_pdf_resume_rejects_the_form() {
        let errors = SessionForm {
            resume: Some(ResumeUpload {
                bytes: Bytes::from_static(b"plain text resume"),
                file_name: Some("resume.txt".to_string()),
            }),
            ..form()
        }
        .validate(Uuid::new_v4())
        .unwrap_err();
        assert_eq!(errors, vec!["Resume must be a PDF file".to_string()]);
    }

    #[tokio::test]
    async fn test_create_stores_resume_and_enqueues_questions() {
        let h = TestHarness::new();
        let user_id = Uuid::new_v4();
        let (new_session, resume) = SessionForm {
            resume: Some(ResumeUpload {
                bytes: pdf(2048),
                file_name: Some("cv.pdf".to_string()),
            }),
            ..form()
        }
        .validate(user_id)
        .unwrap();

        let session = h.pipeline.create_session(new_session, resume).await.unwrap();

        let key = session.resume_key.clone().unwrap();
        assert!(h.blobs.get_sync(&key).is_some());
        assert_eq!(session.status(), SessionStatus::QuestionsPending);
        assert_eq!(
            h.queue.jobs(),
            vec![Job::GenerateQuestions {
                session_id: session.id
            }]
        );
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped_and_removes_blobs() {
        let h = TestHarness::new();
        let user_id = Uuid::new_v4();
        let (new_session, _) = form().validate(user_id).unwrap();
        let session = h.pipeline.create_session(new_session, None).await.unwrap();
        let rows = h
            .store
            .insert_questions(session.id, &["Q?".to_string()])
            .await
            .unwrap();
        let answer = h
            .pipeline
            .submit_answer(
                session.id,
                rows[0].id,
                Recording {
                    bytes: Bytes::from_static(b"rec"),
                    content_type: "video/webm".to_string(),
                },
            )
            .await
            .unwrap();
        let recording = answer.recording_key.unwrap();

        assert!(!h.pipeline.delete_session(session.id, Uuid::new_v4()).await.unwrap());
        assert!(h.pipeline.delete_session(session.id, user_id).await.unwrap());

        assert!(h.store.get_session(session.id).await.unwrap().is_none());
        assert!(h.store.list_questions_sync(session.id).is_empty());
        assert!(h.blobs.get_sync(&recording).is_none());
    }

    #[tokio::test]
    async fn test_session_detail_reports_progress() {
        let h = TestHarness::new();
        let (new_session, _) = form().validate(Uuid::new_v4()).unwrap();
        let session = h.pipeline.create_session(new_session, None).await.unwrap();
        h.store
            .insert_questions(session.id, &["A?".to_string(), "B?".to_string()])
            .await
            .unwrap();

        let detail = h.pipeline.session_detail(session.id).await.unwrap();
        assert_eq!(detail.questions.len(), 2);
        assert!(!detail.progress.ready);
        assert!(!detail.progress.complete);
    }
}
