//! Question generation stage.
//!
//! Builds prompts from the session, asks the model for a numbered list and
//! persists at most `questions_count` parsed lines as questions. A short list
//! is accepted as-is; the parse is never re-prompted.

use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::llm_client::prompts::NUMBERED_LIST_INSTRUCTION;
use crate::llm_client::ChatMessage;
use crate::models::question::QuestionRow;
use crate::models::session::{InterviewSessionRow, SessionStatus};
use crate::pipeline::prompts::{QUESTION_SYSTEM_TEMPLATE, QUESTION_USER_TEMPLATE};
use crate::pipeline::{Pipeline, SessionCommand};

const QUESTION_MAX_TOKENS: u32 = 2500;
/// Resume text beyond this is dropped from the prompt.
const RESUME_EXCERPT_CHARS: usize = 3000;

impl Pipeline {
    pub async fn generate_questions(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<QuestionRow>, PipelineError> {
        let session = self.load_session(session_id).await?;

        let existing = self.store.list_questions(session_id).await?;
        if !existing.is_empty() {
            info!(
                session_id = %session_id,
                "Session already has {} questions; skipping generation",
                existing.len()
            );
            // An earlier attempt stored the questions but did not finish the transition.
            if matches!(
                session.status(),
                SessionStatus::QuestionsPending | SessionStatus::QuestionsGenerated
            ) {
                self.apply(SessionCommand::QuestionsGenerated {
                    session_id,
                    count: existing.len(),
                })
                .await?;
            }
            return Ok(existing);
        }

        let resume_excerpt = self.resume_excerpt(&session).await;
        let messages = build_question_messages(&session, resume_excerpt.as_deref());
        let response = self.llm.complete(&messages, Some(QUESTION_MAX_TOKENS)).await?;

        let requested = session.questions_count.max(0) as usize;
        let contents = select_questions(&response, requested);
        if contents.len() < requested {
            warn!(
                session_id = %session_id,
                "Model returned {} of {} requested questions",
                contents.len(),
                requested
            );
        }

        let rows = self.store.insert_questions(session_id, &contents).await?;
        info!(
            session_id = %session_id,
            "Generated {} questions",
            rows.len()
        );

        self.apply(SessionCommand::QuestionsGenerated {
            session_id,
            count: rows.len(),
        })
        .await?;

        Ok(rows)
    }

    /// Best effort: a missing or unreadable resume only drops it from the prompt.
    async fn resume_excerpt(&self, session: &InterviewSessionRow) -> Option<String> {
        let key = session.resume_key.as_deref()?;

        let bytes = match self.blobs.get(key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(session_id = %session.id, "Could not load resume: {e}");
                return None;
            }
        };

        let extracted =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await;

        match extracted {
            Ok(Ok(text)) => {
                let text = collapse_whitespace(&text);
                (!text.is_empty()).then(|| text.chars().take(RESUME_EXCERPT_CHARS).collect())
            }
            Ok(Err(e)) => {
                warn!(session_id = %session.id, "Could not extract resume text: {e}");
                None
            }
            Err(e) => {
                warn!(session_id = %session.id, "Resume extraction task failed: {e}");
                None
            }
        }
    }
}

pub fn build_question_messages(
    session: &InterviewSessionRow,
    resume_excerpt: Option<&str>,
) -> Vec<ChatMessage> {
    let count = session.questions_count.to_string();

    let system = QUESTION_SYSTEM_TEMPLATE
        .replace("{category}", &session.interview_category)
        .replace("{level}", &session.position_level)
        .replace("{count}", &count)
        .replace("{format_instruction}", NUMBERED_LIST_INSTRUCTION);

    let job_url_line = session
        .job_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .map(|u| format!("\n- Job Posting URL: {}", u.trim()))
        .unwrap_or_default();
    let requirements_block = session
        .custom_requirements
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(|r| format!("\n\nCandidate's custom requirements:\n{}", r.trim()))
        .unwrap_or_default();
    let resume_block = resume_excerpt
        .map(|r| format!("\n\nCandidate resume (excerpt):\n{r}"))
        .unwrap_or_default();

    let user = QUESTION_USER_TEMPLATE
        .replace("{title}", &session.title)
        .replace("{level}", &session.position_level)
        .replace("{category}", &session.interview_category)
        .replace("{job_url_line}", &job_url_line)
        .replace("{requirements_block}", &requirements_block)
        .replace("{resume_block}", &resume_block)
        .replace("{count}", &count);

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Extracts `<digits><.|)> <text>` lines in order, with the prefix stripped.
/// Blank and unnumbered lines are discarded.
pub fn parse_numbered_questions(text: &str) -> Vec<String> {
    text.lines().filter_map(strip_number_prefix).collect()
}

/// Parsed questions truncated to `count`.
pub fn select_questions(text: &str, count: usize) -> Vec<String> {
    parse_numbered_questions(text)
        .into_iter()
        .take(count)
        .collect()
}

fn strip_number_prefix(line: &str) -> Option<String> {
    let line = line.trim();
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }

    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let content = rest.trim();
    (!content.is_empty()).then(|| content.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
