//! Video generation stage.
//!
//! Submits one avatar render per question, strictly one at a time with a pause
//! between submissions. Finished URLs arrive later through the provider webhook
//! (or `refresh_video_status` when the webhook cannot reach this host).

use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::models::question::QuestionRow;
use crate::pipeline::{AvatarProfile, Pipeline, SessionCommand};

const GENERATE_PATH: &str = "/v2/video/generate";
const STATUS_PATH: &str = "/v1/video_status.get";

/// Render status as reported by the provider's status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStatus {
    Completed { url: String },
    Pending(String),
}

impl Pipeline {
    /// Returns how many render jobs were submitted.
    pub async fn generate_videos(&self, session_id: Uuid) -> Result<usize, PipelineError> {
        self.load_session(session_id).await?;

        let pending: Vec<QuestionRow> = self
            .store
            .list_questions(session_id)
            .await?
            .into_iter()
            .filter(|q| q.video_id.as_deref().map_or(true, str::is_empty))
            .collect();

        if pending.is_empty() {
            info!(session_id = %session_id, "No questions awaiting a video");
            return Ok(0);
        }

        self.apply(SessionCommand::VideosRequested { session_id })
            .await?;

        let callback_url = self.settings.callback_url();
        let mut submitted = 0;

        for (i, question) in pending.iter().enumerate() {
            if i > 0 && !self.settings.video_request_delay.is_zero() {
                tokio::time::sleep(self.settings.video_request_delay).await;
            }

            let payload = render_payload(&self.settings.avatar, &question.content, &callback_url);
            let response = self.avatar.post(GENERATE_PATH, &payload).await?;

            match extract_video_id(&response) {
                Some(video_id) => {
                    self.store
                        .set_question_video_id(question.id, &video_id)
                        .await?;
                    submitted += 1;
                    info!(
                        question_id = %question.id,
                        video_id = %video_id,
                        "Submitted question video render"
                    );
                }
                None => {
                    error!(
                        question_id = %question.id,
                        "Render response carried no video_id; skipping question: {response}"
                    );
                }
            }
        }

        info!(
            session_id = %session_id,
            "Submitted {submitted} of {} video renders",
            pending.len()
        );
        Ok(submitted)
    }

    /// Polls render status for questions that have a job id but no URL and
    /// attaches any finished videos. Returns how many were attached.
    pub async fn refresh_video_status(&self, session_id: Uuid) -> Result<usize, PipelineError> {
        let questions = self.store.list_questions(session_id).await?;
        let mut attached = 0;

        for question in questions.iter().filter(|q| !q.has_video()) {
            let Some(video_id) = question.video_id.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };

            let response = self
                .avatar
                .get(&format!("{STATUS_PATH}?video_id={video_id}"))
                .await?;

            match parse_render_status(&response) {
                Some(RenderStatus::Completed { url }) => {
                    if self.attach_rendered_video(video_id, &url).await?.is_some() {
                        attached += 1;
                    }
                }
                Some(RenderStatus::Pending(status)) => {
                    info!(video_id = %video_id, "Render still {status}");
                }
                None => warn!(video_id = %video_id, "Unrecognised status response: {response}"),
            }
        }

        Ok(attached)
    }
}

pub fn render_payload(avatar: &AvatarProfile, text: &str, callback_url: &str) -> Value {
    json!({
        "video_inputs": [{
            "character": {
                "type": "avatar",
                "avatar_id": avatar.avatar_id,
                "avatar_style": "normal"
            },
            "voice": {
                "type": "text",
                "input_text": text,
                "voice_id": avatar.voice_id
            },
            "background": {
                "type": "color",
                "value": avatar.background_color
            }
        }],
        "dimension": {
            "width": avatar.width,
            "height": avatar.height
        },
        "callback_url": callback_url
    })
}

fn extract_video_id(response: &Value) -> Option<String> {
    response
        .pointer("/data/video_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

pub fn parse_render_status(response: &Value) -> Option<RenderStatus> {
    let data = response.get("data")?;
    let status = data.get("status")?.as_str()?;
    if status == "completed" {
        let url = data.get("video_url")?.as_str()?.to_string();
        return Some(RenderStatus::Completed { url });
    }
    Some(RenderStatus::Pending(status.to_string()))
}
