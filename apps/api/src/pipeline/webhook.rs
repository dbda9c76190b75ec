//! Avatar provider webhook: payload normalisation and dispatch.
//!
//! The provider sends either `{event_type, event_data}` or the same pair nested
//! under `webhook`. Both shapes parse into one `VideoProviderEvent` before any
//! lookup happens.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::models::question::QuestionRow;
use crate::pipeline::{Pipeline, SessionCommand};

pub const GIF_PREVIEW_EVENT: &str = "avatar_video_gif.success";
pub const RENDER_SUCCESS_EVENT: &str = "avatar_video.success";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoProviderEvent {
    GifPreviewReady,
    RenderSucceeded { video_id: String, url: String },
    Other { event_type: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookPayloadError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload has no event_type")]
    MissingEventType,

    #[error("{0} event is missing {1}")]
    MissingField(&'static str, &'static str),
}

/// What the webhook handler did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Ignored,
    Attached { question_id: uuid::Uuid },
    UnknownVideo,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    event_type: Option<String>,
    event_data: Option<Value>,
    webhook: Option<RawNested>,
}

#[derive(Debug, Deserialize)]
struct RawNested {
    event_type: Option<String>,
    event_data: Option<Value>,
}

impl VideoProviderEvent {
    pub fn parse(body: &[u8]) -> Result<Self, WebhookPayloadError> {
        let raw: RawEnvelope = serde_json::from_slice(body)
            .map_err(|e| WebhookPayloadError::InvalidJson(e.to_string()))?;

        let (event_type, event_data) = match raw.event_type {
            Some(event_type) => (event_type, raw.event_data),
            None => {
                let nested = raw.webhook.ok_or(WebhookPayloadError::MissingEventType)?;
                let event_type = nested
                    .event_type
                    .ok_or(WebhookPayloadError::MissingEventType)?;
                (event_type, nested.event_data)
            }
        };

        match event_type.as_str() {
            GIF_PREVIEW_EVENT => Ok(VideoProviderEvent::GifPreviewReady),
            RENDER_SUCCESS_EVENT => {
                let data = event_data.unwrap_or(Value::Null);
                let video_id = non_empty_str(&data, "video_id")
                    .ok_or(WebhookPayloadError::MissingField(RENDER_SUCCESS_EVENT, "video_id"))?;
                let url = non_empty_str(&data, "url")
                    .or_else(|| non_empty_str(&data, "video_share_page_url"))
                    .ok_or(WebhookPayloadError::MissingField(RENDER_SUCCESS_EVENT, "url"))?;
                Ok(VideoProviderEvent::RenderSucceeded { video_id, url })
            }
            _ => Ok(VideoProviderEvent::Other { event_type }),
        }
    }
}

fn non_empty_str(data: &Value, field: &str) -> Option<String> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Pipeline {
    pub async fn handle_video_webhook(
        &self,
        event: VideoProviderEvent,
    ) -> Result<WebhookOutcome, PipelineError> {
        match event {
            VideoProviderEvent::GifPreviewReady => {
                info!("GIF preview ready; nothing to do");
                Ok(WebhookOutcome::Ignored)
            }
            VideoProviderEvent::Other { event_type } => {
                info!("Ignoring webhook event {event_type}");
                Ok(WebhookOutcome::Ignored)
            }
            VideoProviderEvent::RenderSucceeded { video_id, url } => {
                match self.attach_rendered_video(&video_id, &url).await? {
                    Some(question) => Ok(WebhookOutcome::Attached {
                        question_id: question.id,
                    }),
                    None => Ok(WebhookOutcome::UnknownVideo),
                }
            }
        }
    }

    /// Sets the URL on the question owning `video_id`, then lets the
    /// orchestrator decide whether the session became ready.
    pub async fn attach_rendered_video(
        &self,
        video_id: &str,
        url: &str,
    ) -> Result<Option<QuestionRow>, PipelineError> {
        let Some(question) = self.store.attach_video_url(video_id, url).await? else {
            warn!(video_id = %video_id, "No question found for rendered video");
            return Ok(None);
        };

        info!(
            question_id = %question.id,
            video_id = %video_id,
            "Attached rendered video"
        );
        self.apply(SessionCommand::VideoAttached {
            session_id: question.session_id,
        })
        .await?;

        Ok(Some(question))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::SessionStatus;
    use crate::notifications::NotificationKind;
    use crate::store::InterviewStore;
    use crate::testing::{seed_session, TestHarness};

    fn success_body(video_id: &str, url: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "event_type": "avatar_video.success",
            "event_data": {"video_id": video_id, "url": url}
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_top_level_and_nested_shapes_agree() {
        let top = success_body("vid_1", "https://cdn/1.mp4");
        let nested = serde_json::to_vec(&serde_json::json!({
            "webhook": {
                "event_type": "avatar_video.success",
                "event_data": {"video_id": "vid_1", "video_share_page_url": "https://cdn/1.mp4"}
            }
        }))
        .unwrap();

        let expected = VideoProviderEvent::RenderSucceeded {
            video_id: "vid_1".to_string(),
            url: "https://cdn/1.mp4".to_string(),
        };
        assert_eq!(VideoProviderEvent::parse(&top).unwrap(), expected);
        assert_eq!(VideoProviderEvent::parse(&nested).unwrap(), expected);
    }

    #[test]
    fn test_parse_gif_and_unknown_events() {
        let gif = br#"{"event_type":"avatar_video_gif.success","event_data":{}}"#;
        assert_eq!(
            VideoProviderEvent::parse(gif).unwrap(),
            VideoProviderEvent::GifPreviewReady
        );
        let other = br#"{"event_type":"avatar_video.fail"}"#;
        assert_eq!(
            VideoProviderEvent::parse(other).unwrap(),
            VideoProviderEvent::Other {
                event_type: "avatar_video.fail".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed_payloads() {
        assert!(matches!(
            VideoProviderEvent::parse(b"{not json"),
            Err(WebhookPayloadError::InvalidJson(_))
        ));
        assert_eq!(
            VideoProviderEvent::parse(br#"{"event_data":{}}"#),
            Err(WebhookPayloadError::MissingEventType)
        );
        assert_eq!(
            VideoProviderEvent::parse(
                br#"{"event_type":"avatar_video.success","event_data":{"url":"x"}}"#
            ),
            Err(WebhookPayloadError::MissingField(RENDER_SUCCESS_EVENT, "video_id"))
        );
    }

    #[tokio::test]
    async fn test_duplicate_delivery_attaches_once_and_notifies_once() {
        let h = TestHarness::new();
        let session = seed_session(&h.store, 1).await;
        let rows = h
            .store
            .insert_questions(session.id, &["Only?".to_string()])
            .await
            .unwrap();
        h.store
            .set_question_video_id(rows[0].id, "vid_1")
            .await
            .unwrap();
        h.store.force_status(session.id, SessionStatus::VideosPending);
        let (_, mut rx) = h.hub.connect(session.user_id).await;

        let event = VideoProviderEvent::parse(&success_body("vid_1", "https://cdn/1.mp4")).unwrap();
        let first = h.pipeline.handle_video_webhook(event.clone()).await.unwrap();
        let second = h.pipeline.handle_video_webhook(event).await.unwrap();

        assert_eq!(first, WebhookOutcome::Attached { question_id: rows[0].id });
        assert_eq!(second, first);

        let questions = h.store.list_questions_sync(session.id);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].video_url.as_deref(), Some("https://cdn/1.mp4"));
        assert_eq!(h.store.session_status(session.id), SessionStatus::Ready);

        let message = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert_eq!(
            json["type"],
            serde_json::to_value(NotificationKind::SessionReady).unwrap()
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_video_id_mutates_nothing() {
        let h = TestHarness::new();
        let session = seed_session(&h.store, 1).await;
        h.store
            .insert_questions(session.id, &["Only?".to_string()])
            .await
            .unwrap();

        let event = VideoProviderEvent::parse(&success_body("vid_missing", "https://cdn/x.mp4")).unwrap();
        let outcome = h.pipeline.handle_video_webhook(event).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::UnknownVideo);
        assert!(h.store.list_questions_sync(session.id)[0].video_url.is_none());
    }

    #[tokio::test]
    async fn test_partial_attachment_does_not_mark_ready() {
        let h = TestHarness::new();
        let session = seed_session(&h.store, 2).await;
        let rows = h
            .store
            .insert_questions(session.id, &["A?".to_string(), "B?".to_string()])
            .await
            .unwrap();
        h.store.set_question_video_id(rows[0].id, "vid_a").await.unwrap();
        h.store.set_question_video_id(rows[1].id, "vid_b").await.unwrap();
        h.store.force_status(session.id, SessionStatus::VideosPending);

        h.pipeline
            .attach_rendered_video("vid_a", "https://cdn/a.mp4")
            .await
            .unwrap();
        assert_eq!(
            h.store.session_status(session.id),
            SessionStatus::VideosPending
        );

        h.pipeline
            .attach_rendered_video("vid_b", "https://cdn/b.mp4")
            .await
            .unwrap();
        assert_eq!(h.store.session_status(session.id), SessionStatus::Ready);
    }
}
