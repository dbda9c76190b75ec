//! Interview content pipeline.
//!
//! Flow: session created → questions (LLM) → per-question avatar render jobs →
//!       provider webhook attaches URLs → ready → answers recorded and
//!       transcribed → last advance → feedback (LLM) → complete.
//!
//! `Pipeline::apply` is the only place that moves a session's stored status,
//! enqueues the next stage and notifies the user. Stages live in submodules as
//! further `impl Pipeline` blocks.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::avatar_client::AvatarApi;
use crate::blobs::BlobStore;
use crate::config::Config;
use crate::errors::PipelineError;
use crate::jobs::{Job, JobQueue};
use crate::llm_client::ChatModel;
use crate::models::session::{InterviewSessionRow, SessionProgress, SessionStatus};
use crate::notifications::{Notification, NotificationHub};
use crate::speech_client::SpeechToText;
use crate::store::InterviewStore;

pub mod answers;
pub mod feedback;
pub mod prompts;
pub mod questions;
pub mod sessions;
pub mod videos;
pub mod webhook;

/// Path the avatar provider calls back on render completion.
pub const WEBHOOK_PATH: &str = "/webhooks/video-provider";

/// Fixed avatar rendering parameters for question videos.
#[derive(Debug, Clone)]
pub struct AvatarProfile {
    pub avatar_id: String,
    pub voice_id: String,
    pub background_color: String,
    pub width: u32,
    pub height: u32,
}

impl Default for AvatarProfile {
    fn default() -> Self {
        Self {
            avatar_id: "Amelia_sitting_business_training_side".to_string(),
            voice_id: "e0cc82c22f414c95b1f25696c732f058".to_string(),
            background_color: "#008000".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Externally reachable base URL (webhook callback, notification links).
    pub public_host: String,
    /// Pause between consecutive avatar render submissions.
    pub video_request_delay: Duration,
    pub avatar: AvatarProfile,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            public_host: config.public_host.clone(),
            video_request_delay: config.video_request_delay,
            avatar: AvatarProfile::default(),
        }
    }

    pub fn callback_url(&self) -> String {
        format!("{}{}", self.public_host.trim().trim_end_matches('/'), WEBHOOK_PATH)
    }
}

/// External collaborators the pipeline drives.
pub struct PipelineDeps {
    pub store: Arc<dyn InterviewStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub llm: Arc<dyn ChatModel>,
    pub avatar: Arc<dyn AvatarApi>,
    pub speech: Arc<dyn SpeechToText>,
    pub queue: Arc<dyn JobQueue>,
    pub notifications: Arc<NotificationHub>,
}

pub struct Pipeline {
    store: Arc<dyn InterviewStore>,
    blobs: Arc<dyn BlobStore>,
    llm: Arc<dyn ChatModel>,
    avatar: Arc<dyn AvatarApi>,
    speech: Arc<dyn SpeechToText>,
    queue: Arc<dyn JobQueue>,
    notifications: Arc<NotificationHub>,
    settings: PipelineSettings,
}

/// A state transition request. Each variant is one edge of the session state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SessionCreated {
        session_id: Uuid,
    },
    QuestionsGenerated {
        session_id: Uuid,
        count: usize,
    },
    VideosRequested {
        session_id: Uuid,
    },
    VideoAttached {
        session_id: Uuid,
    },
    AnswerSubmitted {
        session_id: Uuid,
        answer_id: Uuid,
    },
    AnswersExhausted {
        session_id: Uuid,
    },
    FeedbackGenerated {
        session_id: Uuid,
        score: i32,
    },
    StageFailed {
        session_id: Uuid,
        stage: &'static str,
        reason: String,
    },
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, settings: PipelineSettings) -> Self {
        Self {
            store: deps.store,
            blobs: deps.blobs,
            llm: deps.llm,
            avatar: deps.avatar,
            speech: deps.speech,
            queue: deps.queue,
            notifications: deps.notifications,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn apply(&self, command: SessionCommand) -> Result<(), PipelineError> {
        match command {
            SessionCommand::SessionCreated { session_id } => {
                self.store
                    .set_status(session_id, SessionStatus::QuestionsPending)
                    .await?;
                self.queue.enqueue(Job::GenerateQuestions { session_id }).await?;
            }

            SessionCommand::QuestionsGenerated { session_id, count } => {
                if count == 0 {
                    self.fail_session(
                        session_id,
                        "question generation",
                        "the model response contained no numbered questions",
                    )
                    .await?;
                    return Ok(());
                }
                self.store
                    .set_status(session_id, SessionStatus::QuestionsGenerated)
                    .await?;
                self.queue.enqueue(Job::GenerateVideos { session_id }).await?;
            }

            SessionCommand::VideosRequested { session_id } => {
                self.store
                    .transition_status(
                        session_id,
                        &[SessionStatus::QuestionsGenerated],
                        SessionStatus::VideosPending,
                    )
                    .await?;
            }

            SessionCommand::VideoAttached { session_id } => {
                let progress = self.progress(session_id).await?;
                if !progress.ready {
                    return Ok(());
                }
                // Only the delivery that flips the status notifies; repeats are silent.
                let became_ready = self
                    .store
                    .transition_status(
                        session_id,
                        &[
                            SessionStatus::QuestionsGenerated,
                            SessionStatus::VideosPending,
                        ],
                        SessionStatus::Ready,
                    )
                    .await?;
                if became_ready {
                    let session = self.load_session(session_id).await?;
                    info!(session_id = %session_id, "All question videos attached; session ready");
                    let notification =
                        Notification::session_ready(session_id, &session.title, &self.settings.public_host);
                    self.notifications
                        .notify_user(session.user_id, &notification)
                        .await;
                }
            }

            SessionCommand::AnswerSubmitted {
                session_id,
                answer_id,
            } => {
                self.store
                    .transition_status(session_id, &[SessionStatus::Ready], SessionStatus::Answering)
                    .await?;
                self.queue.enqueue(Job::TranscribeAnswer { answer_id }).await?;
            }

            SessionCommand::AnswersExhausted { session_id } => {
                self.store
                    .transition_status(
                        session_id,
                        &[
                            SessionStatus::Ready,
                            SessionStatus::Answering,
                            SessionStatus::Failed,
                        ],
                        SessionStatus::FeedbackPending,
                    )
                    .await?;
                self.queue.enqueue(Job::GenerateFeedback { session_id }).await?;
            }

            SessionCommand::FeedbackGenerated { session_id, score } => {
                let session = self.load_session(session_id).await?;
                self.store
                    .set_status(session_id, SessionStatus::Complete)
                    .await?;
                let notification =
                    Notification::feedback_ready(session_id, score, &self.settings.public_host);
                self.notifications
                    .notify_user(session.user_id, &notification)
                    .await;
            }

            SessionCommand::StageFailed {
                session_id,
                stage,
                reason,
            } => {
                self.fail_session(session_id, stage, &reason).await?;
            }
        }

        Ok(())
    }

    async fn fail_session(
        &self,
        session_id: Uuid,
        stage: &str,
        reason: &str,
    ) -> Result<(), PipelineError> {
        let Some(session) = self.store.get_session(session_id).await? else {
            warn!(session_id = %session_id, "Cannot record {stage} failure: session no longer exists");
            return Ok(());
        };

        warn!(session_id = %session_id, "{stage} failed: {reason}");
        self.store
            .mark_failed(session_id, &format!("{stage} failed: {reason}"))
            .await?;

        let notification =
            Notification::generation_failed(session_id, stage, &self.settings.public_host);
        self.notifications
            .notify_user(session.user_id, &notification)
            .await;
        Ok(())
    }

    pub(crate) async fn load_session(
        &self,
        session_id: Uuid,
    ) -> Result<InterviewSessionRow, PipelineError> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("InterviewSession {session_id}")))
    }

    /// Derived readiness and completion for a session.
    pub async fn progress(&self, session_id: Uuid) -> Result<SessionProgress, PipelineError> {
        let questions = self.store.list_questions(session_id).await?;
        let answers = self.store.list_answers(session_id).await?;
        Ok(SessionProgress::compute(&questions, &answers))
    }
}
