//! In-memory fakes for every pipeline collaborator, plus a harness wiring them
//! into a `Pipeline`. Test-only.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::avatar_client::AvatarApi;
use crate::blobs::BlobStore;
use crate::config::Config;
use crate::errors::{PipelineError, ProviderError};
use crate::jobs::{Job, JobEnvelope, JobQueue};
use crate::llm_client::{ChatMessage, ChatModel};
use crate::models::answer::AnswerRow;
use crate::models::feedback::{NewFeedback, OverallFeedbackRow};
use crate::models::question::QuestionRow;
use crate::models::session::{
    InterviewCategory, InterviewSessionRow, NewSession, PositionLevel, SessionStatus,
};
use crate::notifications::NotificationHub;
use crate::pipeline::{Pipeline, PipelineDeps, PipelineSettings};
use crate::speech_client::SpeechToText;
use crate::store::{InterviewStore, RecordingRef};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    sessions: Vec<InterviewSessionRow>,
    questions: Vec<QuestionRow>,
    answers: Vec<AnswerRow>,
    feedback: Vec<OverallFeedbackRow>,
}

impl StoreState {
    fn session_mut(&mut self, session_id: Uuid) -> Option<&mut InterviewSessionRow> {
        self.sessions.iter_mut().find(|s| s.id == session_id)
    }

    fn question_ids(&self, session_id: Uuid) -> Vec<Uuid> {
        self.questions
            .iter()
            .filter(|q| q.session_id == session_id)
            .map(|q| q.id)
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    fail_next_status_write: AtomicBool,
}

impl MemoryStore {
    pub fn session_status(&self, session_id: Uuid) -> SessionStatus {
        let state = self.state.lock().unwrap();
        state
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .map(InterviewSessionRow::status)
            .expect("session exists")
    }

    pub fn list_questions_sync(&self, session_id: Uuid) -> Vec<QuestionRow> {
        let state = self.state.lock().unwrap();
        let mut questions: Vec<_> = state
            .questions
            .iter()
            .filter(|q| q.session_id == session_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.position);
        questions
    }

    /// The next `set_status` call returns an error without writing.
    pub fn fail_next_status_write(&self) {
        self.fail_next_status_write.store(true, Ordering::SeqCst);
    }

    pub fn force_status(&self, session_id: Uuid, status: SessionStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.session_mut(session_id) {
            session.status = status.as_str().to_string();
        }
    }
}

#[async_trait]
impl InterviewStore for MemoryStore {
    async fn create_session(&self, session: NewSession) -> Result<InterviewSessionRow> {
        let now = Utc::now();
        let row = InterviewSessionRow {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            title: session.title,
            job_url: session.job_url,
            interview_category: session.category.as_str().to_string(),
            position_level: session.level.as_str().to_string(),
            questions_count: session.questions_count,
            custom_requirements: session.custom_requirements,
            resume_key: None,
            status: SessionStatus::Created.as_str().to_string(),
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().sessions.push(row.clone());
        Ok(row)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<InterviewSessionRow>> {
        let state = self.state.lock().unwrap();
        Ok(state.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        category: Option<InterviewCategory>,
    ) -> Result<Vec<InterviewSessionRow>> {
        let state = self.state.lock().unwrap();
        let mut sessions: Vec<_> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .filter(|s| category.map_or(true, |c| s.interview_category == c.as_str()))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.sessions.len();
        state
            .sessions
            .retain(|s| !(s.id == session_id && s.user_id == user_id));
        if state.sessions.len() == before {
            return Ok(false);
        }

        let question_ids = state.question_ids(session_id);
        state.questions.retain(|q| q.session_id != session_id);
        state.answers.retain(|a| !question_ids.contains(&a.question_id));
        state.feedback.retain(|f| f.session_id != session_id);
        Ok(true)
    }

    async fn set_resume_key(&self, session_id: Uuid, key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.session_mut(session_id) {
            session.resume_key = Some(key.to_string());
        }
        Ok(())
    }

    async fn set_status(&self, session_id: Uuid, status: SessionStatus) -> Result<()> {
        if self.fail_next_status_write.swap(false, Ordering::SeqCst) {
            anyhow::bail!("status write failed");
        }
        self.force_status(session_id, status);
        Ok(())
    }

    async fn transition_status(
        &self,
        session_id: Uuid,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.session_mut(session_id) {
            Some(session) if from.contains(&session.status()) => {
                session.status = to.as_str().to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, session_id: Uuid, reason: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.session_mut(session_id) {
            session.status = SessionStatus::Failed.as_str().to_string();
            session.failure_reason = Some(reason.to_string());
        }
        Ok(())
    }

    async fn insert_questions(
        &self,
        session_id: Uuid,
        contents: &[String],
    ) -> Result<Vec<QuestionRow>> {
        let mut state = self.state.lock().unwrap();
        let next = state
            .questions
            .iter()
            .filter(|q| q.session_id == session_id)
            .map(|q| q.position + 1)
            .max()
            .unwrap_or(0);

        let now = Utc::now();
        let rows: Vec<QuestionRow> = contents
            .iter()
            .enumerate()
            .map(|(i, content)| QuestionRow {
                id: Uuid::new_v4(),
                session_id,
                position: next + i as i32,
                content: content.clone(),
                video_id: None,
                video_url: None,
                attachment_key: None,
                created_at: now,
                updated_at: now,
            })
            .collect();
        state.questions.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn list_questions(&self, session_id: Uuid) -> Result<Vec<QuestionRow>> {
        Ok(self.list_questions_sync(session_id))
    }

    async fn get_question(&self, question_id: Uuid) -> Result<Option<QuestionRow>> {
        let state = self.state.lock().unwrap();
        Ok(state.questions.iter().find(|q| q.id == question_id).cloned())
    }

    async fn set_question_video_id(&self, question_id: Uuid, video_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(q) = state.questions.iter_mut().find(|q| q.id == question_id) {
            q.video_id = Some(video_id.to_string());
        }
        Ok(())
    }

    async fn attach_video_url(&self, video_id: &str, url: &str) -> Result<Option<QuestionRow>> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .questions
            .iter_mut()
            .find(|q| q.video_id.as_deref() == Some(video_id))
            .map(|q| {
                q.video_url = Some(url.to_string());
                q.clone()
            }))
    }

    async fn get_answer(&self, answer_id: Uuid) -> Result<Option<AnswerRow>> {
        let state = self.state.lock().unwrap();
        Ok(state.answers.iter().find(|a| a.id == answer_id).cloned())
    }

    async fn get_answer_for_question(&self, question_id: Uuid) -> Result<Option<AnswerRow>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .answers
            .iter()
            .find(|a| a.question_id == question_id)
            .cloned())
    }

    async fn save_answer_recording(
        &self,
        question_id: Uuid,
        recording: &RecordingRef,
    ) -> Result<AnswerRow> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        if let Some(answer) = state
            .answers
            .iter_mut()
            .find(|a| a.question_id == question_id)
        {
            answer.recording_key = Some(recording.key.clone());
            answer.recording_content_type = Some(recording.content_type.clone());
            answer.updated_at = now;
            return Ok(answer.clone());
        }

        let answer = AnswerRow {
            id: Uuid::new_v4(),
            question_id,
            recording_key: Some(recording.key.clone()),
            recording_content_type: Some(recording.content_type.clone()),
            transcription: None,
            created_at: now,
            updated_at: now,
        };
        state.answers.push(answer.clone());
        Ok(answer)
    }

    async fn set_transcription(&self, answer_id: Uuid, text: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.answers.iter_mut().find(|a| a.id == answer_id) {
            Some(answer) if !answer.is_transcribed() => {
                answer.transcription = Some(text.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_answers(&self, session_id: Uuid) -> Result<Vec<AnswerRow>> {
        let state = self.state.lock().unwrap();
        let question_ids = state.question_ids(session_id);
        Ok(state
            .answers
            .iter()
            .filter(|a| question_ids.contains(&a.question_id))
            .cloned()
            .collect())
    }

    async fn get_feedback(&self, session_id: Uuid) -> Result<Option<OverallFeedbackRow>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .feedback
            .iter()
            .find(|f| f.session_id == session_id)
            .cloned())
    }

    async fn create_feedback_if_absent(
        &self,
        session_id: Uuid,
        feedback: &NewFeedback,
    ) -> Result<Option<OverallFeedbackRow>> {
        let mut state = self.state.lock().unwrap();
        if state.feedback.iter().any(|f| f.session_id == session_id) {
            return Ok(None);
        }
        let row = OverallFeedbackRow {
            id: Uuid::new_v4(),
            session_id,
            overall_score: feedback.overall_score,
            summary: feedback.summary.clone(),
            key_strengths: feedback.key_strengths.clone(),
            areas_for_improvement: feedback.areas_for_improvement.clone(),
            recommendations: feedback.recommendations.clone(),
            created_at: Utc::now(),
        };
        state.feedback.push(row.clone());
        Ok(Some(row))
    }
}

/// Creates a session in `Created` without starting the pipeline.
pub async fn seed_session(store: &MemoryStore, questions_count: i32) -> InterviewSessionRow {
    store
        .create_session(NewSession {
            user_id: Uuid::new_v4(),
            title: "Backend Engineer".to_string(),
            job_url: None,
            category: InterviewCategory::Technical,
            level: PositionLevel::Senior,
            questions_count,
            custom_requirements: None,
        })
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Blobs and queue
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn get_sync(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<(), PipelineError> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, PipelineError> {
        self.get_sync(key)
            .ok_or_else(|| PipelineError::Storage(format!("no object at {key}")))
    }

    async fn delete(&self, key: &str) -> Result<(), PipelineError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Records every scheduled envelope; `claim_due` hands them back in order.
#[derive(Default)]
pub struct RecordingQueue {
    scheduled: Mutex<Vec<(JobEnvelope, Duration)>>,
    pending: Mutex<VecDeque<JobEnvelope>>,
    fail_next: AtomicBool,
}

impl RecordingQueue {
    pub fn scheduled(&self) -> Vec<(JobEnvelope, Duration)> {
        self.scheduled.lock().unwrap().clone()
    }

    /// The next `schedule` call returns an error without recording.
    pub fn fail_next_schedule(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.scheduled()
            .into_iter()
            .map(|(envelope, _)| envelope.job)
            .collect()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn schedule(&self, envelope: JobEnvelope, delay: Duration) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("queue unavailable");
        }
        self.pending.lock().unwrap().push_back(envelope.clone());
        self.scheduled.lock().unwrap().push((envelope, delay));
        Ok(())
    }

    async fn claim_due(&self) -> Result<Option<JobEnvelope>> {
        Ok(self.pending.lock().unwrap().pop_front())
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Replays queued responses in order. An empty script is an `Unexpected` error.
#[derive(Default)]
pub struct ScriptedChatModel {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl ScriptedChatModel {
    pub fn push_response(&self, text: &str) {
        self.script.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_error(&self, err: ProviderError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _max_tokens: Option<u32>,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::Unexpected {
                    provider: "ScriptedChatModel",
                    message: "no scripted response".to_string(),
                })
            })
    }
}

/// Returns `{"data":{"video_id":"vid_N"}}` for posts unless a response is queued.
#[derive(Default)]
pub struct FakeAvatar {
    posted: Mutex<Vec<Value>>,
    post_responses: Mutex<VecDeque<Value>>,
    get_responses: Mutex<VecDeque<Value>>,
    counter: AtomicUsize,
}

impl FakeAvatar {
    pub fn posted(&self) -> Vec<Value> {
        self.posted.lock().unwrap().clone()
    }

    pub fn push_post_response(&self, response: Value) {
        self.post_responses.lock().unwrap().push_back(response);
    }

    pub fn push_get_response(&self, response: Value) {
        self.get_responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl AvatarApi for FakeAvatar {
    async fn post(&self, _path: &str, payload: &Value) -> Result<Value, ProviderError> {
        self.posted.lock().unwrap().push(payload.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self
            .post_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| json!({"data": {"video_id": format!("vid_{n}")}})))
    }

    async fn get(&self, _path: &str) -> Result<Value, ProviderError> {
        Ok(self
            .get_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| json!({"data": {"status": "processing"}})))
    }
}

#[derive(Default)]
pub struct FakeSpeech {
    responses: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
    content_types: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn push_response(&self, text: &str) {
        self.responses.lock().unwrap().push_back(text.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn content_types(&self) -> Vec<String> {
        self.content_types.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn transcribe(&self, _audio: Vec<u8>, content_type: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.content_types
            .lock()
            .unwrap()
            .push(content_type.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "Transcribed answer".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub llm: Arc<ScriptedChatModel>,
    pub avatar: Arc<FakeAvatar>,
    pub speech: Arc<FakeSpeech>,
    pub queue: Arc<RecordingQueue>,
    pub hub: Arc<NotificationHub>,
    pub pipeline: Arc<Pipeline>,
}

impl TestHarness {
    pub fn new() -> Self {
        let config = Config::for_tests();
        let store = Arc::new(MemoryStore::default());
        let blobs = Arc::new(MemoryBlobStore::default());
        let llm = Arc::new(ScriptedChatModel::default());
        let avatar = Arc::new(FakeAvatar::default());
        let speech = Arc::new(FakeSpeech::default());
        let queue = Arc::new(RecordingQueue::default());
        let hub = Arc::new(NotificationHub::new());

        let pipeline = Arc::new(Pipeline::new(
            PipelineDeps {
                store: store.clone(),
                blobs: blobs.clone(),
                llm: llm.clone(),
                avatar: avatar.clone(),
                speech: speech.clone(),
                queue: queue.clone(),
                notifications: hub.clone(),
            },
            PipelineSettings::from_config(&config),
        ));

        Self {
            store,
            blobs,
            llm,
            avatar,
            speech,
            queue,
            hub,
            pipeline,
        }
    }
}
