//! Background jobs: definitions, retry policy and the queue seam.
//!
//! Jobs are at-most-once. A claimed job that crashes its worker is lost; a job
//! that fails is rescheduled according to its `RetryPolicy` and otherwise
//! reported to the orchestrator.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::FailureClass;

pub mod redis_queue;
pub mod worker;

pub use redis_queue::RedisJobQueue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    GenerateQuestions { session_id: Uuid },
    GenerateVideos { session_id: Uuid },
    TranscribeAnswer { answer_id: Uuid },
    GenerateFeedback { session_id: Uuid },
}

impl Job {
    /// Human-readable stage name, used in logs and failure reasons.
    pub fn stage(&self) -> &'static str {
        match self {
            Job::GenerateQuestions { .. } => "question generation",
            Job::GenerateVideos { .. } => "video generation",
            Job::TranscribeAnswer { .. } => "answer transcription",
            Job::GenerateFeedback { .. } => "feedback generation",
        }
    }

    /// Session whose state should reflect a permanent failure of this job.
    /// Transcription failures do not fail the session.
    pub fn failing_session(&self) -> Option<Uuid> {
        match self {
            Job::GenerateQuestions { session_id }
            | Job::GenerateVideos { session_id }
            | Job::GenerateFeedback { session_id } => Some(*session_id),
            Job::TranscribeAnswer { .. } => None,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Job::GenerateQuestions { .. } => RetryPolicy {
                api: RetryTier::new(3, Duration::from_secs(5)),
                unexpected: RetryTier::new(2, Duration::from_secs(10)),
            },
            Job::GenerateVideos { .. }
            | Job::TranscribeAnswer { .. }
            | Job::GenerateFeedback { .. } => RetryPolicy {
                api: RetryTier::new(3, Duration::from_secs(10)),
                unexpected: RetryTier::new(2, Duration::from_secs(20)),
            },
        }
    }
}

/// A queued job plus its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub id: Uuid,
    pub job: Job,
    /// 1-based number of the execution this envelope represents.
    pub attempt: u32,
}

impl JobEnvelope {
    pub fn new(job: Job) -> Self {
        Self {
            id: Uuid::new_v4(),
            job,
            attempt: 1,
        }
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            id: self.id,
            job: self.job.clone(),
            attempt: self.attempt + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTier {
    /// Total executions allowed, including the first.
    pub attempts: u32,
    pub wait: Duration,
}

impl RetryTier {
    pub const fn new(attempts: u32, wait: Duration) -> Self {
        Self { attempts, wait }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub api: RetryTier,
    pub unexpected: RetryTier,
}

impl RetryPolicy {
    /// Delay before the next execution, or `None` when the failure is final.
    pub fn retry_delay(&self, class: FailureClass, attempt: u32) -> Option<Duration> {
        let tier = match class {
            FailureClass::Api => self.api,
            FailureClass::Unexpected => self.unexpected,
            FailureClass::Configuration | FailureClass::NotFound => return None,
        };
        (attempt < tier.attempts).then_some(tier.wait)
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Schedules `envelope` to become due after `delay`.
    async fn schedule(&self, envelope: JobEnvelope, delay: Duration) -> Result<()>;

    /// Claims one due job, removing it from the queue.
    async fn claim_due(&self) -> Result<Option<JobEnvelope>>;

    async fn enqueue(&self, job: Job) -> Result<()> {
        self.schedule(JobEnvelope::new(job), Duration::ZERO).await
    }
}
