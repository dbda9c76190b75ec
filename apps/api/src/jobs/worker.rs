//! Worker loop: claims due jobs, runs the matching pipeline stage and applies
//! the job's retry policy to failures.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::errors::{FailureClass, PipelineError};
use crate::jobs::{Job, JobEnvelope, JobQueue};
use crate::pipeline::{Pipeline, SessionCommand};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Runs forever, one job at a time.
pub async fn run_worker(worker_id: usize, pipeline: Arc<Pipeline>, queue: Arc<dyn JobQueue>) {
    info!(worker_id, "Job worker started");

    loop {
        match queue.claim_due().await {
            Ok(Some(envelope)) => process(&pipeline, queue.as_ref(), envelope).await,
            Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
            Err(e) => {
                error!(worker_id, "Failed to poll job queue: {e:?}");
                tokio::time::sleep(POLL_INTERVAL * 4).await;
            }
        }
    }
}

/// Executes one claimed job and handles its outcome.
pub async fn process(pipeline: &Pipeline, queue: &dyn JobQueue, envelope: JobEnvelope) {
    info!(
        job_id = %envelope.id,
        attempt = envelope.attempt,
        "Running {}",
        envelope.job.stage()
    );

    match execute(pipeline, &envelope.job).await {
        Ok(()) => info!(job_id = %envelope.id, "Finished {}", envelope.job.stage()),
        Err(err) => handle_failure(pipeline, queue, envelope, err).await,
    }
}

async fn execute(pipeline: &Pipeline, job: &Job) -> Result<(), PipelineError> {
    match job {
        Job::GenerateQuestions { session_id } => {
            pipeline.generate_questions(*session_id).await.map(|_| ())
        }
        Job::GenerateVideos { session_id } => {
            pipeline.generate_videos(*session_id).await.map(|_| ())
        }
        Job::TranscribeAnswer { answer_id } => {
            pipeline.transcribe_answer(*answer_id).await.map(|_| ())
        }
        Job::GenerateFeedback { session_id } => {
            pipeline.generate_feedback(*session_id).await.map(|_| ())
        }
    }
}

async fn handle_failure(
    pipeline: &Pipeline,
    queue: &dyn JobQueue,
    envelope: JobEnvelope,
    err: PipelineError,
) {
    let class = err.failure_class();
    let stage = envelope.job.stage();

    match class {
        FailureClass::NotFound => {
            warn!(job_id = %envelope.id, "Skipping {stage}: {err}");
            return;
        }
        FailureClass::Configuration => {
            error!(job_id = %envelope.id, "Configuration error during {stage}, not retrying: {err}");
        }
        FailureClass::Api | FailureClass::Unexpected => {
            let policy = envelope.job.retry_policy();
            if let Some(delay) = policy.retry_delay(class, envelope.attempt) {
                warn!(
                    job_id = %envelope.id,
                    attempt = envelope.attempt,
                    "{stage} failed, retrying in {}s: {err}",
                    delay.as_secs()
                );
                match queue.schedule(envelope.next_attempt(), delay).await {
                    Ok(()) => return,
                    Err(e) => error!(job_id = %envelope.id, "Failed to reschedule {stage}: {e:?}"),
                }
            } else {
                error!(
                    job_id = %envelope.id,
                    attempt = envelope.attempt,
                    "{stage} failed permanently: {err}"
                );
            }
        }
    }

    if let Some(session_id) = envelope.job.failing_session() {
        let command = SessionCommand::StageFailed {
            session_id,
            stage,
            reason: err.to_string(),
        };
        if let Err(e) = pipeline.apply(command).await {
            error!(session_id = %session_id, "Failed to record {stage} failure: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::models::session::SessionStatus;
    use crate::notifications::NotificationKind;
    use crate::testing::{seed_session, TestHarness};

    #[tokio::test]
    async fn test_api_failure_is_rescheduled_with_next_attempt() {
        let harness = TestHarness::new();
        let session = seed_session(&harness.store, 3).await;
        harness
            .llm
            .push_error(ProviderError::Api {
                provider: "OpenAI",
                message: "503".to_string(),
            });

        let envelope = JobEnvelope::new(Job::GenerateQuestions {
            session_id: session.id,
        });
        process(&harness.pipeline, harness.queue.as_ref(), envelope.clone()).await;

        let scheduled = harness.queue.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0.attempt, 2);
        assert_eq!(scheduled[0].1, Duration::from_secs(5));
        assert_eq!(
            harness.store.session_status(session.id),
            SessionStatus::Created
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_mark_session_failed_and_notify() {
        let harness = TestHarness::new();
        let session = seed_session(&harness.store, 3).await;
        let (_, mut rx) = harness.hub.connect(session.user_id).await;
        harness.llm.push_error(ProviderError::Api {
            provider: "OpenAI",
            message: "503".to_string(),
        });

        let mut envelope = JobEnvelope::new(Job::GenerateQuestions {
            session_id: session.id,
        });
        envelope.attempt = 3;
        process(&harness.pipeline, harness.queue.as_ref(), envelope).await;

        assert!(harness.queue.scheduled().is_empty());
        assert_eq!(
            harness.store.session_status(session.id),
            SessionStatus::Failed
        );
        assert!(harness.store.list_questions_sync(session.id).is_empty());

        let message = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert_eq!(
            json["type"],
            serde_json::to_value(NotificationKind::GenerationFailed).unwrap()
        );
    }

    #[tokio::test]
    async fn test_configuration_error_is_not_retried() {
        let harness = TestHarness::new();
        let session = seed_session(&harness.store, 3).await;
        harness.llm.push_error(ProviderError::Configuration {
            provider: "OpenAI",
            key: "OPENAI_API_KEY",
        });

        let envelope = JobEnvelope::new(Job::GenerateQuestions {
            session_id: session.id,
        });
        process(&harness.pipeline, harness.queue.as_ref(), envelope).await;

        assert!(harness.queue.scheduled().is_empty());
        assert_eq!(
            harness.store.session_status(session.id),
            SessionStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_missing_answer_is_skipped_without_retry() {
        let harness = TestHarness::new();
        let envelope = JobEnvelope::new(Job::TranscribeAnswer {
            answer_id: uuid::Uuid::new_v4(),
        });
        process(&harness.pipeline, harness.queue.as_ref(), envelope).await;

        assert!(harness.queue.scheduled().is_empty());
        assert_eq!(harness.speech.calls(), 0);
    }
}
