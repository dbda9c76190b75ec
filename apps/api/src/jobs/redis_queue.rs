use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::jobs::{JobEnvelope, JobQueue};

const QUEUE_KEY: &str = "interview:jobs";

/// Delayed job queue on a Redis sorted set scored by due time (unix millis).
///
/// A worker claims a job by removing it; only the worker whose `ZREM` returns 1
/// runs it.
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: MultiplexedConnection,
}

impl RedisJobQueue {
    pub async fn connect(client: &redis::Client) -> Result<Self> {
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn schedule(&self, envelope: JobEnvelope, delay: Duration) -> Result<()> {
        let member = serde_json::to_string(&envelope)?;
        let due_at = chrono::Utc::now().timestamp_millis() + delay.as_millis() as i64;

        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(QUEUE_KEY, &member, due_at).await?;

        debug!(
            job_id = %envelope.id,
            attempt = envelope.attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduled {}",
            envelope.job.stage()
        );
        Ok(())
    }

    async fn claim_due(&self) -> Result<Option<JobEnvelope>> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut conn = self.conn.clone();

        let due: Vec<String> = conn
            .zrangebyscore_limit(QUEUE_KEY, "-inf", now, 0, 1)
            .await?;
        let Some(member) = due.into_iter().next() else {
            return Ok(None);
        };

        let removed: i64 = conn.zrem(QUEUE_KEY, &member).await?;
        if removed == 0 {
            // Another worker claimed it first.
            return Ok(None);
        }

        match serde_json::from_str::<JobEnvelope>(&member) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(e) => {
                warn!("Dropping undecodable job payload: {e}");
                Ok(None)
            }
        }
    }
}
