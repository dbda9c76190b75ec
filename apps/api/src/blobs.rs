//! Blob storage for answer recordings and resumes (S3 / MinIO).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;

use crate::errors::PipelineError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), PipelineError>;

    async fn get(&self, key: &str) -> Result<Bytes, PipelineError>;

    async fn delete(&self, key: &str) -> Result<(), PipelineError>;
}

#[derive(Clone)]
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), PipelineError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| PipelineError::Storage(format!("S3 upload of {key} failed: {e}")))?;

        info!("Uploaded {size} bytes to s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, PipelineError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| PipelineError::Storage(format!("S3 download of {key} failed: {e}")))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| PipelineError::Storage(format!("S3 read of {key} failed: {e}")))?;

        Ok(data.into_bytes())
    }

    async fn delete(&self, key: &str) -> Result<(), PipelineError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| PipelineError::Storage(format!("S3 delete of {key} failed: {e}")))?;
        Ok(())
    }
}

/// Key for an answer recording. A fresh suffix per upload keeps re-recordings
/// from overwriting an object a transcription job may be reading.
/// File extension for an uploaded recording's content type.
pub fn recording_extension(content_type: &str) -> &'static str {
    match content_type {
        "video/mp4" => "mp4",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/webm" | "video/webm" => "webm",
        _ => "bin",
    }
}

pub fn recording_key(question_id: uuid::Uuid, content_type: &str) -> String {
    format!(
        "answers/{question_id}/{}.{}",
        uuid::Uuid::new_v4(),
        recording_extension(content_type)
    )
}

pub fn resume_key(session_id: uuid::Uuid) -> String {
    format!("resumes/{session_id}/resume.pdf")
}
