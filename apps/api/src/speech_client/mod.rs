//! Speech-to-text client (ElevenLabs).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;

use crate::blobs::recording_extension;
use crate::errors::ProviderError;

const ELEVENLABS_STT_URL: &str = "https://api.elevenlabs.io/v1/speech-to-text";
const TRANSCRIPTION_MODEL: &str = "scribe_v2";
const PROVIDER: &str = "ElevenLabs";

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// `content_type` is the recording's MIME type as uploaded.
    async fn transcribe(&self, audio: Vec<u8>, content_type: &str) -> Result<String, ProviderError>;
}

#[derive(Clone)]
pub struct SpeechClient {
    client: Client,
    api_key: Option<String>,
}

impl SpeechClient {
    pub fn new(api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            // Long recordings take minutes to transcribe.
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(300))
                .build()?,
            api_key,
        })
    }
}

#[async_trait]
impl SpeechToText for SpeechClient {
    async fn transcribe(&self, audio: Vec<u8>, content_type: &str) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::Configuration {
            provider: PROVIDER,
            key: "ELEVENLABS_API_KEY",
        })?;

        let form = Form::new()
            .part("file", upload_part(audio, content_type)?)
            .text("model_id", TRANSCRIPTION_MODEL);

        let response = self
            .client
            .post(ELEVENLABS_STT_URL)
            .header("xi-api-key", api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| api_error(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| api_error(format!("failed to read response body: {e}")))?;

        parse_transcript(status, &body)
    }
}

fn upload_file_name(content_type: &str) -> String {
    format!("answer.{}", recording_extension(content_type))
}

fn upload_part(audio: Vec<u8>, content_type: &str) -> Result<Part, ProviderError> {
    Part::bytes(audio)
        .file_name(upload_file_name(content_type))
        .mime_str(content_type)
        .map_err(|e| ProviderError::Unexpected {
            provider: PROVIDER,
            message: format!("invalid upload content type '{content_type}': {e}"),
        })
}

fn api_error(message: String) -> ProviderError {
    ProviderError::Api {
        provider: PROVIDER,
        message,
    }
}

fn parse_transcript(status: reqwest::StatusCode, body: &str) -> Result<String, ProviderError> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| api_error(format!("failed to parse response: {e}")))?;

    if !status.is_success() {
        let message = parsed
            .pointer("/error/message")
            .or_else(|| parsed.get("detail"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(api_error(format!("status {status}: {message}")));
    }

    Ok(parsed
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string())
}
