use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
///
/// Infrastructure settings are required at startup. Provider credentials are
/// optional here and only checked when a client is first used.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// Externally reachable base URL, used for the webhook callback and notification links.
    pub public_host: String,
    pub port: u16,
    pub rust_log: String,
    pub worker_concurrency: usize,
    pub video_request_delay: Duration,
    pub llm: LlmSettings,
    pub heygen_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = LlmSettings::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            public_host: std::env::var("HOST")
                .map(|h| h.trim().to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            worker_concurrency: parse_env("WORKER_CONCURRENCY", 2)?,
            video_request_delay: Duration::from_millis(parse_env("VIDEO_REQUEST_DELAY_MS", 500)?),
            llm: LlmSettings {
                api_key: optional_env("OPENAI_API_KEY"),
                model: optional_env("OPENAI_MODEL").unwrap_or(defaults.model),
                temperature: parse_env("OPENAI_TEMPERATURE", defaults.temperature)?,
                max_tokens: parse_env("OPENAI_MAX_TOKENS", defaults.max_tokens)?,
            },
            heygen_api_key: optional_env("HEYGEN_API_KEY"),
            elevenlabs_api_key: optional_env("ELEVENLABS_API_KEY"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Blank values count as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Config for router and pipeline tests; no external service is contacted.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/interview_test".to_string(),
            database_max_connections: 1,
            redis_url: "redis://localhost".to_string(),
            s3_bucket: "interview-test".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            public_host: "https://interview.example.com".to_string(),
            port: 8080,
            rust_log: "debug".to_string(),
            worker_concurrency: 1,
            video_request_delay: Duration::ZERO,
            llm: LlmSettings::default(),
            heygen_api_key: None,
            elevenlabs_api_key: None,
        }
    }
}
