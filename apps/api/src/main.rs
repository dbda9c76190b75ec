mod avatar_client;
mod blobs;
mod config;
mod db;
mod errors;
mod jobs;
mod llm_client;
mod models;
mod notifications;
mod pipeline;
mod routes;
mod speech_client;
mod state;
mod store;

#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::avatar_client::AvatarClient;
use crate::blobs::S3BlobStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::jobs::{worker::run_worker, JobQueue, RedisJobQueue};
use crate::llm_client::LlmClient;
use crate::notifications::NotificationHub;
use crate::pipeline::{Pipeline, PipelineDeps, PipelineSettings};
use crate::routes::build_router;
use crate::speech_client::SpeechClient;
use crate::state::AppState;
use crate::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.database_max_connections).await?;
    let store = Arc::new(PgStore::new(db));

    // Initialize Redis job queue
    let redis = redis::Client::open(config.redis_url.clone())?;
    let queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::connect(&redis).await?);
    info!("Redis job queue initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let blobs = Arc::new(S3BlobStore::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized");

    // Provider clients; missing credentials surface on first use
    let llm = LlmClient::new(config.llm.clone())?;
    info!("LLM client initialized (model: {})", llm.model());
    let avatar = AvatarClient::new(config.heygen_api_key.clone())?;
    let speech = SpeechClient::new(config.elevenlabs_api_key.clone())?;

    let notifications = Arc::new(NotificationHub::new());

    let pipeline = Arc::new(Pipeline::new(
        PipelineDeps {
            store,
            blobs,
            llm: Arc::new(llm),
            avatar: Arc::new(avatar),
            speech: Arc::new(speech),
            queue: queue.clone(),
            notifications: notifications.clone(),
        },
        PipelineSettings::from_config(&config),
    ));
    info!(
        "Video callback URL: {}",
        pipeline.settings().callback_url()
    );

    // Background workers
    for worker_id in 0..config.worker_concurrency.max(1) {
        tokio::spawn(run_worker(worker_id, pipeline.clone(), queue.clone()));
    }
    info!("Spawned {} job workers", config.worker_concurrency.max(1));

    // Build app state
    let state = AppState {
        pipeline,
        notifications,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "interview-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
