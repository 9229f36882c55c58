use anyhow::Result;
use aws_config::{BehaviorVersion, Region};
use papyrus_llm::{ClientConfig, OpenAiClient};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod core;
mod middleware;
mod models;

use crate::core::{
    config::{Settings, StorageBackend},
    object_store::S3ObjectStore,
    state::{AppState, Services, Stores},
    storage::{CombinedStore, InMemoryStore, MeilisearchClient, Neo4jClient},
    sweeper::ExpirySweeper,
    transcription::{AwsTranscriber, SarvamClient},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::new()?;

    info!(
        "Starting Papyrus API on {}:{}",
        settings.server.host, settings.server.port
    );

    let state = create_state(&settings).await?;

    let mut sweeper = ExpirySweeper::new(settings.cache.sweep_interval());
    for cache in state.sweepable_caches() {
        sweeper = sweeper.register(cache);
    }
    sweeper.spawn();

    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn create_stores(settings: &Settings) -> Result<Stores> {
    match settings.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; records are lost on restart");
            Ok(Stores::shared(Arc::new(InMemoryStore::new())))
        },
        StorageBackend::Neo4j => {
            let neo4j_settings = settings
                .storage
                .neo4j
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("storage.neo4j is required for the neo4j backend"))?;
            let neo4j = Neo4jClient::new(neo4j_settings).await?;

            let meilisearch = match &settings.storage.meilisearch {
                Some(ms_settings) => match MeilisearchClient::new(ms_settings).await {
                    Ok(client) => Some(Arc::new(client)),
                    Err(e) => {
                        warn!("Meilisearch unavailable, searching through Neo4j: {}", e);
                        None
                    },
                },
                None => None,
            };

            Ok(Stores::shared(Arc::new(CombinedStore::new(neo4j, meilisearch))))
        },
    }
}

async fn create_state(settings: &Settings) -> Result<AppState> {
    let stores = create_stores(settings).await?;

    let aws = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(settings.transcription.aws_region.clone()))
        .load()
        .await;

    let provider = OpenAiClient::new(ClientConfig {
        base_url: settings.llm.base_url.clone(),
        api_key: settings.llm.api_key.clone(),
        timeout: Duration::from_secs(settings.llm.timeout_seconds),
    })?;

    let services = Services {
        provider: Arc::new(provider),
        objects: Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&aws))?),
        jobs: Arc::new(AwsTranscriber::new(
            aws_sdk_transcribe::Client::new(&aws),
            Duration::from_secs(settings.transcription.poll_interval_seconds),
        )),
        speech: Arc::new(SarvamClient::new(&settings.transcription)?),
    };

    Ok(AppState::new(settings, stores, services))
}
