use anyhow::{bail, Context};
use std::sync::Arc;
use story_narrator::domain::audio::{PcmDecoder, TrackStore};
use story_narrator::domain::narration::{NarrationDeps, NarrationManager, NarrationSettings, NarrationTarget};
use story_narrator::domain::persistence::PersistenceCoordinator;
use story_narrator::domain::playback::PlayOptions;
use story_narrator::domain::synthesis::SynthesisClient;
use story_narrator::infrastructure::config::{Config, LogFormat, SynthesisProvider};
use story_narrator::infrastructure::playback::{HeadlessMediaSink, HeadlessSpeechEngine};
use story_narrator::infrastructure::repositories::{
    HttpObjectStorage, HttpSynthesisRepository, MemoryObjectStorage, ObjectStorage,
    PollySynthesisRepository, SynthesisRepository,
};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: story-narrator <text-file> [user-id] [artifact-id] [story-index]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    // Initialize logging
    init_logging(&config);

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!(USAGE);
    };
    let user_id = args.next().unwrap_or_else(|| "local".to_string());
    let artifact_id = args.next().unwrap_or_else(|| "narration".to_string());
    let story_index: usize = match args.next() {
        Some(index) => index.parse().context(USAGE)?,
        None => 0,
    };

    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path))?;

    tracing::info!(
        path = %path,
        provider = ?config.synthesis_provider,
        environment = ?config.environment,
        "Starting story narrator"
    );

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Instantiate repositories
    let synthesis_repo = build_synthesis_repository(&config).await?;
    let storage = build_storage(&config)?;

    // 2. Instantiate domain services
    let tracks = Arc::new(TrackStore::new());
    let synthesis = Arc::new(SynthesisClient::new(
        synthesis_repo,
        PcmDecoder::new(config.sample_rate),
    ));
    let persistence = Arc::new(PersistenceCoordinator::new(
        storage,
        tracks,
        config.verification_policy(),
    ));

    // 3. Instantiate playback adapters
    let deps = NarrationDeps {
        synthesis,
        persistence,
        speech: Arc::new(HeadlessSpeechEngine::new()),
        media: Arc::new(HeadlessMediaSink::new()),
        listener: None,
    };
    let settings = NarrationSettings {
        chunk_limits: config.chunk_limits(),
        retry: config.retry_policy(),
        timings: config.playback_timings(),
        voice: config.voice_preference(),
        language: None,
        track_cache_enabled: config.track_cache_enabled,
    };

    let manager = NarrationManager::new(
        NarrationTarget::new(user_id, artifact_id, story_index),
        settings,
        deps,
    );

    manager.initialize(text)?;
    let state = manager.create_audio().await?;
    if let Some(warning) = &state.warning {
        tracing::warn!(warning = %warning, "Narration created with warnings");
    }

    manager.play(PlayOptions::default()).await?;
    wait_for_playback_end(&manager).await;

    manager.wait_for_persistence().await;
    let state = manager.get_state();
    tracing::info!(
        remote_key = ?state.remote_key,
        units_completed = state.units_completed,
        units_failed = state.units_failed,
        warning = ?state.warning,
        "Narration finished"
    );

    manager.destroy();
    Ok(())
}

async fn build_synthesis_repository(config: &Config) -> anyhow::Result<Arc<dyn SynthesisRepository>> {
    match config.synthesis_provider {
        SynthesisProvider::Http => {
            let endpoint = config
                .synthesis_endpoint
                .clone()
                .context("SYNTHESIS_ENDPOINT is not set")?;
            tracing::info!(endpoint = %endpoint, "Using HTTP synthesis endpoint");
            Ok(Arc::new(HttpSynthesisRepository::new(
                endpoint,
                config.synthesis_timeout(),
            )?))
        }
        SynthesisProvider::Polly => {
            // Check for AWS credentials in environment (for debugging)
            let has_access_key = std::env::var("AWS_ACCESS_KEY_ID").is_ok();
            let has_secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").is_ok();
            if !has_access_key || !has_secret_key {
                tracing::warn!("AWS credentials not found in environment variables. Will attempt to use other credential providers (instance metadata, etc.)");
            }

            let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(config.aws_region.clone()))
                .load()
                .await;
            tracing::info!(region = ?aws_config.region(), "AWS configuration loaded");

            let polly_client = Arc::new(aws_sdk_polly::Client::new(&aws_config));
            Ok(Arc::new(PollySynthesisRepository::new(
                polly_client,
                config.neural_voices.clone(),
            )))
        }
    }
}

fn build_storage(config: &Config) -> anyhow::Result<Arc<dyn ObjectStorage>> {
    match &config.storage_base_url {
        Some(base_url) => {
            tracing::info!(storage = %base_url, cdn = ?config.cdn_base_url, "Using HTTP object storage");
            Ok(Arc::new(HttpObjectStorage::new(
                base_url.clone(),
                config.cdn_base_url.clone(),
                config.synthesis_timeout(),
            )?))
        }
        None => {
            tracing::warn!("STORAGE_BASE_URL not set, narration tracks are kept in memory only");
            Ok(Arc::new(MemoryObjectStorage::new()))
        }
    }
}

async fn wait_for_playback_end(manager: &NarrationManager) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = manager.subscribe(move |state| {
        let _ = tx.send(state.is_playing);
    });

    while let Some(is_playing) = rx.recv().await {
        if !is_playing {
            break;
        }
    }
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "story_narrator=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "story_narrator=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
