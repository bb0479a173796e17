use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kokoro_backend::infrastructure::config::{Config, LogFormat};
use kokoro_backend::infrastructure::http::start_http_server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting Kokoro Backend on {}:{}",
        config.host,
        config.port
    );

    // Build the voice catalog from the model repository. A hub failure here
    // is fatal: the catalog is built exactly once, at startup.
    let hub = Arc::new(kokoro_backend::infrastructure::hub::HfVoiceHub::new(
        config.model_repo.clone(),
    ));
    let voice_names =
        kokoro_backend::infrastructure::hub::list_hub_voices(hub.clone()).await?;
    let catalog = Arc::new(kokoro_backend::domain::voice::VoiceCatalog::from_names(
        &voice_names,
    ));
    tracing::info!(
        repo = %config.model_repo,
        voices = catalog.len(),
        "Voice catalog loaded"
    );

    let config = Arc::new(config);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Instantiate the asset store and pipeline factory
    let assets = Arc::new(kokoro_backend::infrastructure::hub::AssetStore::new(
        hub.clone(),
    ));
    let factory = Arc::new(
        kokoro_backend::infrastructure::engine::CommandPipelineFactory::new(
            config.engine_cmd.clone(),
        ),
    );

    // 2. Instantiate the pipeline cache on top of both
    let pipelines = Arc::new(kokoro_backend::domain::synth::PipelineCache::new(
        factory,
        assets.clone(),
    ));

    // 3. Instantiate the domain services
    let segmenter = kokoro_backend::domain::segment::Segmenter::new(
        kokoro_backend::domain::segment::DEFAULT_MIN_WORDS,
    );
    let resolver = kokoro_backend::domain::voice::VoiceResolver::new(catalog.clone());
    let encoder = kokoro_backend::infrastructure::encoder::StreamEncoder::new(
        config.ffmpeg_path.clone(),
        Duration::from_secs_f64(config.encode_timeout_secs),
    );
    let limiter = Arc::new(kokoro_backend::infrastructure::auth::RateLimiter::new(
        Duration::from_secs_f64(config.rate_window_secs),
        config.rate_max_requests,
    ));

    // 4. Instantiate controllers
    let speech_controller = Arc::new(kokoro_backend::controllers::SpeechController::new(
        segmenter,
        resolver,
        pipelines.clone(),
        encoder,
    ));
    let health_controller = Arc::new(kokoro_backend::controllers::HealthController::new(
        catalog,
        pipelines,
        assets,
    ));

    // Start HTTP server with all routes
    start_http_server(config, limiter, speech_controller, health_controller).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "kokoro_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "kokoro_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
