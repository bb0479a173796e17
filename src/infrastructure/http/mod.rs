use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    controllers::{HealthController, SpeechController},
    infrastructure::auth::{gate_middleware, request_id_middleware, RateLimiter},
    infrastructure::config::Config,
};

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    config: Arc<Config>,
    limiter: Arc<RateLimiter>,
    speech_controller: Arc<SpeechController>,
    health_controller: Arc<HealthController>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Synthesis route (needs admission: bearer auth + rate limit)
    let speech_routes = Router::new()
        .route("/v1/audio/speech", post(SpeechController::synthesize))
        .with_state(speech_controller)
        .layer(middleware::from_fn_with_state(
            (config.clone(), limiter),
            gate_middleware,
        ));

    // Probes (public - no auth required)
    let probe_routes = Router::new()
        .route("/healthz", get(HealthController::healthz))
        .route("/readyz", get(HealthController::readyz))
        .with_state(health_controller);

    let app = Router::new()
        .merge(speech_routes)
        .merge(probe_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn cors_layer(config: &Config) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    if config.cors_allow_origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }
    let origins = config
        .cors_allow_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}
