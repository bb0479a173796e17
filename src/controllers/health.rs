use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::{
    synth::PipelineCache,
    voice::{VoiceCatalog, DEFAULT_LANGUAGE, DEFAULT_VOICE},
};
use crate::infrastructure::hub::AssetStore;

pub struct HealthController {
    started: Instant,
    catalog: Arc<VoiceCatalog>,
    pipelines: Arc<PipelineCache>,
    assets: Arc<AssetStore>,
}

impl HealthController {
    pub fn new(
        catalog: Arc<VoiceCatalog>,
        pipelines: Arc<PipelineCache>,
        assets: Arc<AssetStore>,
    ) -> Self {
        Self {
            started: Instant::now(),
            catalog,
            pipelines,
            assets,
        }
    }

    /// GET /healthz - Liveness with uptime and cache counters
    pub async fn healthz(State(controller): State<Arc<HealthController>>) -> impl IntoResponse {
        Json(json!({
            "status": "ok",
            "uptime_s": controller.started.elapsed().as_secs(),
            "voices_count": controller.catalog.len(),
            "pipeline_cache": controller.pipelines.stats().await,
            "voice_cache": controller.assets.stats().await,
        }))
    }

    /// GET /readyz - Readiness: warm one voice end to end
    pub async fn readyz(State(controller): State<Arc<HealthController>>) -> impl IntoResponse {
        let (voice, language) = controller
            .catalog
            .first()
            .map(|descriptor| (descriptor.full_name.clone(), descriptor.language))
            .unwrap_or_else(|| (DEFAULT_VOICE.to_string(), DEFAULT_LANGUAGE));

        match controller.pipelines.get(&voice, language).await {
            Ok(_) => (StatusCode::OK, Json(json!({ "ready": true }))),
            Err(err) => {
                tracing::warn!(voice = %voice, error = %err, "Readiness warmup failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "ready": false, "error": err.to_string() })),
                )
            }
        }
    }
}
