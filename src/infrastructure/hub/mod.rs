use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hf_hub::api::sync::Api;
use moka::future::Cache;

use crate::domain::synth::cache::{CacheStats, CACHE_CAPACITY};
use crate::domain::synth::{AssetFetcher, SynthError};

/// Voice assets live under `voices/<name>.pt` in the model repository
const VOICES_PREFIX: &str = "voices/";
const VOICES_SUFFIX: &str = ".pt";

/// Boundary to the external model repository: list available voice assets,
/// download one. Calls are blocking; [`AssetStore`] moves them off the
/// async runtime.
pub trait VoiceHub: Send + Sync {
    /// Voice asset stems, e.g. `af_heart`
    fn list_voices(&self) -> Result<Vec<String>>;

    /// Download a voice's weights file, returning its local path
    fn download_voice(&self, voice: &str) -> Result<PathBuf>;
}

/// HuggingFace Hub implementation, addressed by a fixed model repository id
pub struct HfVoiceHub {
    repo_id: String,
}

impl HfVoiceHub {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
        }
    }
}

impl VoiceHub for HfVoiceHub {
    fn list_voices(&self) -> Result<Vec<String>> {
        let api = Api::new().context("Failed to create HuggingFace API")?;
        let info = api
            .model(self.repo_id.clone())
            .info()
            .with_context(|| format!("Failed to list files of {}", self.repo_id))?;

        let voices = info
            .siblings
            .into_iter()
            .filter_map(|sibling| {
                let name = sibling.rfilename;
                let stem = name
                    .strip_prefix(VOICES_PREFIX)?
                    .strip_suffix(VOICES_SUFFIX)?;
                Some(stem.to_string())
            })
            .collect();
        Ok(voices)
    }

    fn download_voice(&self, voice: &str) -> Result<PathBuf> {
        let api = Api::new().context("Failed to create HuggingFace API")?;
        let filename = format!("{VOICES_PREFIX}{voice}{VOICES_SUFFIX}");
        api.model(self.repo_id.clone())
            .get(&filename)
            .with_context(|| format!("Failed to download {filename}"))
    }
}

/// List the hub's voices without blocking the runtime. Failure here is fatal
/// to startup: the catalog is built exactly once, never partially.
pub async fn list_hub_voices(hub: Arc<dyn VoiceHub>) -> Result<Vec<String>> {
    tokio::task::spawn_blocking(move || hub.list_voices())
        .await
        .context("voice listing task panicked")?
}

/// Bounded memoizing download cache, keyed by voice asset name only: the
/// same weights file is shared by every pipeline instantiation of a voice.
pub struct AssetStore {
    hub: Arc<dyn VoiceHub>,
    cache: Cache<String, PathBuf>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AssetStore {
    pub fn new(hub: Arc<dyn VoiceHub>) -> Self {
        Self {
            hub,
            cache: Cache::new(CACHE_CAPACITY),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.cache.entry_count(),
        }
    }
}

#[async_trait]
impl AssetFetcher for AssetStore {
    async fn fetch(&self, voice: &str) -> Result<PathBuf, SynthError> {
        if let Some(path) = self.cache.get(voice).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(path);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let hub = self.hub.clone();
        let name = voice.to_string();
        let path = tokio::task::spawn_blocking(move || hub.download_voice(&name))
            .await
            .map_err(|e| SynthError::Download(format!("download task panicked: {e}")))?
            .map_err(|e| SynthError::Download(e.to_string()))?;

        tracing::info!(voice, path = %path.display(), "Voice asset downloaded");
        self.cache.insert(voice.to_string(), path.clone()).await;
        Ok(path)
    }
}
