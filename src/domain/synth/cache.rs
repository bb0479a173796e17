use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use moka::future::Cache;
use serde::Serialize;
use tokio::sync::Mutex;

use super::{AssetFetcher, PipelineFactory, SpeechPipeline, SynthError};

/// Bounded size of the pipeline cache (and, in the hub, the asset cache)
pub const CACHE_CAPACITY: u64 = 8;

/// Hit/miss/size counters surfaced on the liveness probe
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: u64,
}

/// A ready-to-use pipeline with its voice weights loaded, plus the on-disk
/// path of those weights. Checked-out `Arc`s stay valid after eviction;
/// in-flight synthesis runs to completion regardless of the cache index.
pub struct PipelineEntry {
    pub voice: String,
    pub language: char,
    pub voice_path: PathBuf,
    pub pipeline: Mutex<Box<dyn SpeechPipeline>>,
}

/// One mutual-exclusion handle per voice asset name, created on first
/// reference and never removed. The catalog is bounded, so the map is too.
struct VoiceLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VoiceLocks {
    fn new() -> Self {
        Self {
            inner: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, voice: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().expect("voice lock map poisoned");
        map.entry(voice.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Bounded memoizing cache mapping (voice asset, language code) to a loaded
/// synthesis pipeline. The expensive download + instantiate + load path runs
/// under the voice's exclusive lock, so at most one build is in flight per
/// voice while distinct voices build concurrently.
pub struct PipelineCache {
    factory: Arc<dyn PipelineFactory>,
    assets: Arc<dyn AssetFetcher>,
    entries: Cache<(String, char), Arc<PipelineEntry>>,
    locks: VoiceLocks,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PipelineCache {
    pub fn new(factory: Arc<dyn PipelineFactory>, assets: Arc<dyn AssetFetcher>) -> Self {
        Self {
            factory,
            assets,
            entries: Cache::new(CACHE_CAPACITY),
            locks: VoiceLocks::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Serialization handle for all operations touching a voice's loaded
    /// weights. Held by the block driver across a whole synthesis stream.
    pub fn voice_lock(&self, voice: &str) -> Arc<Mutex<()>> {
        self.locks.lock_for(voice)
    }

    pub async fn get(
        &self,
        voice: &str,
        language: char,
    ) -> Result<Arc<PipelineEntry>, SynthError> {
        let key = (voice.to_string(), language);

        if let Some(entry) = self.entries.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry);
        }

        let lock = self.locks.lock_for(voice);
        let _guard = lock.lock().await;

        // A concurrent request may have built the entry while we waited;
        // losing the build race is a hit, not a second miss
        if let Some(entry) = self.entries.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let voice_path = self.assets.fetch(voice).await?;
        let mut pipeline = self.factory.create(language).await?;
        pipeline.load_voice(&voice_path).await?;

        tracing::info!(voice, language = %language, path = %voice_path.display(), "Pipeline built");

        let entry = Arc::new(PipelineEntry {
            voice: voice.to_string(),
            language,
            voice_path,
            pipeline: Mutex::new(pipeline),
        });
        self.entries.insert(key, entry.clone()).await;
        Ok(entry)
    }

    pub async fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.entry_count(),
        }
    }
}
