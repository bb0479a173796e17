pub mod cache;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use cache::{CacheStats, PipelineCache};

/// A fixed-format chunk of normalized f32 audio samples produced by one
/// synthesis step.
pub type Frame = Vec<f32>;

/// Lazy frame sequence published by a synthesis producer task. Bounded, so
/// a slow consumer applies backpressure to the engine.
pub type FrameReceiver = mpsc::Receiver<Result<Frame, SynthError>>;

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("voice asset download failed: {0}")]
    Download(String),

    #[error("pipeline build failed: {0}")]
    Build(String),

    #[error("synthesis failed: {0}")]
    Synthesis(String),
}

/// An opaque, stateful synthesis pipeline for one language, able to load a
/// voice asset and then lazily produce audio frames for given text.
///
/// Implementations are stateful: `load_voice` mutates the pipeline, and
/// callers must serialize access per voice (see [`cache::PipelineCache`]).
#[async_trait]
pub trait SpeechPipeline: Send {
    async fn load_voice(&mut self, weights: &Path) -> Result<(), SynthError>;

    /// Start synthesis and return the frame stream. The pipeline is borrowed
    /// mutably for the call; callers hold the per-voice lock across the
    /// whole stream.
    async fn synthesize(&mut self, text: &str) -> Result<FrameReceiver, SynthError>;
}

/// Creates language-specific pipelines. One factory serves the whole process.
#[async_trait]
pub trait PipelineFactory: Send + Sync {
    async fn create(&self, language: char) -> Result<Box<dyn SpeechPipeline>, SynthError>;
}

/// Resolves a voice asset name to its on-disk weights file, memoizing
/// downloads. Keyed by voice name only: the same weights file is reused
/// across pipeline instantiations regardless of language.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, voice: &str) -> Result<PathBuf, SynthError>;
}
