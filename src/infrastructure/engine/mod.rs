use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::domain::synth::{Frame, FrameReceiver, PipelineFactory, SpeechPipeline, SynthError};

/// Bounded frame channel: a slow consumer stalls the reader, which stalls
/// the worker through its stdout pipe.
const FRAME_CHANNEL_CAPACITY: usize = 8;
const READ_CHUNK_BYTES: usize = 4096;

/// Creates [`CommandPipeline`]s around an external synthesis worker command.
///
/// The worker contract: invoked as `<program> --lang <code> --voice <path>`,
/// it reads the text to speak on stdin and writes raw little-endian f32
/// samples (mono, 24 kHz) on stdout. Non-zero exit means synthesis failed
/// and stderr carries the diagnostic.
pub struct CommandPipelineFactory {
    program: String,
}

impl CommandPipelineFactory {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl PipelineFactory for CommandPipelineFactory {
    async fn create(&self, language: char) -> Result<Box<dyn SpeechPipeline>, SynthError> {
        Ok(Box::new(CommandPipeline {
            program: self.program.clone(),
            language,
            voice_path: None,
        }))
    }
}

/// One per (voice, language) cache entry. Stateful: `load_voice` must have
/// run before `synthesize`.
pub struct CommandPipeline {
    program: String,
    language: char,
    voice_path: Option<PathBuf>,
}

#[async_trait]
impl SpeechPipeline for CommandPipeline {
    async fn load_voice(&mut self, weights: &Path) -> Result<(), SynthError> {
        tokio::fs::metadata(weights)
            .await
            .map_err(|e| SynthError::Build(format!("voice weights unreadable: {e}")))?;
        self.voice_path = Some(weights.to_path_buf());
        Ok(())
    }

    async fn synthesize(&mut self, text: &str) -> Result<FrameReceiver, SynthError> {
        let voice_path = self
            .voice_path
            .clone()
            .ok_or_else(|| SynthError::Synthesis("no voice loaded".to_string()))?;

        let mut child = Command::new(&self.program)
            .arg("--lang")
            .arg(self.language.to_string())
            .arg("--voice")
            .arg(&voice_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SynthError::Synthesis(format!("failed to spawn {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SynthError::Synthesis("worker stdin unavailable".to_string()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SynthError::Synthesis("worker stdout unavailable".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SynthError::Synthesis("worker stderr unavailable".to_string()))?;

        let text = text.to_string();
        tokio::spawn(async move {
            // EPIPE here means the worker died; its exit status reports that
            let _ = stdin.write_all(text.as_bytes()).await;
            let _ = stdin.shutdown().await;
            drop(stdin);
        });

        let stderr_task = tokio::spawn(async move {
            let mut diagnostics = String::new();
            let _ = stderr.read_to_string(&mut diagnostics).await;
            diagnostics
        });

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut buf = [0u8; READ_CHUNK_BYTES];
            // Carries a partial trailing sample between reads
            let mut pending: Vec<u8> = Vec::new();

            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        pending.extend_from_slice(&buf[..n]);
                        let whole = pending.len() - pending.len() % 4;
                        if whole == 0 {
                            continue;
                        }
                        let frame: Frame = pending[..whole]
                            .chunks_exact(4)
                            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                            .collect();
                        pending.drain(..whole);
                        if tx.send(Ok(frame)).await.is_err() {
                            // Consumer went away; drop the worker with us
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(SynthError::Synthesis(format!(
                                "worker output read failed: {e}"
                            ))))
                            .await;
                        return;
                    }
                }
            }

            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    let diagnostics = stderr_task.await.unwrap_or_default();
                    let _ = tx
                        .send(Err(SynthError::Synthesis(format!(
                            "worker exited with {status}: {}",
                            diagnostics.trim()
                        ))))
                        .await;
                }
                Err(e) => {
                    let _ = tx
                        .send(Err(SynthError::Synthesis(format!(
                            "failed to reap worker: {e}"
                        ))))
                        .await;
                }
            }
        });

        Ok(rx)
    }
}
