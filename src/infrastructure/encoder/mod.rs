use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::domain::synth::Frame;
use crate::infrastructure::config::{BITS_PER_SAMPLE, CHANNELS, SAMPLE_RATE};

const READ_CHUNK_BYTES: usize = 4096;
const OUTPUT_CHANNEL_CAPACITY: usize = 16;

/// Size sentinel for a streaming container: total length is unknown up front
const UNKNOWN_SIZE: u32 = 0xFFFF_FFFF;

/// Requested output encoding for a synthesis response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Opus,
    Mp3,
    Webm,
    Wav,
}

impl ResponseFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            ResponseFormat::Opus => "audio/ogg",
            ResponseFormat::Mp3 => "audio/mpeg",
            ResponseFormat::Webm => "audio/webm",
            ResponseFormat::Wav => "audio/wav",
        }
    }

    /// The encoder-backed variant of this format. WAV is served directly as
    /// header + raw PCM and never reaches the subprocess.
    pub fn encoded(self) -> Option<EncodedFormat> {
        match self {
            ResponseFormat::Opus => Some(EncodedFormat::Opus),
            ResponseFormat::Mp3 => Some(EncodedFormat::Mp3),
            ResponseFormat::Webm => Some(EncodedFormat::Webm),
            ResponseFormat::Wav => None,
        }
    }
}

/// Formats produced by the external encoder subprocess
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedFormat {
    Opus,
    Mp3,
    Webm,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Timeout audio generation")]
    Stalled,

    #[error("ffmpeg failed: {0}")]
    Encoder(String),

    #[error("encoder I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Synthesize a WAV header describing the uncompressed PCM stream (mono,
/// 24 kHz, s16le) with both RIFF and data sizes set to the streaming
/// sentinel, so a decoder can consume the stream before its length is known.
pub fn wav_stream_header() -> Vec<u8> {
    let byte_rate = SAMPLE_RATE * u32::from(CHANNELS) * u32::from(BITS_PER_SAMPLE) / 8;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;

    let mut header = Vec::with_capacity(44);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&UNKNOWN_SIZE.to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes()); // PCM fmt chunk size
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM
    header.extend_from_slice(&CHANNELS.to_le_bytes());
    header.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&UNKNOWN_SIZE.to_le_bytes());
    header
}

/// Convert one frame of normalized float samples to 16-bit signed PCM
pub fn pcm_bytes(frame: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() * 2);
    for sample in frame {
        out.extend_from_slice(&((sample * 32767.0) as i16).to_le_bytes());
    }
    out
}

/// Encoder argument list: input is always the raw streaming WAV on stdin,
/// output is the requested codec/container on stdout.
fn ffmpeg_args(format: EncodedFormat) -> Vec<String> {
    let mut args: Vec<String> = [
        "-nostdin",
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "wav",
        "-i",
        "pipe:0",
        "-vn",
        "-ac",
        "1",
        "-ar",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(SAMPLE_RATE.to_string());

    let codec: &[&str] = match format {
        EncodedFormat::Mp3 => &["-codec:a", "libmp3lame", "-b:a", "128k", "-f", "mp3"],
        EncodedFormat::Opus => &["-acodec", "libopus", "-f", "ogg"],
        EncodedFormat::Webm => &["-acodec", "libopus", "-f", "webm"],
    };
    args.extend(codec.iter().map(|s| s.to_string()));
    args.push("pipe:1".to_string());
    args
}

/// Manages the external encoder subprocess for one streaming request:
/// a feeder task serializes the WAV header plus PCM frames onto its stdin
/// while the drain loop forwards stdout chunks as they appear, watching for
/// stalls. Memory use is O(1) in total audio length.
pub struct StreamEncoder {
    ffmpeg_path: String,
    stall_timeout: Duration,
}

impl StreamEncoder {
    pub fn new(ffmpeg_path: impl Into<String>, stall_timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            stall_timeout,
        }
    }

    /// Encode a lazy frame stream into the requested format. Returns the
    /// encoded byte stream; a stall or a non-zero encoder exit surfaces as
    /// the final item.
    pub fn encode(
        &self,
        format: EncodedFormat,
        frames: mpsc::Receiver<Frame>,
    ) -> mpsc::Receiver<Result<Bytes, EncodeError>> {
        self.spawn_encoder(self.ffmpeg_path.clone(), ffmpeg_args(format), frames)
    }

    fn spawn_encoder(
        &self,
        program: String,
        args: Vec<String>,
        frames: mpsc::Receiver<Frame>,
    ) -> mpsc::Receiver<Result<Bytes, EncodeError>> {
        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let stall_timeout = self.stall_timeout;
        tokio::spawn(async move {
            run_encoder(program, args, frames, tx, stall_timeout).await;
        });
        rx
    }
}

async fn run_encoder(
    program: String,
    args: Vec<String>,
    mut frames: mpsc::Receiver<Frame>,
    tx: mpsc::Sender<Result<Bytes, EncodeError>>,
    stall_timeout: Duration,
) {
    let mut child = match Command::new(&program)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(program, error = %e, "Failed to spawn encoder");
            let _ = tx.send(Err(EncodeError::Io(e))).await;
            return;
        }
    };

    let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        let _ = tx
            .send(Err(EncodeError::Encoder("encoder stdio unavailable".to_string())))
            .await;
        return;
    };

    // Feeder: header first, then every frame as s16le PCM. Write errors mean
    // the encoder died; its exit status reports the cause.
    let feeder = tokio::spawn(async move {
        if stdin.write_all(&wav_stream_header()).await.is_err() {
            return;
        }
        while let Some(frame) = frames.recv().await {
            if stdin.write_all(&pcm_bytes(&frame)).await.is_err() {
                break;
            }
        }
        let _ = stdin.shutdown().await;
    });

    let stderr_task = tokio::spawn(async move {
        let mut diagnostics = String::new();
        let _ = stderr.read_to_string(&mut diagnostics).await;
        diagnostics
    });

    let mut buf = [0u8; READ_CHUNK_BYTES];
    let mut last_output = Instant::now();
    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break, // encoder closed its output
                Ok(n) => {
                    last_output = Instant::now();
                    if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                        // Consumer disconnected; tear everything down
                        feeder.abort();
                        let _ = child.start_kill();
                        return;
                    }
                }
                Err(e) => {
                    feeder.abort();
                    let _ = child.start_kill();
                    let _ = tx.send(Err(EncodeError::Io(e))).await;
                    return;
                }
            },
            _ = tokio::time::sleep_until(last_output + stall_timeout) => {
                if feeder.is_finished() {
                    // Input fully delivered; grant the encoder time to flush
                    last_output = Instant::now();
                    continue;
                }
                tracing::error!("Encoder produced no output within the stall timeout");
                feeder.abort();
                let _ = child.start_kill();
                let _ = child.wait().await;
                let _ = tx.send(Err(EncodeError::Stalled)).await;
                return;
            }
        }
    }

    feeder.abort();
    match child.wait().await {
        Ok(status) if status.success() => {}
        Ok(status) => {
            let diagnostics = stderr_task.await.unwrap_or_default();
            tracing::error!(%status, stderr = %diagnostics.trim(), "Encoder exited with failure");
            let _ = tx
                .send(Err(EncodeError::Encoder(diagnostics.trim().to_string())))
                .await;
        }
        Err(e) => {
            let _ = tx.send(Err(EncodeError::Io(e))).await;
        }
    }
}
