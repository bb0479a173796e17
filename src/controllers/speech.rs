use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};

use crate::{
    domain::{
        segment::{engine_code_for, LanguageBlock, Segmenter},
        synth::{Frame, PipelineCache, SynthError},
        voice::{Gender, VoiceResolver},
    },
    error::{AppError, AppResult},
    infrastructure::encoder::{pcm_bytes, wav_stream_header, ResponseFormat, StreamEncoder},
};

/// Bounded frame queue between the block driver and the encoder feeder;
/// a slow client backpressures the driver through it.
const FRAME_QUEUE_CAPACITY: usize = 32;

/// Request for POST /v1/audio/speech
#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub input: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

pub struct SpeechController {
    segmenter: Segmenter,
    resolver: VoiceResolver,
    pipelines: Arc<PipelineCache>,
    encoder: StreamEncoder,
}

impl SpeechController {
    pub fn new(
        segmenter: Segmenter,
        resolver: VoiceResolver,
        pipelines: Arc<PipelineCache>,
        encoder: StreamEncoder,
    ) -> Self {
        Self {
            segmenter,
            resolver,
            pipelines,
            encoder,
        }
    }

    /// POST /v1/audio/speech - Synthesize text and stream the encoded audio
    pub async fn synthesize(
        State(controller): State<Arc<SpeechController>>,
        body: Bytes,
    ) -> AppResult<Response> {
        // The original contract returns 400 for unparseable JSON, so the
        // body is decoded by hand rather than through the Json extractor
        let request: SpeechRequest = serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?;

        let text = Segmenter::clean_text(&request.input);
        if text.is_empty() {
            return Err(AppError::BadRequest("Empty input text".to_string()));
        }

        let blocks = controller.segmenter.split(&text);
        tracing::info!(
            blocks = blocks.len(),
            text_length = text.len(),
            format = ?request.response_format,
            "Speech synthesis request"
        );

        let requested_voice = request.voice.unwrap_or_default();
        // Any gender other than m/f is treated as absent, not an error
        let gender = request.gender.as_deref().and_then(Gender::parse);

        let (frame_tx, frame_rx) = mpsc::channel::<Frame>(FRAME_QUEUE_CAPACITY);
        let driver = controller.clone();
        tokio::spawn(async move {
            driver
                .drive_blocks(blocks, &requested_voice, gender, frame_tx)
                .await;
        });

        let format = request.response_format;
        let body = match format.encoded() {
            // WAV needs no external encoder: streaming header + raw PCM
            None => {
                let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(16);
                tokio::spawn(stream_wav(frame_rx, tx));
                Body::from_stream(ReceiverStream::new(rx))
            }
            Some(codec) => {
                let mut encoded = controller.encoder.encode(codec, frame_rx);
                // Await the first encoded chunk so failures before any byte
                // was sent still produce a structured error response
                match encoded.recv().await {
                    None => Body::empty(),
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(first)) => Body::from_stream(
                        tokio_stream::once(Ok(first)).chain(ReceiverStream::new(encoded)),
                    ),
                }
            }
        };

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, format.media_type())
            .body(body)
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    /// Synthesize every block in order onto the frame queue. A failing block
    /// is logged and skipped; one bad fragment must not abort an otherwise
    /// good response.
    async fn drive_blocks(
        &self,
        blocks: Vec<LanguageBlock>,
        requested_voice: &str,
        gender: Option<Gender>,
        frame_tx: mpsc::Sender<Frame>,
    ) {
        for (index, block) in blocks.iter().enumerate() {
            if frame_tx.is_closed() {
                tracing::debug!("Frame consumer went away, stopping block driver");
                return;
            }
            match self
                .synthesize_block(block, requested_voice, gender, &frame_tx)
                .await
            {
                Ok(()) => tracing::info!(block = index, "Block synthesized"),
                Err(err) => {
                    tracing::warn!(
                        block = index,
                        text = %preview(&block.text),
                        error = %err,
                        "Skipping block after synthesis failure"
                    );
                }
            }
        }
    }

    async fn synthesize_block(
        &self,
        block: &LanguageBlock,
        requested_voice: &str,
        gender: Option<Gender>,
        frame_tx: &mpsc::Sender<Frame>,
    ) -> Result<(), SynthError> {
        let language = engine_code_for(&block.language_tag);
        let resolved = self.resolver.resolve(requested_voice, language, gender);
        tracing::info!(
            tag = %block.language_tag,
            voice = %resolved.voice,
            language = %resolved.language,
            "Voice resolved for block"
        );

        let entry = self.pipelines.get(&resolved.voice, resolved.language).await?;

        // All operations touching this voice's loaded weights are serialized;
        // the guard is held until the block's frame stream is exhausted
        let voice_lock = self.pipelines.voice_lock(&resolved.voice);
        let _guard = voice_lock.lock().await;

        let mut pipeline = entry.pipeline.lock().await;
        let mut frames = pipeline.synthesize(&block.text).await?;
        while let Some(item) = frames.recv().await {
            let frame = item?;
            if frame_tx.send(frame).await.is_err() {
                // Consumer disconnected; nothing left to deliver
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Serve raw framed PCM behind a streaming WAV header
async fn stream_wav(
    mut frames: mpsc::Receiver<Frame>,
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
) {
    if tx.send(Ok(Bytes::from(wav_stream_header()))).await.is_err() {
        return;
    }
    while let Some(frame) = frames.recv().await {
        if tx.send(Ok(Bytes::from(pcm_bytes(&frame)))).await.is_err() {
            return;
        }
    }
}

/// Truncated sample of the offending input, enough to diagnose from logs
fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 40;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_defaults() {
        let request: SpeechRequest = serde_json::from_str(r#"{"input": "hello"}"#).unwrap();
        assert_eq!(request.response_format, ResponseFormat::Opus);
        assert!(request.voice.is_none());
        assert!(request.gender.is_none());
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result: Result<SpeechRequest, _> =
            serde_json::from_str(r#"{"input": "hello", "response_format": "flac"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let text = "é".repeat(60);
        let preview = preview(&text);
        assert_eq!(preview.chars().count(), 41);
        assert!(preview.ends_with('…'));
    }

    #[tokio::test]
    async fn test_stream_wav_prefixes_header() {
        let (frame_tx, frame_rx) = mpsc::channel(4);
        let (tx, mut rx) = mpsc::channel(8);
        frame_tx.send(vec![0.5f32; 8]).await.unwrap();
        drop(frame_tx);

        stream_wav(frame_rx, tx).await;

        let header = rx.recv().await.unwrap().unwrap();
        assert_eq!(&header[..4], b"RIFF");
        let pcm = rx.recv().await.unwrap().unwrap();
        assert_eq!(pcm.len(), 16);
        assert!(rx.recv().await.is_none());
    }
}
