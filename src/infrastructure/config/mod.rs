use std::collections::HashSet;
use std::env;

/// TTS audio constants: the synthesis engine always produces mono 24 kHz
/// normalized float samples, encoded on the wire as 16-bit signed PCM.
pub const SAMPLE_RATE: u32 = 24_000;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Accepted bearer tokens. `{"*"}` accepts any well-formed token; an
    /// empty set accepts nothing (fail closed).
    pub api_tokens: HashSet<String>,
    pub rate_window_secs: f64,
    pub rate_max_requests: usize,
    /// HuggingFace repository holding the voice assets (`voices/<name>.pt`)
    pub model_repo: String,
    /// External synthesis worker command
    pub engine_cmd: String,
    pub ffmpeg_path: String,
    /// Seconds without encoder output before the stream is declared stalled
    pub encode_timeout_secs: f64,
    pub cors_allow_origins: Vec<String>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            api_tokens: parse_tokens(&env::var("API_TOKENS").unwrap_or_default()),
            rate_window_secs: env::var("RATE_WINDOW_S")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            rate_max_requests: env::var("RATE_MAX_REQ")
                .unwrap_or_else(|_| "6".to_string())
                .parse()?,
            model_repo: env::var("MODEL_REPO")
                .unwrap_or_else(|_| "hexgrad/Kokoro-82M".to_string()),
            engine_cmd: env::var("ENGINE_CMD").unwrap_or_else(|_| "kokoro-engine".to_string()),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            encode_timeout_secs: env::var("ENCODE_TIMEOUT_S")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            cors_allow_origins: env::var("CORS_ALLOW_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            log_format: env::var("LOG_FORMAT")
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })
                .unwrap_or(LogFormat::Pretty),
        };

        Ok(config)
    }

    /// Whether any well-formed bearer token is accepted
    pub fn accepts_any_token(&self) -> bool {
        self.api_tokens.len() == 1 && self.api_tokens.contains("*")
    }
}

/// Tokens are whitespace or comma separated. An empty variable yields an
/// empty set, which refuses every request.
fn parse_tokens(raw: &str) -> HashSet<String> {
    raw.replace(',', " ")
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}
