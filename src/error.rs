use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing or malformed Authorization header")]
    AuthMissing,

    #[error("Forbidden")]
    AuthForbidden,

    #[error("Too many requests")]
    RateLimit { retry_after_secs: u64 },

    #[error("Invalid input: {0}")]
    BadRequest(String),

    #[error("Audio generation stalled: {0}")]
    TtsTimeout(String),

    #[error("Encoder failed: {0}")]
    FfmpegError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Structured error body: a machine-readable kind plus a human message
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthMissing => StatusCode::UNAUTHORIZED,
            Self::AuthForbidden => StatusCode::FORBIDDEN,
            Self::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TtsTimeout(_) | Self::FfmpegError(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error kind carried in the response body
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthMissing => "auth_missing",
            Self::AuthForbidden => "auth_forbidden",
            Self::RateLimit { .. } => "rate_limit",
            Self::BadRequest(_) => "bad_request",
            Self::TtsTimeout(_) => "tts_timeout",
            Self::FfmpegError(_) => "ffmpeg_error",
            Self::Internal(_) => "internal",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                kind: self.kind().to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl From<crate::infrastructure::encoder::EncodeError> for AppError {
    fn from(e: crate::infrastructure::encoder::EncodeError) -> Self {
        use crate::infrastructure::encoder::EncodeError;
        match e {
            EncodeError::Stalled => {
                Self::TtsTimeout("no encoder output within the stall timeout".to_string())
            }
            EncodeError::Encoder(message) => Self::FfmpegError(message),
            EncodeError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

/// Implement IntoResponse for automatic conversion in handlers
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::error!(
            error = %self,
            kind = self.kind(),
            status = %status.as_u16(),
            "Request failed"
        );

        let body = self.to_response();
        let mut response = (status, Json(body)).into_response();

        // Rate-limited callers get a retry hint
        if let Self::RateLimit { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(AppError::AuthMissing.kind(), "auth_missing");
        assert_eq!(AppError::AuthForbidden.kind(), "auth_forbidden");
        assert_eq!(
            AppError::RateLimit { retry_after_secs: 1 }.kind(),
            "rate_limit"
        );
        assert_eq!(AppError::BadRequest("x".into()).kind(), "bad_request");
        assert_eq!(AppError::TtsTimeout("x".into()).kind(), "tts_timeout");
        assert_eq!(AppError::FfmpegError("x".into()).kind(), "ffmpeg_error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::AuthMissing.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::AuthForbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::RateLimit { retry_after_secs: 1 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::FfmpegError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
