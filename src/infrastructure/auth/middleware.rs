use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::rate_limit::RateLimiter;
use crate::error::AppError;
use crate::infrastructure::config::Config;

/// Caller identity injected into request extensions after admission
#[derive(Debug, Clone)]
pub struct CallerToken(pub String);

/// Admission control: bearer authentication followed by the per-token
/// sliding-window rate limit.
pub async fn gate_middleware(
    State((config, limiter)): State<(Arc<Config>, Arc<RateLimiter>)>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    let token = parse_bearer(header)?;

    // An empty token set accepts nothing; `*` accepts any well-formed token
    if !config.accepts_any_token() && !config.api_tokens.contains(token) {
        return Err(AppError::AuthForbidden);
    }

    limiter
        .check(token)
        .map_err(|retry_after_secs| AppError::RateLimit { retry_after_secs })?;

    let token = token.to_string();
    request.extensions_mut().insert(CallerToken(token));

    Ok(next.run(request).await)
}

/// Extract the bearer token from an Authorization header value
fn parse_bearer(header: Option<&str>) -> Result<&str, AppError> {
    let header = header.ok_or(AppError::AuthMissing)?;
    let token = header.strip_prefix("Bearer ").ok_or(AppError::AuthMissing)?.trim();
    if token.is_empty() {
        return Err(AppError::AuthMissing);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use std::collections::HashSet;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::infrastructure::config::LogFormat;

    fn gated_app(tokens: &[&str], limiter: Arc<RateLimiter>) -> Router {
        let config = Arc::new(Config {
            host: "127.0.0.1".into(),
            port: 0,
            api_tokens: tokens.iter().map(|t| t.to_string()).collect::<HashSet<_>>(),
            rate_window_secs: 2.0,
            rate_max_requests: 6,
            model_repo: "hexgrad/Kokoro-82M".into(),
            engine_cmd: "kokoro-engine".into(),
            ffmpeg_path: "ffmpeg".into(),
            encode_timeout_secs: 20.0,
            cors_allow_origins: vec!["*".into()],
            log_format: LogFormat::Pretty,
        });
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state((config, limiter), gate_middleware))
    }

    fn request(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_gate_admits_known_token() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(2), 6));
        let app = gated_app(&["secret"], limiter);

        let response = app.oneshot(request(Some("Bearer secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_gate_rejects_missing_and_unknown_tokens() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(2), 6));
        let app = gated_app(&["secret"], limiter);

        let response = app.clone().oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(request(Some("Bearer nope"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_gate_wildcard_accepts_any_well_formed_token() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(2), 6));
        let app = gated_app(&["*"], limiter);

        let response = app.clone().oneshot(request(Some("Bearer anything"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Wildcard still requires a well-formed bearer header
        let response = app.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_gate_throttles_past_the_window_limit() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(2), 2));
        let app = gated_app(&["secret"], limiter);

        for _ in 0..2 {
            let response = app.clone().oneshot(request(Some("Bearer secret"))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(request(Some("Bearer secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "1");
    }

    #[test]
    fn test_parse_bearer_accepts_well_formed_header() {
        assert_eq!(parse_bearer(Some("Bearer secret")).unwrap(), "secret");
        assert_eq!(parse_bearer(Some("Bearer  spaced ")).unwrap(), "spaced");
    }

    #[test]
    fn test_parse_bearer_rejects_missing_or_malformed() {
        assert!(matches!(parse_bearer(None), Err(AppError::AuthMissing)));
        assert!(matches!(
            parse_bearer(Some("Basic dXNlcg==")),
            Err(AppError::AuthMissing)
        ));
        assert!(matches!(
            parse_bearer(Some("bearer lowercase")),
            Err(AppError::AuthMissing)
        ));
        assert!(matches!(
            parse_bearer(Some("Bearer ")),
            Err(AppError::AuthMissing)
        ));
    }
}
