use std::time::{Duration, Instant};

use action_hub_core::api::HubConfig;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::{models::HttpServerError, state::AppState};

pub fn create_middleware_stack(
    cfg: &HubConfig,
) -> tower::layer::util::Stack<
    TimeoutLayer,
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
> {
    tower::layer::util::Stack::new(create_timeout_layer(cfg), TraceLayer::new_for_http())
}

/// Outlives the slowest scheduler so a worker timeout is reported as an
/// action failure rather than a dropped connection.
fn create_timeout_layer(cfg: &HubConfig) -> TimeoutLayer {
    let longest = cfg
        .scheduler
        .execute
        .timeout_secs
        .max(cfg.scheduler.extended.timeout_secs);
    TimeoutLayer::new(Duration::from_secs(longest + 60))
}

/// Pulls the shared secret out of `Bearer <s>` or `Token token="<s>"`.
pub fn extract_token(value: &str) -> Option<&str> {
    let value = value.trim();
    if let Some(token) = value.strip_prefix("Bearer ") {
        return Some(token.trim());
    }
    let rest = value
        .strip_prefix("Token token=\"")
        .or_else(|| value.strip_prefix("token token=\""))?;
    rest.strip_suffix('"')
}

pub async fn require_secret(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_token)
        .is_some_and(|token| !token.is_empty() && token == state.config.server.secret);

    if !authorized {
        info!(uri = %req.uri(), "unauthorized request");
        state.record_error();
        return HttpServerError::Unauthorized.into_response();
    }
    next.run(req).await
}

pub async fn request_logger(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let webhook_id = req
        .headers()
        .get("x-looker-webhook-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let start = Instant::now();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        warn!(
            method = %method,
            uri = %uri,
            webhook_id = %webhook_id,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request failed"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            webhook_id = %webhook_id,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bearer_and_legacy_token_forms() {
        assert_eq!(extract_token("Bearer s3cret"), Some("s3cret"));
        assert_eq!(extract_token("Token token=\"s3cret\""), Some("s3cret"));
        assert_eq!(extract_token("token token=\"s3cret\""), Some("s3cret"));
        assert_eq!(extract_token("Basic abc"), None);
        assert_eq!(extract_token("Token token=s3cret"), None);
    }
}
