use action_hub_core::api::{
    describe, parse_client_version, ActionForm, ActionResponse, ConnectorDescriptor, Job,
    RequestMeta, WebhookPayload,
};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    routing::get,
    Json, Router,
};

use super::{
    middleware::require_secret,
    models::{HttpServerError, IndexResponse, StatusResponse},
    state::AppState,
};

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_mb.saturating_mul(1024 * 1024);

    // Every authenticated path answers both GET and POST.
    let protected = Router::new()
        .route("/", get(index_handler).post(index_handler))
        .route("/actions/:id", get(action_handler).post(action_handler))
        .route(
            "/actions/:id/execute",
            get(execute_handler).post(execute_handler),
        )
        .route("/actions/:id/form", get(form_handler).post(form_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_secret));

    Router::new()
        .route("/status", get(status_handler))
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn request_meta(headers: &HeaderMap) -> RequestMeta {
    RequestMeta {
        instance_id: header_value(headers, "x-looker-instance"),
        webhook_id: header_value(headers, "x-looker-webhook-id"),
        user_agent: header_value(headers, header::USER_AGENT.as_str()),
    }
}

fn client_version(headers: &HeaderMap) -> Option<semver::Version> {
    header_value(headers, header::USER_AGENT.as_str())
        .and_then(|ua| parse_client_version(&ua))
        .and_then(|v| semver::Version::parse(&v).ok())
}

fn parse_payload(body: &Bytes) -> Result<WebhookPayload, HttpServerError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(WebhookPayload::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| HttpServerError::InvalidRequest(format!("invalid request body: {e}")))
}

/// GET|POST / - connectors visible to the calling client.
async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> Json<IndexResponse> {
    state.record_request("index");
    let version = client_version(&headers);
    let integrations = state
        .dispatcher
        .registry()
        .all(version.as_ref())
        .iter()
        .map(|c| describe(c.as_ref(), state.routes.as_ref()))
        .collect();

    Json(IndexResponse {
        label: state.config.server.label.clone(),
        integrations,
    })
}

/// GET|POST /actions/:id - a single connector descriptor.
async fn action_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ConnectorDescriptor>, HttpServerError> {
    state.record_request("action");
    let version = client_version(&headers);
    let connector = state
        .dispatcher
        .registry()
        .resolve(&id, version.as_ref())
        .inspect_err(|_| state.record_error())?;
    Ok(Json(describe(connector.as_ref(), state.routes.as_ref())))
}

/// POST /actions/:id/execute - validates and runs the job. Failed actions
/// answer 400 with the failed `ActionResponse` as the body.
async fn execute_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ActionResponse>), HttpServerError> {
    state.record_request("execute");
    let payload = parse_payload(&body).inspect_err(|_| state.record_error())?;
    let meta = request_meta(&headers);
    let webhook_id = meta.webhook_id.clone();

    let response = match Job::from_webhook(payload, meta) {
        Ok(job) => state.dispatcher.execute(&id, job).await,
        Err(err) => ActionResponse::from_error(&err).with_webhook_id(webhook_id),
    };

    if response.success {
        Ok((StatusCode::OK, Json(response)))
    } else {
        state.record_error();
        Ok((StatusCode::BAD_REQUEST, Json(response)))
    }
}

/// POST /actions/:id/form - the connector's form for this request.
async fn form_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ActionForm>, HttpServerError> {
    state.record_request("form");
    let payload = parse_payload(&body).inspect_err(|_| state.record_error())?;
    let form = match Job::from_webhook(payload, request_meta(&headers)) {
        Ok(job) => state.dispatcher.form(&id, &job).await,
        Err(err) => Err(err),
    };

    match form {
        Ok(form) => Ok(Json(form)),
        Err(err) => {
            state.record_error();
            Err(err.into())
        }
    }
}

/// GET /status - unauthenticated liveness and counters.
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let (uptime_seconds, requests_total, errors_total, requests_by_endpoint) =
        match state.stats.read() {
            Ok(stats) => (
                stats.uptime_seconds(),
                stats.requests_total,
                stats.errors_total,
                stats.requests_by_endpoint.clone(),
            ),
            Err(_) => Default::default(),
        };

    Json(StatusResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        label: state.config.server.label.clone(),
        uptime_seconds,
        requests_total,
        errors_total,
        requests_by_endpoint,
        isolation_enabled: state.dispatcher.isolation_enabled(),
    })
}
