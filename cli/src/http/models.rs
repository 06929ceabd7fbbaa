use std::collections::HashMap;

use action_hub_core::api::{ConnectorDescriptor, HubError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub const INVALID_AUTH_MESSAGE: &str = "Invalid 'Authorization' header.";

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub label: String,
    pub integrations: Vec<ConnectorDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub label: String,
    pub uptime_seconds: f64,
    pub requests_total: u64,
    pub errors_total: u64,
    pub requests_by_endpoint: HashMap<String, u64>,
    pub isolation_enabled: bool,
}

#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
    NotFound(String),
    InvalidRequest(String),
    Internal(String),
}

impl From<HubError> for HttpServerError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::NotFound(_) | HubError::NoForm(_) => Self::NotFound(err.to_string()),
            e if e.is_request_error() => Self::InvalidRequest(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            Self::Unauthorized => (StatusCode::FORBIDDEN, None, INVALID_AUTH_MESSAGE.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, Some("NOT_FOUND"), msg),
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, Some("INVALID_REQUEST"), msg),
            Self::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Some("INTERNAL_ERROR"),
                msg,
            ),
        };

        let mut body = serde_json::json!({
            "success": false,
            "error": message,
        });
        if let Some(code) = error_code {
            body["error_code"] = code.into();
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_form_maps_to_not_found() {
        let err: HttpServerError = HubError::NoForm("debug".into()).into();
        assert!(matches!(err, HttpServerError::NotFound(msg) if msg == "No form defined for action: debug"));
    }

    #[test]
    fn connector_failure_is_internal() {
        let err: HttpServerError = HubError::Connector(anyhow::anyhow!("boom")).into();
        assert!(matches!(err, HttpServerError::Internal(msg) if msg == "boom"));
    }

    #[test]
    fn unauthorized_is_forbidden() {
        let resp = HttpServerError::Unauthorized.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
