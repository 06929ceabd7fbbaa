use serde::{Deserialize, Serialize};

use crate::error::HubError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionState {
    #[serde(default)]
    pub data: Option<String>,
}

/// Machine-readable failure attached to an unsuccessful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionError {
    pub code: u16,
    pub kind: String,
    pub message: String,
}

/// Outcome of one job. Exactly one of these is delivered per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub refresh_query: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<FieldError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ActionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
}

impl Default for ActionResponse {
    fn default() -> Self {
        Self::ok()
    }
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            refresh_query: false,
            validation_errors: Vec::new(),
            state: None,
            error: None,
            webhook_id: None,
        }
    }

    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    pub fn from_error(err: &HubError) -> Self {
        let message = err.to_string();
        let code = err.error_code();
        Self {
            success: false,
            message: Some(message.clone()),
            error: Some(ActionError {
                code: code.as_u16(),
                kind: code.as_str().to_string(),
                message,
            }),
            ..Self::ok()
        }
    }

    pub fn with_webhook_id(mut self, webhook_id: Option<String>) -> Self {
        if self.webhook_id.is_none() {
            self.webhook_id = webhook_id;
        }
        self
    }

    pub fn with_validation_error(
        mut self,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.success = false;
        self.validation_errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_error_carries_code_and_message() {
        let resp = ActionResponse::from_error(&HubError::MissingParameter("api_key".into()));
        assert!(!resp.success);
        let err = resp.error.unwrap();
        assert_eq!(err.kind, "MISSING_PARAMETER");
        assert_eq!(err.message, "Required parameter \"api_key\" not provided.");
    }

    #[test]
    fn ok_response_serializes_compactly() {
        let json = serde_json::to_value(ActionResponse::ok()).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "refresh_query": false}));
    }

    #[test]
    fn webhook_id_is_not_overwritten() {
        let resp = ActionResponse {
            webhook_id: Some("a".into()),
            ..ActionResponse::ok()
        }
        .with_webhook_id(Some("b".into()));
        assert_eq!(resp.webhook_id.as_deref(), Some("a"));
    }
}
