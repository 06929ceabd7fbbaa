use thiserror::Error;

use super::codes::ErrorCode;

/// Failure reported by a remote batch sink for a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError {
    /// Response status when the sink answered; `None` for transport failures.
    pub status: Option<u16>,
    pub message: String,
}

impl SinkError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SinkError {}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("could not match the data to a usable field combination: {0}")]
    SchemaUnresolved(String),

    #[error("row source failed: {0}")]
    Source(String),

    #[error("failed to parse rows: {0}")]
    Parse(String),

    #[error("batch {seq} failed after {attempts} attempt(s): {source}")]
    BatchSend {
        seq: u64,
        attempts: u32,
        source: SinkError,
    },

    #[error("batch dispatcher stopped unexpectedly")]
    DispatcherClosed,
}

impl IngestError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::SchemaUnresolved(_) => ErrorCode::SchemaUnresolved,
            Self::Source(_) => ErrorCode::SourceError,
            Self::Parse(_) => ErrorCode::ParseError,
            Self::BatchSend { .. } => ErrorCode::BatchSendError,
            Self::DispatcherClosed => ErrorCode::GeneralError,
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
