use std::time::Duration;

use thiserror::Error;

use super::codes::ErrorCode;

/// Terminal failures of a scheduled task. None of these escalate past the
/// scheduler; the dispatcher folds them into a failed `ActionResponse`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("worker timed out after {}s and was killed", .after.as_secs())]
    Timeout { after: Duration },

    #[error("worker exited before replying (code: {code:?}, signal: {signal:?})")]
    Crash {
        code: Option<i32>,
        signal: Option<i32>,
    },

    #[error("worker protocol error: {0}")]
    Protocol(String),

    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    #[error("{0}")]
    Worker(String),

    #[error("scheduler queue closed")]
    QueueClosed,
}

impl SchedulerError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Crash { .. } => ErrorCode::Crash,
            Self::Protocol(_) => ErrorCode::ProtocolError,
            Self::Spawn(_) => ErrorCode::SpawnError,
            Self::Worker(_) => ErrorCode::ConnectorError,
            Self::QueueClosed => ErrorCode::QueueClosed,
        }
    }
}
