use thiserror::Error;

use super::codes::ErrorCode;
use super::ingest::IngestError;
use super::scheduler::SchedulerError;

/// Errors raised while resolving, validating and running a job.
#[derive(Error, Debug)]
pub enum HubError {
    #[error("{0}")]
    Validation(String),

    #[error("No action found: {0}")]
    NotFound(String),

    #[error("This action does not support requests of type \"{job_type}\". Supported types: {supported}.")]
    UnsupportedType { job_type: String, supported: String },

    #[error("Required parameter \"{0}\" not provided.")]
    MissingParameter(String),

    #[error("A streaming action was sent incompatible data. The action must have a download url or an attachment.")]
    IncompatiblePayload,

    #[error("No form defined for action: {0}")]
    NoForm(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("{0}")]
    Connector(#[from] anyhow::Error),
}

impl HubError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::UnsupportedType { .. } => ErrorCode::UnsupportedType,
            Self::MissingParameter(_) => ErrorCode::MissingParameter,
            Self::IncompatiblePayload => ErrorCode::IncompatiblePayload,
            Self::NoForm(_) => ErrorCode::NotFound,
            Self::Scheduler(e) => e.error_code(),
            Self::Ingest(e) => e.error_code(),
            Self::Connector(_) => ErrorCode::ConnectorError,
        }
    }

    /// Request-shape errors never reach a connector and are never retried.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::UnsupportedType { .. }
                | Self::MissingParameter(_)
                | Self::IncompatiblePayload
                | Self::NoForm(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot determine home directory")]
    NoHome,
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("worker failed: {0}")]
    Worker(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
