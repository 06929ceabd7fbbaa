#[allow(clippy::module_inception)]
pub mod error;
pub mod codes;
pub mod ingest;
pub mod scheduler;

pub use codes::ErrorCode;
pub use error::{CliError, ConfigError, HubError};
pub use ingest::{IngestError, SinkError};
pub use scheduler::SchedulerError;
