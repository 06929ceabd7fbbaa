//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `action_hub_core::api` instead of reaching into internal modules.

pub use crate::config::{
    apply_env_overrides, get_hub_data_dir, load_default, load_from_path, ExecuteQueueConfig,
    ExtendedQueueConfig, HubConfig, IngestConfig, LoggingConfig, RetryConfig, SchedulerConfig,
    ServerConfig,
};
pub use crate::error::{
    CliError, ConfigError, ErrorCode, HubError, IngestError, SchedulerError, SinkError,
};
pub use crate::hub::{
    describe, parse_client_version, ActionError, ActionForm, ActionParameter, ActionResponse,
    Attachment, AttachmentEncoding, Connector, ConnectorDescriptor, ConnectorSpec, Dispatcher,
    FieldType, FormField, FormOption, Isolation, Job, JobType, ParamMap, Registry, RequestMeta,
    Responder, RouteBuilder, ScheduledPlan, WebhookPayload,
};
pub use crate::ingest::{
    row_events_from_byte_stream, row_events_from_bytes, Batch, BatchAccumulator,
    BatchDispatcher, BatchSink, ColumnInfo, DispatchReport, ExponentialBackoff, HashMode,
    IngestReport, IngestionEngine, RecordBatch, RetryPolicy, RetryStrategy, Row, RowEvent,
    SchemaMapping, UserField, UserRecord,
};
pub use crate::scheduler::worker::run_worker;
pub use crate::scheduler::{
    normalize_error_message, ExecuteScheduler, ExtendedScheduler, ScheduledTask, TaskScheduler,
    TaskState, Variant, WorkerExit, WorkerGauge, WorkerLauncher, WorkerMessage, WorkerRequest, WorkerSession,
};
