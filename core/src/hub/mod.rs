//! Connector contract, job model and the registry/dispatcher that mediates
//! every inbound job.
//!
//! ```text
//! WebhookPayload + RequestMeta
//!   ↓
//! Job::from_webhook()
//!   ↓
//! Registry::resolve(name, client_version)
//!   ↓
//! Dispatcher::dispatch() → validate → in-process execute | TaskScheduler::submit
//!   ↓
//! ActionResponse (exactly one per job)
//! ```

mod connector;
mod dispatcher;
mod form;
mod job;
mod registry;
mod responder;
mod response;

pub use connector::{
    describe, ActionParameter, Connector, ConnectorDescriptor, ConnectorSpec, DownloadSetting,
    Isolation, RouteBuilder,
};
pub use dispatcher::Dispatcher;
pub use form::{ActionForm, FieldType, FormField, FormOption};
pub use job::{
    parse_client_version, Attachment, AttachmentEncoding, Job, JobType, ParamMap, RequestMeta,
    ScheduledPlan, WebhookAttachment, WebhookPayload, WebhookScheduledPlan,
};
pub use registry::Registry;
pub use responder::Responder;
pub use response::{ActionError, ActionResponse, ActionState, FieldError};
