pub mod audience;
pub mod debug;
pub mod webhook;

pub use audience::AudienceUploadConnector;
pub use debug::DebugConnector;
pub use webhook::WebhookConnector;
