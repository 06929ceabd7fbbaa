//! Process-isolated execution: a standard queue (one result then exit) and
//! an extended queue (early response, later completion), both driving
//! workers through the same lifecycle.

mod extended;
mod gauge;
mod lifecycle;
mod standard;
mod traits;
mod types;
pub mod worker;

pub use extended::ExtendedScheduler;
pub use gauge::{WorkerGauge, WorkerSlot};
pub use standard::ExecuteScheduler;
pub use traits::{TaskScheduler, WorkerLauncher, WorkerSession};
pub use types::{
    normalize_error_message, ScheduledTask, TaskState, Variant, WorkerExit, WorkerMessage,
    WorkerRequest,
};
