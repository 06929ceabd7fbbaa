use async_trait::async_trait;

use super::types::{ScheduledTask, Variant, WorkerExit, WorkerMessage, WorkerRequest};
use crate::error::SchedulerError;
use crate::hub::ActionResponse;

/// A running worker. `recv` yields `None` once the worker's output closes.
#[async_trait]
pub trait WorkerSession: Send {
    fn pid(&self) -> Option<u32>;
    async fn send(&mut self, payload: &str) -> anyhow::Result<()>;
    async fn recv(&mut self) -> anyhow::Result<Option<WorkerMessage>>;
    async fn wait(&mut self) -> anyhow::Result<WorkerExit>;
    /// Must be safe to call on an already exited worker.
    async fn kill(&mut self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    fn name(&self) -> &str;
    async fn launch(&self, task: &ScheduledTask) -> anyhow::Result<Box<dyn WorkerSession>>;
}

/// Admission point the dispatcher submits isolated jobs to.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    fn variant(&self) -> Variant;
    async fn submit(&self, request: WorkerRequest) -> Result<ActionResponse, SchedulerError>;
}
