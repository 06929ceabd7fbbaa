use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Semaphore};

use super::gauge::WorkerGauge;
use super::lifecycle::{self, Settle};
use super::traits::{TaskScheduler, WorkerLauncher};
use super::types::{ScheduledTask, Variant, WorkerRequest};
use crate::config::ExecuteQueueConfig;
use crate::error::SchedulerError;
use crate::hub::ActionResponse;

/// FIFO queue running at most `concurrency` workers, one job per worker.
/// A slot is held until the worker is gone, not just until it replies.
pub struct ExecuteScheduler {
    launcher: Arc<dyn WorkerLauncher>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    gauge: Arc<WorkerGauge>,
    next_id: AtomicU64,
}

impl ExecuteScheduler {
    pub fn new(launcher: Arc<dyn WorkerLauncher>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            launcher,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout,
            gauge: WorkerGauge::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(launcher: Arc<dyn WorkerLauncher>, cfg: &ExecuteQueueConfig) -> Self {
        Self::new(
            launcher,
            cfg.concurrency,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn gauge(&self) -> Arc<WorkerGauge> {
        Arc::clone(&self.gauge)
    }

    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl TaskScheduler for ExecuteScheduler {
    fn variant(&self) -> Variant {
        Variant::Standard
    }

    async fn submit(&self, request: WorkerRequest) -> Result<ActionResponse, SchedulerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut task = ScheduledTask::new(id, Variant::Standard, request);
        tracing::debug!(task_id = id, webhook_id = %task.correlation_id, "task queued");

        // Waiting here keeps admission in submission order; a caller that
        // gives up while queued simply leaves the queue.
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SchedulerError::QueueClosed)?;

        let (tx, rx) = oneshot::channel();
        let launcher = Arc::clone(&self.launcher);
        let gauge = Arc::clone(&self.gauge);
        let timeout = self.timeout;

        tokio::spawn(async move {
            let _permit = permit;
            let _slot = gauge.reserve();
            let mut settle = Settle::new(tx);
            lifecycle::drive(launcher.as_ref(), &mut task, timeout, &mut settle).await;
        });

        rx.await.unwrap_or(Err(SchedulerError::QueueClosed))
    }
}
