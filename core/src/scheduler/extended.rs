use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Semaphore};

use super::gauge::WorkerGauge;
use super::lifecycle::{self, Settle};
use super::traits::{TaskScheduler, WorkerLauncher};
use super::types::{ScheduledTask, Variant, WorkerRequest};
use crate::config::ExtendedQueueConfig;
use crate::error::SchedulerError;
use crate::hub::ActionResponse;

/// Queue for long-running jobs. Admission is released as soon as the worker
/// replies; the worker keeps its slot until it reports completion or dies.
/// At most `max_workers` workers are alive at once.
pub struct ExtendedScheduler {
    launcher: Arc<dyn WorkerLauncher>,
    admission: Arc<Semaphore>,
    max_workers: usize,
    poll_interval: Duration,
    timeout: Duration,
    gauge: Arc<WorkerGauge>,
    next_id: AtomicU64,
}

impl ExtendedScheduler {
    pub fn new(
        launcher: Arc<dyn WorkerLauncher>,
        concurrency: usize,
        max_workers: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            admission: Arc::new(Semaphore::new(concurrency.max(1))),
            max_workers: max_workers.max(1),
            poll_interval: Duration::from_secs(10),
            timeout,
            gauge: WorkerGauge::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(launcher: Arc<dyn WorkerLauncher>, cfg: &ExtendedQueueConfig) -> Self {
        Self::new(
            launcher,
            cfg.concurrency,
            cfg.max_workers,
            Duration::from_secs(cfg.timeout_secs),
        )
        .with_poll_interval(Duration::from_millis(cfg.poll_interval_ms))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn gauge(&self) -> Arc<WorkerGauge> {
        Arc::clone(&self.gauge)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }
}

#[async_trait]
impl TaskScheduler for ExtendedScheduler {
    fn variant(&self) -> Variant {
        Variant::Extended
    }

    async fn submit(&self, request: WorkerRequest) -> Result<ActionResponse, SchedulerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut task = ScheduledTask::new(id, Variant::Extended, request);
        tracing::debug!(task_id = id, webhook_id = %task.correlation_id, "task queued");

        let permit = self
            .admission
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SchedulerError::QueueClosed)?;

        let slot = loop {
            if let Some(slot) = self.gauge.try_reserve(self.max_workers) {
                break slot;
            }
            tracing::debug!(
                task_id = id,
                alive = self.gauge.alive(),
                max_workers = self.max_workers,
                "worker limit reached, waiting"
            );
            tokio::time::sleep(self.poll_interval).await;
        };

        let (tx, rx) = oneshot::channel();
        let launcher = Arc::clone(&self.launcher);
        let timeout = self.timeout;

        tokio::spawn(async move {
            let _slot = slot;
            let mut settle = Settle::new(tx).release_on_settle(permit);
            lifecycle::drive(launcher.as_ref(), &mut task, timeout, &mut settle).await;
        });

        rx.await.unwrap_or(Err(SchedulerError::QueueClosed))
    }
}
