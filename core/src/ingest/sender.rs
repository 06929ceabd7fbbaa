use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::accumulator::RecordBatch;
use super::retry::RetryPolicy;
use crate::error::{IngestError, SinkError};

/// Remote destination for sealed batches.
#[async_trait]
pub trait BatchSink: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, batch: &RecordBatch) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub seq: u64,
    pub attempts: u32,
    pub error: SinkError,
}

impl BatchFailure {
    pub fn into_error(self) -> IngestError {
        IngestError::BatchSend {
            seq: self.seq,
            attempts: self.attempts,
            source: self.error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: Vec<u64>,
    pub failed: Vec<BatchFailure>,
    pub retries: u32,
    pub backoff: Vec<Duration>,
}

/// FIFO queue in front of a single sender task: one batch in flight at a
/// time, sent strictly in enqueue order.
pub struct BatchDispatcher {
    tx: mpsc::UnboundedSender<RecordBatch>,
    handle: JoinHandle<DispatchReport>,
}

impl BatchDispatcher {
    pub fn spawn(sink: Arc<dyn BatchSink>, retry: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(send_loop(sink, retry, rx));
        Self { tx, handle }
    }

    pub fn enqueue(&self, batch: RecordBatch) -> Result<(), IngestError> {
        tracing::debug!(batch_seq = batch.seq, rows = batch.rows.len(), is_final = batch.is_final, "batch queued");
        self.tx
            .send(batch)
            .map_err(|_| IngestError::DispatcherClosed)
    }

    /// Closes the queue and waits for every queued batch to settle.
    pub async fn finish(self) -> Result<DispatchReport, IngestError> {
        let Self { tx, handle } = self;
        drop(tx);
        handle.await.map_err(|_| IngestError::DispatcherClosed)
    }
}

async fn send_loop(
    sink: Arc<dyn BatchSink>,
    retry: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<RecordBatch>,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    while let Some(batch) = rx.recv().await {
        let mut retries = 0u32;
        loop {
            match sink.send(&batch).await {
                Ok(()) => {
                    tracing::debug!(sink = sink.name(), batch_seq = batch.seq, retries, "batch sent");
                    report.sent.push(batch.seq);
                    break;
                }
                Err(err) => match retry.next_delay(retries, &err) {
                    Some(delay) => {
                        tracing::warn!(
                            sink = sink.name(),
                            batch_seq = batch.seq,
                            retry = retries + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "batch send failed, backing off"
                        );
                        report.backoff.push(delay);
                        tokio::time::sleep(delay).await;
                        retries += 1;
                    }
                    None => {
                        tracing::error!(
                            sink = sink.name(),
                            batch_seq = batch.seq,
                            attempts = retries + 1,
                            error = %err,
                            "batch send failed"
                        );
                        report.failed.push(BatchFailure {
                            seq: batch.seq,
                            attempts: retries + 1,
                            error: err,
                        });
                        break;
                    }
                },
            }
        }
        report.retries += retries;
    }

    report
}
