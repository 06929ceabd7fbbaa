use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};

use super::accumulator::BatchAccumulator;
use super::retry::RetryPolicy;
use super::row::RowEvent;
use super::schema::{HashMode, SchemaMapping};
use super::sender::{BatchDispatcher, BatchFailure, BatchSink};
use crate::error::{HubError, IngestError};
use crate::hub::ActionResponse;

/// Consumes one row stream exactly once and reports a single outcome.
pub struct IngestionEngine {
    sink: Arc<dyn BatchSink>,
    batch_size: usize,
    hash: HashMode,
    retry: RetryPolicy,
}

impl IngestionEngine {
    pub fn new(sink: Arc<dyn BatchSink>, batch_size: usize) -> Self {
        Self {
            sink,
            batch_size: batch_size.max(1),
            hash: HashMode::default(),
            retry: RetryPolicy::disabled(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_hash_mode(mut self, hash: HashMode) -> Self {
        self.hash = hash;
        self
    }

    /// Runs the stream to completion. Only an unresolvable schema is an
    /// `Err`; batch and source failures are reported in the `IngestReport`.
    pub async fn run<S>(&self, events: S) -> Result<IngestReport, IngestError>
    where
        S: Stream<Item = Result<RowEvent, IngestError>> + Send,
    {
        let dispatcher = BatchDispatcher::spawn(Arc::clone(&self.sink), self.retry.clone());
        let mut acc = BatchAccumulator::new(self.batch_size);
        let mut mapping: Option<SchemaMapping> = None;
        let mut rows_read = 0u64;
        let mut rows_skipped = 0u64;
        let mut source_error: Option<IngestError> = None;

        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            let row = match event {
                Err(err) => {
                    source_error = Some(err);
                    break;
                }
                Ok(RowEvent::Fields(columns)) => {
                    if mapping.is_none() {
                        match SchemaMapping::detect(&columns, self.hash) {
                            Ok(m) => mapping = Some(m),
                            Err(err) => return abort(dispatcher, err).await,
                        }
                    }
                    continue;
                }
                Ok(RowEvent::Row(row)) => row,
            };

            rows_read += 1;
            if mapping.is_none() {
                match SchemaMapping::detect_from_row(&row, self.hash) {
                    Ok(m) => {
                        tracing::info!(
                            fields = ?m.fields().map(|f| f.key()).collect::<Vec<_>>(),
                            "schema detected"
                        );
                        mapping = Some(m);
                    }
                    Err(err) => return abort(dispatcher, err).await,
                }
            }
            let Some(schema) = mapping.as_ref() else {
                continue;
            };

            match schema.transform(&row) {
                Some(record) => {
                    if let Some(batch) = acc.push(record) {
                        dispatcher.enqueue(batch)?;
                    }
                }
                None => rows_skipped += 1,
            }
        }

        match &source_error {
            None => {
                for batch in acc.finish() {
                    dispatcher.enqueue(batch)?;
                }
            }
            Some(err) => {
                tracing::error!(error = %err, rows_read, "row source failed, discarding partial batch");
                if let Some(batch) = acc.abandon() {
                    dispatcher.enqueue(batch)?;
                }
            }
        }

        let dispatch = dispatcher.finish().await?;
        let report = IngestReport {
            batch_size: self.batch_size,
            rows_read,
            rows_skipped,
            batches_sent: dispatch.sent,
            failures: dispatch.failed,
            retries: dispatch.retries,
            backoff: dispatch.backoff,
            source_error: source_error.map(|e| e.to_string()),
        };
        tracing::info!(
            rows_read,
            rows_skipped,
            batches = report.batch_count(),
            failed = report.failures.len(),
            retries = report.retries,
            "ingestion finished"
        );
        Ok(report)
    }
}

async fn abort(dispatcher: BatchDispatcher, err: IngestError) -> Result<IngestReport, IngestError> {
    tracing::warn!(error = %err, "ingestion aborted before any data was sent");
    let _ = dispatcher.finish().await;
    Err(err)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub batch_size: usize,
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub batches_sent: Vec<u64>,
    pub failures: Vec<BatchFailure>,
    pub retries: u32,
    pub backoff: Vec<Duration>,
    pub source_error: Option<String>,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.source_error.is_none()
    }

    pub fn batch_count(&self) -> usize {
        self.batches_sent.len() + self.failures.len()
    }

    pub fn summary(&self) -> String {
        if let Some(err) = &self.source_error {
            return format!(
                "Streaming upload aborted after {} batches: {err}",
                self.batch_count()
            );
        }
        if self.failures.is_empty() {
            return format!(
                "Streaming upload complete. Sent {} batches (batch size = {})",
                self.batch_count(),
                self.batch_size
            );
        }
        let seqs = self
            .failures
            .iter()
            .map(|f| f.seq.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Streaming upload finished with errors. {} of {} batches failed (batches {seqs}): {}",
            self.failures.len(),
            self.batch_count(),
            self.failures[0].error
        )
    }

    pub fn into_response(self) -> ActionResponse {
        if self.is_success() {
            return ActionResponse::ok_with_message(self.summary());
        }
        let summary = self.summary();
        let err = match (self.source_error, self.failures.into_iter().next()) {
            (Some(msg), _) => IngestError::Source(msg),
            (None, Some(failure)) => failure.into_error(),
            (None, None) => IngestError::DispatcherClosed,
        };
        ActionResponse {
            message: Some(summary),
            ..ActionResponse::from_error(&HubError::Ingest(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::ingest::{row_events_from_bytes, RecordBatch};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        batches: Mutex<Vec<RecordBatch>>,
    }

    #[async_trait]
    impl BatchSink for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, batch: &RecordBatch) -> Result<(), SinkError> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }

    fn ndjson(rows: usize) -> Vec<u8> {
        (0..rows)
            .map(|i| format!("{{\"email\":\"user{i}@example.com\",\"id\":{i}}}\n"))
            .collect::<String>()
            .into_bytes()
    }

    #[tokio::test]
    async fn plain_rows_are_batched() {
        let sink = Arc::new(Recording::default());
        let engine = IngestionEngine::new(sink.clone(), 4).with_hash_mode(HashMode::Plain);
        let report = engine.run(row_events_from_bytes(ndjson(10))).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.batches_sent, vec![1, 2, 3]);
        assert_eq!(
            report.summary(),
            "Streaming upload complete. Sent 3 batches (batch size = 4)"
        );
        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches[0].rows[0]["email"], "user0@example.com");
        assert!(batches[2].is_final);
        assert_eq!(batches[2].rows.len(), 2);
    }

    #[tokio::test]
    async fn unresolved_schema_sends_nothing() {
        let sink = Arc::new(Recording::default());
        let engine = IngestionEngine::new(sink.clone(), 4);
        let err = engine
            .run(row_events_from_bytes(b"{\"city\":\"x\"}\n".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::SchemaUnresolved(_)));
        assert!(sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_stream_is_a_successful_no_op() {
        let sink = Arc::new(Recording::default());
        let report = IngestionEngine::new(sink, 4)
            .run(row_events_from_bytes(Vec::new()))
            .await
            .unwrap();
        assert!(report.is_success());
        assert_eq!(report.batch_count(), 0);
    }

    #[tokio::test]
    async fn rows_without_values_are_skipped() {
        let sink = Arc::new(Recording::default());
        let body = b"{\"email\":\"a@x\"}\n{\"email\":null}\n{\"email\":\"b@x\"}\n".to_vec();
        let report = IngestionEngine::new(sink.clone(), 10)
            .run(row_events_from_bytes(body))
            .await
            .unwrap();
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(sink.batches.lock().unwrap()[0].rows.len(), 2);
    }

    #[tokio::test]
    async fn source_error_is_reported_and_partial_batch_dropped() {
        let sink = Arc::new(Recording::default());
        let events = futures::stream::iter(vec![
            Ok(RowEvent::Row(
                serde_json::json!({"email": "a@x"}).as_object().unwrap().clone(),
            )),
            Err(IngestError::Source("connection reset".into())),
        ]);
        let report = IngestionEngine::new(sink.clone(), 10)
            .run(events)
            .await
            .unwrap();
        assert!(!report.is_success());
        assert!(sink.batches.lock().unwrap().is_empty());
        let resp = report.into_response();
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().kind, "SOURCE_ERROR");
    }

    #[test]
    fn failure_summary_lists_sequences() {
        let report = IngestReport {
            batch_size: 10,
            rows_read: 30,
            rows_skipped: 0,
            batches_sent: vec![1, 3],
            failures: vec![BatchFailure {
                seq: 2,
                attempts: 6,
                error: SinkError::status(503, "unavailable"),
            }],
            retries: 5,
            backoff: Vec::new(),
            source_error: None,
        };
        assert_eq!(
            report.summary(),
            "Streaming upload finished with errors. 1 of 3 batches failed (batches 2): HTTP 503: unavailable"
        );
        let resp = report.into_response();
        assert_eq!(resp.error.unwrap().kind, "BATCH_SEND_ERROR");
    }
}
