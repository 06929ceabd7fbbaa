mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use action_hub_core::config::RetryConfig;
use action_hub_core::ingest::{
    row_events_from_byte_stream, HashMode, IngestionEngine, RetryPolicy,
};
use bytes::Bytes;
use common::{ndjson_rows, RecordingSink};

/// Splits a body into uneven chunks the way a network read would.
fn chunked(body: String, chunk: usize) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> {
    let bytes = body.into_bytes();
    let chunks: Vec<_> = bytes
        .chunks(chunk)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures::stream::iter(chunks)
}

#[tokio::test(start_paused = true)]
async fn streams_rows_into_ordered_batches() {
    let sink = RecordingSink::new();
    let engine = IngestionEngine::new(sink.clone(), 1000).with_hash_mode(HashMode::Plain);

    let report = engine
        .run(row_events_from_byte_stream(chunked(ndjson_rows(2500), 777)))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(sink.sequences(), vec![1, 2, 3]);
    let batches = sink.batches.lock().unwrap();
    let finals: Vec<bool> = batches.iter().map(|b| b.is_final).collect();
    assert_eq!(finals, vec![false, false, true]);
    assert_eq!(batches[2].rows.len(), 500);
    assert_eq!(batches[0].rows[0]["email"], "user0@example.com");
    assert_eq!(batches[0].rows[0]["city"], "town0");
    assert_eq!(sink.peak_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(
        report.summary(),
        "Streaming upload complete. Sent 3 batches (batch size = 1000)"
    );
}

#[tokio::test(start_paused = true)]
async fn retryable_failures_are_retried_with_backoff() {
    let sink = RecordingSink::new();
    sink.fail(1, 2, 429);
    let retry = RetryPolicy::from_config(&RetryConfig::default());
    let engine = IngestionEngine::new(sink.clone(), 10).with_retry(retry);

    let report = engine
        .run(row_events_from_byte_stream(chunked(ndjson_rows(5), 64)))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.batches_sent, vec![1]);
    assert_eq!(report.retries, 2);
    assert_eq!(
        report.backoff,
        vec![Duration::from_secs(1), Duration::from_secs(3)]
    );

    let attempts = sink.attempts.lock().unwrap();
    assert_eq!(attempts.len(), 3);
    assert!(attempts[1].1 - attempts[0].1 >= Duration::from_secs(1));
    assert!(attempts[2].1 - attempts[1].1 >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn failed_batch_is_reported_but_later_batches_still_go_out() {
    let sink = RecordingSink::new();
    sink.fail(2, 1, 400);
    let engine = IngestionEngine::new(sink.clone(), 2)
        .with_retry(RetryPolicy::from_config(&RetryConfig::default()));

    let report = engine
        .run(row_events_from_byte_stream(chunked(ndjson_rows(6), 50)))
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(sink.sequences(), vec![1, 3]);
    assert_eq!(report.failures[0].seq, 2);
    let resp = report.into_response();
    assert!(!resp.success);
    assert!(resp.message.unwrap().contains("1 of 3 batches failed"));
}

#[tokio::test(start_paused = true)]
async fn batch_sequences_are_gapless() {
    for (rows, size) in [(1usize, 5usize), (5, 5), (11, 5), (99, 10)] {
        let sink = RecordingSink::new();
        let engine = IngestionEngine::new(sink.clone(), size);
        engine
            .run(row_events_from_byte_stream(chunked(ndjson_rows(rows), 33)))
            .await
            .unwrap();

        let expected: Vec<u64> = (1..=rows.div_ceil(size) as u64).collect();
        assert_eq!(sink.sequences(), expected, "rows={rows} size={size}");
        let total: usize = sink.batches.lock().unwrap().iter().map(|b| b.rows.len()).sum();
        assert_eq!(total, rows);
    }
}

#[tokio::test(start_paused = true)]
async fn tagged_envelope_maps_columns_the_patterns_would_miss() {
    // Field metadata precedes the data, as in real exports.
    let body = r#"{
  "fields": {
    "dimensions": [
      {"name": "customer.contact", "tags": ["email"]},
      {"name": "customer.ident", "tags": ["mad_id"]},
      {"name": "customer.region", "tags": ["state"]}
    ],
    "measures": [],
    "table_calculations": []
  },
  "data": [
    {"customer.contact": {"value": "A@X.com"}, "customer.ident": {"value": "ID-1"}, "customer.region": {"value": "Texas"}},
    {"customer.contact": {"value": "b@x.com"}, "customer.ident": {"value": null}, "customer.region": {"value": "TX"}},
    {"customer.contact": {"value": "c@x.com"}, "customer.ident": {"value": "ID-3"}, "customer.region": {"value": null}}
  ]
}"#
    .to_string();

    let sink = RecordingSink::new();
    let engine = IngestionEngine::new(sink.clone(), 2).with_hash_mode(HashMode::Plain);
    let report = engine
        .run(row_events_from_byte_stream(chunked(body, 17)))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.rows_read, 3);
    assert_eq!(sink.sequences(), vec![1, 2]);

    let batches = sink.batches.lock().unwrap();
    let first = &batches[0].rows[0];
    assert_eq!(first["email"], "a@x.com");
    assert_eq!(first["madid"], "id-1");
    assert_eq!(first["state"], "tx");
    assert_eq!(batches[0].rows[1]["state"], "tx");
    assert!(!batches[0].rows[1].contains_key("madid"));
    assert_eq!(batches[1].rows[0]["email"], "c@x.com");
    assert!(batches[1].is_final);
}
