//! Streaming ingestion: rows in, ordered batches out to a remote sink.
//!
//! ```text
//! bytes → RowEvent stream → SchemaMapping::detect (first row) → transform
//!       → BatchAccumulator → BatchDispatcher (one in flight, retries) → IngestReport
//! ```

mod accumulator;
mod engine;
mod geo;
mod retry;
mod row;
mod schema;
mod sender;

pub use accumulator::{Batch, BatchAccumulator, RecordBatch};
pub use engine::{IngestReport, IngestionEngine};
pub use retry::{ExponentialBackoff, RetryPolicy, RetryStrategy};
pub use row::{row_events_from_byte_stream, row_events_from_bytes, ColumnInfo, Row, RowEvent};
pub use schema::{HashMode, Normalizer, SchemaMapping, UserField, UserRecord};
pub use sender::{BatchDispatcher, BatchFailure, BatchSink, DispatchReport};
