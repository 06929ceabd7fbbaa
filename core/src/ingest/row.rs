use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::IngestError;

pub type Row = serde_json::Map<String, Value>;

/// Column metadata announced ahead of the rows by some export formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub label: String,
    pub tags: Vec<String>,
}

impl ColumnInfo {
    pub fn untagged(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowEvent {
    Fields(Vec<ColumnInfo>),
    Row(Row),
}

/// Parses an export byte stream into row events as the bytes arrive.
///
/// Accepts newline-delimited (or concatenated) JSON objects, a JSON array of
/// objects, or a `{fields, data}` envelope. Each row is yielded as soon as
/// its closing bracket has been read; only the row being parsed is buffered.
pub fn row_events_from_byte_stream<S, E>(
    source: S,
) -> impl Stream<Item = Result<RowEvent, IngestError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::try_stream! {
        let mut source = Box::pin(source);
        let mut scanner = RowScanner::default();
        let mut eof = false;

        loop {
            while let Some(event) = scanner.next_event(eof)? {
                yield event;
            }
            if eof {
                break;
            }
            match source.next().await {
                Some(chunk) => {
                    let chunk = chunk.map_err(|e| IngestError::Source(e.to_string()))?;
                    scanner.feed(&chunk);
                }
                None => eof = true,
            }
        }
    }
}

/// Row events for an in-memory body such as a pushed attachment.
pub fn row_events_from_bytes(
    body: Vec<u8>,
) -> impl Stream<Item = Result<RowEvent, IngestError>> + Send {
    let chunk: Result<Bytes, std::convert::Infallible> = Ok(Bytes::from(body));
    row_events_from_byte_stream(futures::stream::iter(vec![chunk]))
}

/// Open container the scanner is currently inside.
enum Scope {
    /// Root-level array; every element is a row.
    Rows { first: bool },
    /// Root-level object. Becomes an envelope once `fields` or `data` is
    /// seen, otherwise the whole object is one row.
    Object {
        first: bool,
        envelope: bool,
        pending: Row,
    },
    /// The `data` array of an envelope.
    Data { first: bool },
}

enum Step {
    Event(RowEvent),
    Advanced,
    NeedMore,
    Done,
}

/// Incremental splitter over a JSON body. Finds where each element ends and
/// hands only that slice to serde_json.
#[derive(Default)]
struct RowScanner {
    buf: Vec<u8>,
    pos: usize,
    stack: Vec<Scope>,
}

impl RowScanner {
    fn feed(&mut self, chunk: &[u8]) {
        self.buf.drain(..self.pos);
        self.pos = 0;
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete event, or `None` when more input is needed (or the body
    /// is finished at `eof`).
    fn next_event(&mut self, eof: bool) -> Result<Option<RowEvent>, IngestError> {
        loop {
            match self.step()? {
                Step::Event(event) => return Ok(Some(event)),
                Step::Advanced => continue,
                Step::Done => return Ok(None),
                Step::NeedMore if !eof => return Ok(None),
                Step::NeedMore => {
                    return Err(IngestError::Parse("body ended inside a JSON document".into()))
                }
            }
        }
    }

    fn step(&mut self) -> Result<Step, IngestError> {
        let Some(scope) = self.stack.pop() else {
            return self.step_root();
        };
        match scope {
            Scope::Rows { first } => self.step_element(first, false),
            Scope::Data { first } => self.step_element(first, true),
            Scope::Object {
                first,
                envelope,
                pending,
            } => self.step_object(first, envelope, pending),
        }
    }

    fn step_root(&mut self) -> Result<Step, IngestError> {
        let i = skip_ws(&self.buf, self.pos);
        let Some(&b) = self.buf.get(i) else {
            self.pos = i;
            return Ok(Step::Done);
        };
        match b {
            b'[' => self.stack.push(Scope::Rows { first: true }),
            b'{' => self.stack.push(Scope::Object {
                first: true,
                envelope: false,
                pending: Row::new(),
            }),
            _ => {
                return Err(IngestError::Parse(format!(
                    "expected a JSON object or array, found {:?}",
                    char::from(b)
                )))
            }
        }
        self.pos = i + 1;
        Ok(Step::Advanced)
    }

    /// One element of a root array (`lenient == false`) or of an envelope's
    /// `data` array, where non-object entries are skipped.
    fn step_element(&mut self, first: bool, lenient: bool) -> Result<Step, IngestError> {
        let reopen = |first| {
            if lenient {
                Scope::Data { first }
            } else {
                Scope::Rows { first }
            }
        };

        let mut i = skip_ws(&self.buf, self.pos);
        match self.buf.get(i).copied() {
            None => {
                self.stack.push(reopen(first));
                return Ok(Step::NeedMore);
            }
            Some(b']') => {
                self.pos = i + 1;
                return Ok(Step::Advanced);
            }
            Some(b',') if !first => i = skip_ws(&self.buf, i + 1),
            Some(_) if !first => {
                return Err(IngestError::Parse("expected ',' between array elements".into()))
            }
            Some(_) => {}
        }

        let Some(end) = value_end(&self.buf, i) else {
            self.stack.push(reopen(first));
            return Ok(Step::NeedMore);
        };
        let value: Value = serde_json::from_slice(&self.buf[i..end])?;
        self.pos = end;
        self.stack.push(reopen(false));

        match value {
            Value::Object(obj) => Ok(Step::Event(RowEvent::Row(flatten_row(obj)))),
            _ if lenient => Ok(Step::Advanced),
            other => Err(IngestError::Parse(format!(
                "expected an array of objects, found {}",
                type_name(&other)
            ))),
        }
    }

    fn step_object(
        &mut self,
        first: bool,
        envelope: bool,
        mut pending: Row,
    ) -> Result<Step, IngestError> {
        let mut i = skip_ws(&self.buf, self.pos);
        match self.buf.get(i).copied() {
            None => {
                self.stack.push(Scope::Object {
                    first,
                    envelope,
                    pending,
                });
                return Ok(Step::NeedMore);
            }
            Some(b'}') => {
                self.pos = i + 1;
                if envelope {
                    return Ok(Step::Advanced);
                }
                return Ok(Step::Event(RowEvent::Row(flatten_row(pending))));
            }
            Some(b',') if !first => i = skip_ws(&self.buf, i + 1),
            Some(_) if !first => {
                return Err(IngestError::Parse("expected ',' between object members".into()))
            }
            Some(_) => {}
        }
        match self.buf.get(i).copied() {
            Some(b'"') | None => {}
            Some(_) => return Err(IngestError::Parse("expected a quoted object key".into())),
        }

        // Key, colon and the start of the value must all be buffered.
        let member = string_end(&self.buf, i).and_then(|key_end| {
            let colon = skip_ws(&self.buf, key_end);
            let value_start = skip_ws(&self.buf, colon + 1);
            (value_start < self.buf.len()).then_some((key_end, colon, value_start))
        });
        let Some((key_end, colon, value_start)) = member else {
            self.stack.push(Scope::Object {
                first,
                envelope,
                pending,
            });
            return Ok(Step::NeedMore);
        };
        if self.buf[colon] != b':' {
            return Err(IngestError::Parse("expected ':' after object key".into()));
        }
        let key: String = serde_json::from_slice(&self.buf[i..key_end])?;

        if key == "data" && self.buf[value_start] == b'[' {
            self.pos = value_start + 1;
            self.stack.push(Scope::Object {
                first: false,
                envelope: true,
                pending,
            });
            self.stack.push(Scope::Data { first: true });
            return Ok(Step::Advanced);
        }

        let Some(end) = value_end(&self.buf, value_start) else {
            self.stack.push(Scope::Object {
                first,
                envelope,
                pending,
            });
            return Ok(Step::NeedMore);
        };
        let value: Value = serde_json::from_slice(&self.buf[value_start..end])?;
        self.pos = end;

        match value {
            Value::Object(fields) if key == "fields" => {
                self.stack.push(Scope::Object {
                    first: false,
                    envelope: true,
                    pending,
                });
                let columns = envelope_columns(&fields);
                if columns.is_empty() {
                    return Ok(Step::Advanced);
                }
                Ok(Step::Event(RowEvent::Fields(columns)))
            }
            value => {
                pending.insert(key, value);
                self.stack.push(Scope::Object {
                    first: false,
                    envelope,
                    pending,
                });
                Ok(Step::Advanced)
            }
        }
    }
}

fn skip_ws(buf: &[u8], mut i: usize) -> usize {
    while buf.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    i
}

/// End (exclusive) of the string starting at `start`, if fully buffered.
fn string_end(buf: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    loop {
        match *buf.get(i)? {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
}

/// End (exclusive) of the JSON value starting at `start`, if fully buffered.
/// Only finds the boundary; serde_json validates the slice afterwards.
fn value_end(buf: &[u8], start: usize) -> Option<usize> {
    match *buf.get(start)? {
        b'"' => string_end(buf, start),
        b'{' | b'[' => {
            let mut depth = 0usize;
            let mut i = start;
            while i < buf.len() {
                match buf[i] {
                    b'"' => {
                        i = string_end(buf, i)?;
                        continue;
                    }
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(i + 1);
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            None
        }
        _ => buf[start..]
            .iter()
            .position(|b| matches!(b, b',' | b']' | b'}') || b.is_ascii_whitespace())
            .map(|len| start + len),
    }
}

fn envelope_columns(fields: &Row) -> Vec<ColumnInfo> {
    ["dimensions", "measures", "table_calculations"]
        .iter()
        .filter_map(|group| fields.get(*group).and_then(Value::as_array))
        .flatten()
        .filter_map(column_info)
        .collect()
}

fn column_info(field: &Value) -> Option<ColumnInfo> {
    let label = field.get("name").and_then(Value::as_str)?.to_string();
    let tags = field
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(ColumnInfo { label, tags })
}

/// `{"users.email": {"value": "a@b"}}` becomes `{"users.email": "a@b"}`.
fn flatten_row(obj: Row) -> Row {
    obj.into_iter()
        .map(|(k, v)| match v {
            Value::Object(mut cell) if cell.contains_key("value") => {
                let inner = cell.remove("value").unwrap_or(Value::Null);
                (k, inner)
            }
            other => (k, other),
        })
        .collect()
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use pretty_assertions::assert_eq;

    async fn collect_chunks(chunks: Vec<&'static str>) -> Result<Vec<RowEvent>, IngestError> {
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, std::io::Error>(Bytes::from_static(c.as_bytes()))),
        );
        row_events_from_byte_stream(stream).try_collect().await
    }

    fn row(v: Value) -> RowEvent {
        match v {
            Value::Object(o) => RowEvent::Row(o),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn ndjson_split_across_chunks() {
        let events = collect_chunks(vec!["{\"email\":\"a@x\"}\n{\"em", "ail\":\"b@x\"}\n", "{\"email\":\"c@x\"}"])
            .await
            .unwrap();
        assert_eq!(
            events,
            vec![
                row(serde_json::json!({"email": "a@x"})),
                row(serde_json::json!({"email": "b@x"})),
                row(serde_json::json!({"email": "c@x"})),
            ]
        );
    }

    #[tokio::test]
    async fn json_array_document() {
        let events = collect_chunks(vec!["[\n {\"email\": \"a@x\"},\n", " {\"email\": \"b@x\"}\n]"])
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn json_detail_envelope_carries_tags() {
        let body = r#"{
  "fields": {
    "dimensions": [{"name": "users.email", "tags": ["email"]}],
    "measures": [],
    "table_calculations": [{"name": "calc.id", "tags": []}]
  },
  "data": [
    {"users.email": {"value": "a@x"}, "calc.id": {"value": 7}}
  ]
}"#;
        let events = collect_chunks(vec![body]).await.unwrap();
        assert_eq!(
            events[0],
            RowEvent::Fields(vec![
                ColumnInfo {
                    label: "users.email".into(),
                    tags: vec!["email".into()]
                },
                ColumnInfo::untagged("calc.id"),
            ])
        );
        assert_eq!(events[1], row(serde_json::json!({"users.email": "a@x", "calc.id": 7})));
    }

    #[tokio::test]
    async fn compact_envelope_on_one_line() {
        let events = collect_chunks(vec![
            "{\"fields\":{\"dimensions\":[{\"name\":\"e\",\"tags\":[\"email\"]}]},\"data\":[{\"e\":{\"value\":\"a@x\"}}]}\n",
        ])
        .await
        .unwrap();
        assert_eq!(events.len(), 2);
    }

    /// Feeds `head` and then never finishes the body.
    fn open_ended(head: &'static str) -> impl Stream<Item = Result<RowEvent, IngestError>> + Send {
        let source = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
            head.as_bytes(),
        ))])
        .chain(futures::stream::pending());
        row_events_from_byte_stream(source)
    }

    async fn next_within(
        events: &mut (impl Stream<Item = Result<RowEvent, IngestError>> + Unpin),
    ) -> RowEvent {
        tokio::time::timeout(std::time::Duration::from_millis(200), events.next())
            .await
            .expect("event before end of body")
            .expect("stream still open")
            .unwrap()
    }

    #[tokio::test]
    async fn array_rows_arrive_before_the_body_ends() {
        let mut events = Box::pin(open_ended("[{\"email\":\"a@x\"},\n{\"email\":\"b@x\"},\n{\"em"));
        assert_eq!(next_within(&mut events).await, row(serde_json::json!({"email": "a@x"})));
        assert_eq!(next_within(&mut events).await, row(serde_json::json!({"email": "b@x"})));
    }

    #[tokio::test]
    async fn envelope_streams_fields_then_rows() {
        let mut events = Box::pin(open_ended(
            "{\"fields\":{\"dimensions\":[{\"name\":\"u.e\",\"tags\":[\"email\"]}]},\"data\":[{\"u.e\":{\"value\":\"a@x\"}},",
        ));
        assert_eq!(
            next_within(&mut events).await,
            RowEvent::Fields(vec![ColumnInfo {
                label: "u.e".into(),
                tags: vec!["email".into()]
            }])
        );
        assert_eq!(next_within(&mut events).await, row(serde_json::json!({"u.e": "a@x"})));
    }

    #[tokio::test]
    async fn brackets_and_quotes_inside_strings_split_across_chunks() {
        let events = collect_chunks(vec![
            "[{\"note\": \"say \\\"hi",
            "\\\" ]}\"}, {\"note\"",
            ": \"{[\"}]",
        ])
        .await
        .unwrap();
        assert_eq!(
            events,
            vec![
                row(serde_json::json!({"note": "say \"hi\" ]}"})),
                row(serde_json::json!({"note": "{["})),
            ]
        );
    }

    #[tokio::test]
    async fn truncated_document_is_a_parse_error() {
        let events: Vec<_> = row_events_from_bytes(b"[{\"a\":1}, {\"a\"".to_vec()).collect().await;
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(IngestError::Parse(_))));
    }

    #[tokio::test]
    async fn array_of_scalars_is_rejected() {
        let err = collect_chunks(vec!["[1, 2]"]).await.unwrap_err();
        assert!(err.to_string().contains("expected an array of objects"));
    }

    #[tokio::test]
    async fn empty_body_yields_nothing() {
        assert!(collect_chunks(vec!["", "  \n"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_line_is_a_parse_error() {
        let err = collect_chunks(vec!["{\"a\":1}\nnot json\n"]).await.unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[tokio::test]
    async fn source_failure_surfaces() {
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"{\"a\":1}\n")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "reset")),
        ]);
        let events: Vec<_> = row_events_from_byte_stream(stream).collect().await;
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(IngestError::Source(_))));
    }
}
