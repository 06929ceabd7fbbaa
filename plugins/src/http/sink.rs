use action_hub_core::api::{BatchSink, RecordBatch, SinkError};
use async_trait::async_trait;

use super::failure_preview;

/// Posts each batch as JSON to a fixed endpoint.
pub struct HttpBatchSink {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpBatchSink {
    pub fn new(http: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.trim().is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }
}

#[async_trait]
impl BatchSink for HttpBatchSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, batch: &RecordBatch) -> Result<(), SinkError> {
        tracing::debug!(
            url = %self.url,
            seq = batch.seq,
            rows = batch.rows.len(),
            is_final = batch.is_final,
            "sending batch"
        );
        let req = self
            .http
            .post(&self.url)
            .header("X-Batch-Seq", batch.seq.to_string())
            .json(batch);
        let resp = self
            .auth(req)
            .send()
            .await
            .map_err(|err| SinkError::transport(err.to_string()))?;

        match failure_preview(resp).await {
            None => Ok(()),
            Some((status, preview)) => Err(SinkError::status(status, preview)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_hub_core::api::Batch;
    use mockito::{Matcher, Server};
    use std::collections::BTreeMap;

    fn batch(seq: u64, is_final: bool) -> RecordBatch {
        let mut row = BTreeMap::new();
        row.insert("email".to_string(), "abc123".to_string());
        Batch {
            seq,
            rows: vec![row],
            is_final,
        }
    }

    fn sink(url: String) -> HttpBatchSink {
        HttpBatchSink::new(reqwest::Client::new(), url, "key-1")
    }

    #[tokio::test]
    async fn posts_batch_with_bearer_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/upload")
            .match_header("authorization", "Bearer key-1")
            .match_header("x-batch-seq", "2")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "seq": 2,
                "is_final": true,
                "rows": [{"email": "abc123"}]
            })))
            .with_status(204)
            .create_async()
            .await;

        sink(format!("{}/upload", server.url()))
            .send(&batch(2, true))
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_carries_code_and_body() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/upload")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let err = sink(format!("{}/upload", server.url()))
            .send(&batch(1, false))
            .await
            .unwrap_err();
        assert_eq!(err, SinkError::status(429, "slow down"));
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error() {
        let err = sink("http://127.0.0.1:1/upload".to_string())
            .send(&batch(1, false))
            .await
            .unwrap_err();
        assert_eq!(err.status, None);
    }
}
