use std::sync::Arc;

use action_hub_core::api::{
    ActionForm, ActionParameter, ActionResponse, Connector, ConnectorSpec, FormField, HashMode,
    IngestConfig, IngestionEngine, Isolation, Job, JobType, Responder, RetryPolicy,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::http::HttpBatchSink;
use crate::source::open_job_rows;

const ACCEPTED_MESSAGE: &str = "Upload accepted. Batches are being sent in the background.";

/// Streams query results into a remote audience in hashed batches.
///
/// Runs in an extended worker: the caller gets an acknowledgement as soon as
/// the row source opens, and the upload keeps going afterwards.
pub struct AudienceUploadConnector {
    spec: ConnectorSpec,
    download: reqwest::Client,
    upload: reqwest::Client,
    ingest: IngestConfig,
}

impl AudienceUploadConnector {
    pub fn new(download: reqwest::Client, upload: reqwest::Client, ingest: IngestConfig) -> Self {
        let spec = ConnectorSpec::new("audience_upload", "Audience Upload")
            .description("Matches identity columns, normalizes and hashes them, and uploads the rows in batches.")
            .param(ActionParameter::required("endpoint_url", "Upload endpoint"))
            .param(ActionParameter::required("api_key", "API key").sensitive())
            .supports(&[JobType::Query])
            .formats(&["json_label"])
            .isolation(Isolation::Extended)
            .streaming();
        Self {
            spec,
            download,
            upload,
            ingest,
        }
    }

    async fn upload(&self, job: &Job, responder: &mut Responder) -> Result<ActionResponse> {
        let endpoint = job
            .param("endpoint_url")
            .ok_or_else(|| anyhow!("Required parameter \"endpoint_url\" not provided."))?;
        let api_key = job.param("api_key").unwrap_or_default();
        let hash = HashMode::from_form_param(job.form_param("should_hash"));

        let rows = open_job_rows(&self.download, job).await?;
        responder.reply(ActionResponse::ok_with_message(ACCEPTED_MESSAGE));

        let sink = Arc::new(HttpBatchSink::new(self.upload.clone(), endpoint, api_key));
        let engine = IngestionEngine::new(sink, self.ingest.batch_size)
            .with_hash_mode(hash)
            .with_retry(RetryPolicy::from_config(&self.ingest.retry));

        let report = engine.run(rows).await?;
        tracing::info!(
            webhook_id = %job.correlation_id(),
            rows_read = report.rows_read,
            rows_skipped = report.rows_skipped,
            batches = report.batch_count(),
            failed = report.failures.len(),
            retries = report.retries,
            "audience upload finished"
        );
        Ok(report.into_response())
    }
}

#[async_trait]
impl Connector for AudienceUploadConnector {
    fn spec(&self) -> &ConnectorSpec {
        &self.spec
    }

    async fn execute(&self, job: &Job) -> Result<ActionResponse> {
        self.upload(job, &mut Responder::detached()).await
    }

    async fn execute_extended(
        &self,
        job: &Job,
        mut responder: Responder,
    ) -> Result<ActionResponse> {
        self.upload(job, &mut responder).await
    }

    fn has_form(&self) -> bool {
        true
    }

    async fn form(&self, _job: &Job) -> Result<ActionForm> {
        Ok(ActionForm::new(vec![FormField::new(
            "should_hash",
            "Should the data be hashed?",
        )
        .select(&[
            ("do_hashing", "Yes, hash values before upload"),
            ("do_no_hashing", "No, values are already hashed"),
        ])
        .default_value("do_hashing")
        .required()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_hub_core::api::Attachment;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn connector(batch_size: usize) -> AudienceUploadConnector {
        let mut ingest = IngestConfig::default();
        ingest.batch_size = batch_size;
        ingest.retry.enabled = false;
        AudienceUploadConnector::new(reqwest::Client::new(), reqwest::Client::new(), ingest)
    }

    fn job(endpoint: String) -> Job {
        Job::new(JobType::Query)
            .with_param("endpoint_url", endpoint)
            .with_param("api_key", "k")
            .with_form_param("should_hash", "do_no_hashing")
            .with_attachment(Attachment::utf8(
                "application/json",
                r#"[{"Email":" A@X.io "},{"Email":"b@x.io"},{"Email":"c@x.io"}]"#,
            ))
    }

    #[tokio::test]
    async fn uploads_rows_in_batches() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/audience")
            .match_body(Matcher::PartialJson(json!({
                "seq": 1,
                "is_final": false,
                "rows": [{"email": "a@x.io"}, {"email": "b@x.io"}]
            })))
            .with_status(200)
            .create_async()
            .await;
        let last = server
            .mock("POST", "/audience")
            .match_body(Matcher::PartialJson(json!({"seq": 2, "is_final": true})))
            .with_status(200)
            .create_async()
            .await;

        let resp = connector(2)
            .execute(&job(format!("{}/audience", server.url())))
            .await
            .unwrap();
        assert!(resp.success, "{resp:?}");
        assert_eq!(
            resp.message.as_deref(),
            Some("Streaming upload complete. Sent 2 batches (batch size = 2)")
        );
        first.assert_async().await;
        last.assert_async().await;
    }

    #[tokio::test]
    async fn replies_early_when_extended() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/audience")
            .with_status(200)
            .create_async()
            .await;

        let (responder, rx) = Responder::channel();
        let resp = connector(10)
            .execute_extended(&job(format!("{}/audience", server.url())), responder)
            .await
            .unwrap();
        let early = rx.await.unwrap();
        assert_eq!(early.message.as_deref(), Some(ACCEPTED_MESSAGE));
        assert!(resp.success);
    }

    #[tokio::test]
    async fn rejected_batch_fails_the_upload() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/audience")
            .with_status(400)
            .with_body("bad rows")
            .create_async()
            .await;

        let resp = connector(10)
            .execute(&job(format!("{}/audience", server.url())))
            .await
            .unwrap();
        assert!(!resp.success);
        assert!(resp.message.unwrap().contains("1 of 1 batches failed"));
    }

    #[tokio::test]
    async fn missing_payload_never_replies() {
        let job = Job::new(JobType::Query)
            .with_param("endpoint_url", "http://127.0.0.1:1/")
            .with_param("api_key", "k");
        let (responder, mut rx) = Responder::channel();
        let res = connector(10).execute_extended(&job, responder).await;
        assert!(res.is_err());
        assert!(rx.try_recv().is_err());
    }
}
