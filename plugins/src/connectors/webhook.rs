use action_hub_core::api::{
    ActionParameter, ActionResponse, Connector, ConnectorSpec, Job, JobType,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::http::failure_preview;

/// Forwards the rendered payload to an arbitrary URL. Runs in-process.
pub struct WebhookConnector {
    spec: ConnectorSpec,
    http: reqwest::Client,
}

impl WebhookConnector {
    pub fn new(http: reqwest::Client) -> Self {
        let spec = ConnectorSpec::new("webhook", "Webhook")
            .description("POSTs the request data as JSON to a URL.")
            .param(ActionParameter::required("url", "Destination URL"))
            .param(
                ActionParameter::optional("token", "Bearer token")
                    .sensitive()
                    .description("Sent as an Authorization header when set."),
            )
            .supports(&[JobType::Cell, JobType::Query, JobType::Dashboard])
            .formats(&["json", "json_detail"]);
        Self { spec, http }
    }

    fn body(job: &Job) -> Result<Value> {
        let attachment = match &job.attachment {
            None => Value::Null,
            Some(att) => match att.json()? {
                Some(value) => value,
                None => json!({ "mime": att.mime, "data": att.data }),
            },
        };
        Ok(json!({
            "type": job.job_type,
            "scheduled_plan": job.scheduled_plan,
            "form_params": job.form_params,
            "attachment": attachment,
            "sent_at": chrono::Utc::now().to_rfc3339(),
        }))
    }
}

#[async_trait]
impl Connector for WebhookConnector {
    fn spec(&self) -> &ConnectorSpec {
        &self.spec
    }

    async fn execute(&self, job: &Job) -> Result<ActionResponse> {
        let raw = job
            .param("url")
            .ok_or_else(|| anyhow!("Required parameter \"url\" not provided."))?;
        let url = match reqwest::Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => {
                return Ok(ActionResponse::ok()
                    .with_validation_error("url", format!("\"{raw}\" is not an http(s) URL")))
            }
        };

        let request_id = job
            .webhook_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut req = self
            .http
            .post(url.clone())
            .header("X-Request-Id", &request_id)
            .json(&Self::body(job)?);
        if let Some(token) = job.param("token") {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("webhook delivery to {} failed", url.host_str().unwrap_or("?")))?;
        if let Some((status, preview)) = failure_preview(resp).await {
            bail!("Webhook answered HTTP {status}: {preview}");
        }

        tracing::info!(request_id = %request_id, host = ?url.host_str(), "webhook delivered");
        Ok(ActionResponse::ok_with_message(format!(
            "Delivered to {}",
            url.host_str().unwrap_or("webhook")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_hub_core::api::Attachment;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn posts_attachment_json_with_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/hook")
            .match_header("authorization", "Bearer t0k")
            .match_header("x-request-id", "wh-9")
            .match_body(Matcher::PartialJson(json!({
                "type": "query",
                "attachment": [{"a": 1}]
            })))
            .with_status(200)
            .create_async()
            .await;

        let job = Job::new(JobType::Query)
            .with_param("url", format!("{}/hook", server.url()))
            .with_param("token", "t0k")
            .with_webhook_id("wh-9")
            .with_attachment(Attachment::utf8("application/json", r#"[{"a":1}]"#));
        let resp = WebhookConnector::new(reqwest::Client::new())
            .execute(&job)
            .await
            .unwrap();
        assert!(resp.success);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_fails_the_action() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/hook")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let job = Job::new(JobType::Cell).with_param("url", format!("{}/hook", server.url()));
        let err = WebhookConnector::new(reqwest::Client::new())
            .execute(&job)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Webhook answered HTTP 500: boom");
    }

    #[tokio::test]
    async fn non_http_url_is_a_validation_error() {
        let job = Job::new(JobType::Cell).with_param("url", "ftp://example.com/x");
        let resp = WebhookConnector::new(reqwest::Client::new())
            .execute(&job)
            .await
            .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.validation_errors[0].field, "url");
    }
}
