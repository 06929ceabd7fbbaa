use std::time::Duration;

use action_hub_core::api::{
    ActionForm, ActionParameter, ActionResponse, Connector, ConnectorSpec, FormField, Isolation,
    Job, JobType,
};
use anyhow::{bail, Result};
use async_trait::async_trait;

const DEFAULT_SLEEP_MS: u64 = 1000;

/// Echoes, sleeps or fails on demand. Useful for exercising the worker
/// pipeline end to end without an external service.
pub struct DebugConnector {
    spec: ConnectorSpec,
}

impl DebugConnector {
    pub fn new() -> Self {
        let spec = ConnectorSpec::new("debug", "Debug Action")
            .description("Echoes the request, sleeps or fails as selected in the form.")
            .param(
                ActionParameter::optional("sleep_ms", "Default sleep (ms)")
                    .description("Used by the sleep mode when the form leaves it blank."),
            )
            .supports(&[JobType::Cell, JobType::Query, JobType::Dashboard])
            .formats(&["json", "json_detail", "csv", "txt"])
            .isolation(Isolation::Standard);
        Self { spec }
    }
}

impl Default for DebugConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_job(job: &Job) -> String {
    let job_type = job.job_type.map(JobType::as_str).unwrap_or("unknown");
    let payload = match (&job.attachment, job.download_url()) {
        (Some(attachment), _) => format!(", attachment of {} bytes", attachment.data.len()),
        (None, Some(_)) => ", download url".to_string(),
        (None, None) => String::new(),
    };
    format!(
        "Received {job_type} request with {} params{payload}",
        job.params.len()
    )
}

fn sleep_ms(job: &Job) -> Result<u64> {
    match job.form_param("sleep_ms").or_else(|| job.param("sleep_ms")) {
        None => Ok(DEFAULT_SLEEP_MS),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) => Ok(ms),
            Err(_) => bail!("sleep_ms must be a whole number of milliseconds, got \"{raw}\""),
        },
    }
}

#[async_trait]
impl Connector for DebugConnector {
    fn spec(&self) -> &ConnectorSpec {
        &self.spec
    }

    async fn execute(&self, job: &Job) -> Result<ActionResponse> {
        let mode = job.form_param("mode").unwrap_or("echo");
        tracing::debug!(mode = %mode, webhook_id = %job.correlation_id(), "debug action");

        match mode {
            "echo" => Ok(ActionResponse::ok_with_message(describe_job(job))),
            "sleep" => {
                let ms = sleep_ms(job)?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(ActionResponse::ok_with_message(format!("Slept for {ms}ms")))
            }
            "fail" => bail!("Debug action failed as requested"),
            other => Ok(ActionResponse::ok()
                .with_validation_error("mode", format!("Unknown mode \"{other}\""))),
        }
    }

    fn has_form(&self) -> bool {
        true
    }

    async fn form(&self, _job: &Job) -> Result<ActionForm> {
        Ok(ActionForm::new(vec![
            FormField::new("mode", "Mode")
                .select(&[("echo", "Echo"), ("sleep", "Sleep"), ("fail", "Fail")])
                .default_value("echo")
                .required(),
            FormField::new("sleep_ms", "Sleep (ms)")
                .default_value(DEFAULT_SLEEP_MS.to_string())
                .description("Only used by the sleep mode."),
        ]))
    }
}
