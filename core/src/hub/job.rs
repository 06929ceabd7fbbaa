use std::collections::BTreeMap;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::HubError;

pub type ParamMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Cell,
    Query,
    Dashboard,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cell => "cell",
            Self::Query => "query",
            Self::Dashboard => "dashboard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cell" => Some(Self::Cell),
            "query" => Some(Self::Query),
            "dashboard" => Some(Self::Dashboard),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentEncoding {
    Utf8,
    Base64,
}

/// In-memory payload pushed with the job. The data is kept as received so
/// the job stays cheap to forward to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    pub encoding: AttachmentEncoding,
    pub data: String,
}

impl Attachment {
    pub fn utf8(mime: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime: Some(mime.into()),
            extension: None,
            encoding: AttachmentEncoding::Utf8,
            data: data.into(),
        }
    }

    pub fn bytes(&self) -> Result<Vec<u8>, HubError> {
        match self.encoding {
            AttachmentEncoding::Utf8 => Ok(self.data.clone().into_bytes()),
            AttachmentEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(self.data.trim())
                .map_err(|e| HubError::Validation(format!("attachment is not valid base64: {e}"))),
        }
    }

    pub fn is_json(&self) -> bool {
        self.mime.as_deref() == Some("application/json")
    }

    /// Parsed JSON body for `application/json` attachments.
    pub fn json(&self) -> Result<Option<serde_json::Value>, HubError> {
        if !self.is_json() {
            return Ok(None);
        }
        let bytes = self.bytes()?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| HubError::Validation(format!("attachment is not valid JSON: {e}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPlan {
    #[serde(default)]
    pub scheduled_plan_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub plan_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub query_id: Option<i64>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// One inbound unit of work. Immutable once built; owned by the invocation
/// that created it and serialized as-is to isolated workers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "type", default)]
    pub job_type: Option<JobType>,
    /// Type string sent by the caller that matches no known job type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unrecognized_type: Option<String>,
    #[serde(default)]
    pub params: ParamMap,
    #[serde(default)]
    pub form_params: ParamMap,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub scheduled_plan: Option<ScheduledPlan>,
    #[serde(default)]
    pub webhook_id: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub client_version: Option<String>,
}

impl Job {
    pub fn new(job_type: JobType) -> Self {
        Self {
            job_type: Some(job_type),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_form_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_params.insert(name.into(), value.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        let plan = self.scheduled_plan.get_or_insert_with(ScheduledPlan::default);
        plan.download_url = Some(url.into());
        self
    }

    pub fn with_webhook_id(mut self, id: impl Into<String>) -> Self {
        self.webhook_id = Some(id.into());
        self
    }

    pub fn download_url(&self) -> Option<&str> {
        self.scheduled_plan
            .as_ref()
            .and_then(|p| p.download_url.as_deref())
            .filter(|u| !u.is_empty())
    }

    /// True when the job carries data a streaming connector can consume.
    pub fn has_payload(&self) -> bool {
        self.attachment.is_some() || self.download_url().is_some()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn form_param(&self, name: &str) -> Option<&str> {
        self.form_params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn correlation_id(&self) -> &str {
        self.webhook_id.as_deref().unwrap_or("-")
    }

    pub fn client_semver(&self) -> Option<semver::Version> {
        self.client_version
            .as_deref()
            .and_then(|v| semver::Version::parse(v).ok())
    }

    pub fn from_webhook(payload: WebhookPayload, meta: RequestMeta) -> Result<Self, HubError> {
        let (job_type, unrecognized_type) = match payload.job_type.as_deref().map(str::trim) {
            None | Some("") => (None, None),
            Some(t) => match JobType::parse(t) {
                Some(known) => (Some(known), None),
                None => (None, Some(t.to_string())),
            },
        };

        let attachment = match payload.attachment {
            Some(a) => a.into_attachment()?,
            None => None,
        };

        let scheduled_plan = payload.scheduled_plan.map(|p| ScheduledPlan {
            scheduled_plan_id: p.scheduled_plan_id,
            title: p.title,
            plan_type: p.plan_type,
            url: p.url,
            query_id: p.query_id,
            download_url: p.download_url,
        });

        Ok(Self {
            job_type,
            unrecognized_type,
            params: flatten_params(payload.data),
            form_params: flatten_params(payload.form_params),
            attachment,
            scheduled_plan,
            webhook_id: meta.webhook_id,
            instance_id: meta.instance_id,
            client_version: meta.user_agent.as_deref().and_then(parse_client_version),
        })
    }
}

/// Transport metadata captured from the inbound request headers.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub instance_id: Option<String>,
    pub webhook_id: Option<String>,
    pub user_agent: Option<String>,
}

/// Extracts the client version from a user agent such as
/// `ExampleOutgoingWebhook/7.4.1`. Invalid versions are ignored.
pub fn parse_client_version(user_agent: &str) -> Option<String> {
    let (_, rest) = user_agent.split_once("OutgoingWebhook/")?;
    let token = rest.split_whitespace().next()?;
    semver::Version::parse(token).ok().map(|v| v.to_string())
}

/// Raw webhook body as posted by the upstream product.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type", default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub data: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub form_params: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub attachment: Option<WebhookAttachment>,
    #[serde(default)]
    pub scheduled_plan: Option<WebhookScheduledPlan>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookAttachment {
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl WebhookAttachment {
    fn into_attachment(self) -> Result<Option<Attachment>, HubError> {
        let (Some(mime), Some(data)) = (self.mimetype, self.data) else {
            return Ok(None);
        };
        let encoding = if mime.ends_with(";base64") {
            AttachmentEncoding::Base64
        } else {
            AttachmentEncoding::Utf8
        };
        let attachment = Attachment {
            mime: Some(mime),
            extension: self.extension,
            encoding,
            data,
        };
        // Reject malformed JSON up front rather than inside a worker.
        attachment.json()?;
        Ok(Some(attachment))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookScheduledPlan {
    #[serde(default)]
    pub scheduled_plan_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub plan_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub query_id: Option<i64>,
    #[serde(default)]
    pub download_url: Option<String>,
}

fn flatten_params(raw: Option<BTreeMap<String, serde_json::Value>>) -> ParamMap {
    raw.unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| match v {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((k, s)),
            other => Some((k, other.to_string())),
        })
        .collect()
}
