use async_trait::async_trait;
use semver::Version;
use serde::Serialize;

use super::{ActionForm, ActionResponse, Job, JobType, Responder};

/// Where a connector's `execute` runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// In the dispatcher's own task.
    #[default]
    None,
    /// Child process via the execute queue; one result then exit.
    Standard,
    /// Child process via the extended queue; early response, later done.
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadSetting {
    Push,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionParameter {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ActionParameter {
    pub fn required(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            required: true,
            sensitive: false,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, label)
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Static descriptor every connector exposes.
#[derive(Debug, Clone)]
pub struct ConnectorSpec {
    pub name: String,
    pub label: String,
    pub description: String,
    pub params: Vec<ActionParameter>,
    pub supported_types: Vec<JobType>,
    pub supported_formats: Vec<String>,
    pub isolation: Isolation,
    pub uses_streaming: bool,
    pub minimum_supported_version: Version,
}

impl ConnectorSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: String::new(),
            params: Vec::new(),
            supported_types: Vec::new(),
            supported_formats: Vec::new(),
            isolation: Isolation::None,
            uses_streaming: false,
            minimum_supported_version: Version::new(5, 5, 0),
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn param(mut self, param: ActionParameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn supports(mut self, types: &[JobType]) -> Self {
        self.supported_types = types.to_vec();
        self
    }

    pub fn formats(mut self, formats: &[&str]) -> Self {
        self.supported_formats = formats.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.uses_streaming = true;
        self
    }

    pub fn min_version(mut self, version: Version) -> Self {
        self.minimum_supported_version = version;
        self
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ActionParameter> {
        self.params.iter().filter(|p| p.required)
    }

    pub fn supports_type(&self, job_type: JobType) -> bool {
        self.supported_types.contains(&job_type)
    }
}

/// A named integration that performs one kind of delivery.
#[async_trait]
pub trait Connector: Send + Sync {
    fn spec(&self) -> &ConnectorSpec;

    fn name(&self) -> &str {
        &self.spec().name
    }

    async fn execute(&self, job: &Job) -> anyhow::Result<ActionResponse>;

    /// Entry point used by extended workers. Connectors that can accept a
    /// job early reply through `responder` and return the final outcome.
    async fn execute_extended(
        &self,
        job: &Job,
        responder: Responder,
    ) -> anyhow::Result<ActionResponse> {
        drop(responder);
        self.execute(job).await
    }

    fn has_form(&self) -> bool {
        false
    }

    async fn form(&self, _job: &Job) -> anyhow::Result<ActionForm> {
        anyhow::bail!("No form defined for action: {}", self.name())
    }
}

pub trait RouteBuilder {
    fn action_url(&self, name: &str) -> String;
    fn form_url(&self, name: &str) -> String;
}

/// Public JSON description of a connector as listed by the hub.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectorDescriptor {
    pub name: String,
    pub label: String,
    pub description: String,
    pub url: String,
    pub form_url: Option<String>,
    pub params: Vec<ActionParameter>,
    pub supported_action_types: Vec<JobType>,
    pub supported_formats: Vec<String>,
    pub supported_download_settings: Vec<DownloadSetting>,
    pub uses_streaming: bool,
    pub minimum_supported_version: String,
}

pub fn describe(connector: &dyn Connector, routes: &dyn RouteBuilder) -> ConnectorDescriptor {
    let spec = connector.spec();
    ConnectorDescriptor {
        name: spec.name.clone(),
        label: spec.label.clone(),
        description: spec.description.clone(),
        url: routes.action_url(&spec.name),
        form_url: connector.has_form().then(|| routes.form_url(&spec.name)),
        params: spec.params.clone(),
        supported_action_types: spec.supported_types.clone(),
        supported_formats: spec.supported_formats.clone(),
        supported_download_settings: if spec.uses_streaming {
            vec![DownloadSetting::Url]
        } else {
            vec![DownloadSetting::Push]
        },
        uses_streaming: spec.uses_streaming,
        minimum_supported_version: spec.minimum_supported_version.to_string(),
    }
}
