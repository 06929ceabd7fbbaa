use std::sync::Arc;
use std::time::Instant;

use super::{ActionForm, ActionResponse, Connector, ConnectorSpec, Isolation, Job, Registry};
use crate::error::HubError;
use crate::scheduler::{TaskScheduler, WorkerRequest};

/// Resolves connectors, validates jobs and routes them either in-process or
/// to the scheduler matching the connector's isolation.
pub struct Dispatcher {
    registry: Arc<Registry>,
    standard: Option<Arc<dyn TaskScheduler>>,
    extended: Option<Arc<dyn TaskScheduler>>,
}

impl Dispatcher {
    /// Dispatcher without schedulers; every connector runs in-process.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            standard: None,
            extended: None,
        }
    }

    pub fn with_schedulers(
        mut self,
        standard: Arc<dyn TaskScheduler>,
        extended: Arc<dyn TaskScheduler>,
    ) -> Self {
        self.standard = Some(standard);
        self.extended = Some(extended);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn isolation_enabled(&self) -> bool {
        self.standard.is_some() || self.extended.is_some()
    }

    /// Request-shape checks, in order: type present, type supported,
    /// required params present, streaming payload present.
    pub fn validate(spec: &ConnectorSpec, job: &Job) -> Result<(), HubError> {
        let job_type = match (job.job_type, job.unrecognized_type.as_deref()) {
            (Some(job_type), _) => job_type,
            (None, Some(raw)) => return Err(unsupported_type(spec, raw)),
            (None, None) => {
                return Err(HubError::Validation("No request type specified.".to_string()))
            }
        };

        if !spec.supports_type(job_type) {
            return Err(unsupported_type(spec, job_type.as_str()));
        }

        if let Some(missing) = spec.required_params().find(|p| job.param(&p.name).is_none()) {
            return Err(HubError::MissingParameter(missing.name.clone()));
        }

        if spec.uses_streaming && !job.has_payload() {
            return Err(HubError::IncompatiblePayload);
        }

        Ok(())
    }

    pub async fn dispatch(
        &self,
        connector: Arc<dyn Connector>,
        job: Job,
    ) -> Result<ActionResponse, HubError> {
        Self::validate(connector.spec(), &job)?;

        let scheduler = match connector.spec().isolation {
            Isolation::None => None,
            Isolation::Standard => self.standard.as_ref(),
            Isolation::Extended => self.extended.as_ref(),
        };

        match scheduler {
            Some(scheduler) => {
                tracing::debug!(
                    connector = %connector.name(),
                    variant = %scheduler.variant(),
                    webhook_id = %job.correlation_id(),
                    "submitting job to worker queue"
                );
                let request = WorkerRequest {
                    connector: connector.name().to_string(),
                    job,
                };
                Ok(scheduler.submit(request).await?)
            }
            None => Self::run_in_process(connector.as_ref(), &job).await,
        }
    }

    /// Resolve, validate and run one job. Every failure is folded into the
    /// returned response.
    pub async fn execute(&self, name: &str, job: Job) -> ActionResponse {
        let webhook_id = job.webhook_id.clone();
        let correlation = job.correlation_id().to_string();
        let started = Instant::now();

        let result = match self.registry.resolve(name, job.client_semver().as_ref()) {
            Ok(connector) => self.dispatch(connector, job).await,
            Err(e) => Err(e),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match result {
            Ok(response) => {
                tracing::info!(
                    action = %name,
                    webhook_id = %correlation,
                    success = response.success,
                    elapsed_ms,
                    "action executed"
                );
                response
            }
            Err(err) if err.is_request_error() => {
                tracing::warn!(action = %name, webhook_id = %correlation, error = %err, "action rejected");
                ActionResponse::from_error(&err)
            }
            Err(err) => {
                tracing::error!(
                    action = %name,
                    webhook_id = %correlation,
                    code = %err.error_code(),
                    error = %err,
                    elapsed_ms,
                    "action failed"
                );
                ActionResponse::from_error(&err)
            }
        };
        response.with_webhook_id(webhook_id)
    }

    pub async fn form(&self, name: &str, job: &Job) -> Result<ActionForm, HubError> {
        let connector = self.registry.resolve(name, job.client_semver().as_ref())?;
        if !connector.has_form() {
            return Err(HubError::NoForm(name.to_string()));
        }
        connector.form(job).await.map_err(HubError::Connector)
    }

    pub async fn run_in_process(
        connector: &dyn Connector,
        job: &Job,
    ) -> Result<ActionResponse, HubError> {
        connector.execute(job).await.map_err(HubError::Connector)
    }
}

fn unsupported_type(spec: &ConnectorSpec, requested: &str) -> HubError {
    let supported = spec
        .supported_types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    HubError::UnsupportedType {
        job_type: requested.to_string(),
        supported,
    }
}
