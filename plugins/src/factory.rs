use std::sync::Arc;
use std::time::Duration;

use action_hub_core::api::{
    Dispatcher, ExecuteScheduler, ExtendedScheduler, HubConfig, Registry, WorkerLauncher,
};
use anyhow::Result;

use crate::connectors::{AudienceUploadConnector, DebugConnector, WebhookConnector};
use crate::http::{request_client, streaming_client};
use crate::runner::ProcessWorkerLauncher;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Every built-in connector, filtered by the configured whitelist.
pub fn build_registry(cfg: &HubConfig) -> Result<Registry> {
    let request = request_client(REQUEST_TIMEOUT)?;
    let download = streaming_client()?;

    let mut registry = Registry::new().with_whitelist(cfg.action_whitelist.clone());
    registry.register(Arc::new(DebugConnector::new()));
    registry.register(Arc::new(WebhookConnector::new(request.clone())));
    registry.register(Arc::new(AudienceUploadConnector::new(
        download,
        request,
        cfg.ingest.clone(),
    )));
    Ok(registry)
}

pub fn build_launcher() -> Result<Arc<dyn WorkerLauncher>> {
    Ok(Arc::new(ProcessWorkerLauncher::current_exe()?))
}

pub fn build_dispatcher(
    cfg: &HubConfig,
    registry: Arc<Registry>,
    launcher: Arc<dyn WorkerLauncher>,
) -> Dispatcher {
    if !cfg.scheduler.isolation_enabled {
        tracing::warn!("worker isolation disabled; every connector runs in-process");
        return Dispatcher::new(registry);
    }

    let standard = ExecuteScheduler::from_config(Arc::clone(&launcher), &cfg.scheduler.execute);
    let extended = ExtendedScheduler::from_config(launcher, &cfg.scheduler.extended);
    Dispatcher::new(registry).with_schedulers(Arc::new(standard), Arc::new(extended))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_builtins() {
        let registry = build_registry(&HubConfig::default()).unwrap();
        let names: Vec<String> = registry
            .all(None)
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["debug", "webhook", "audience_upload"]);
    }

    #[test]
    fn whitelist_limits_registry() {
        let mut cfg = HubConfig::default();
        cfg.action_whitelist = vec!["webhook".to_string()];
        let registry = build_registry(&cfg).unwrap();
        assert!(registry.resolve("webhook", None).is_ok());
        assert!(registry.resolve("debug", None).is_err());
    }

    #[test]
    fn disabled_isolation_builds_in_process_dispatcher() {
        let mut cfg = HubConfig::default();
        cfg.scheduler.isolation_enabled = false;
        let registry = Arc::new(build_registry(&cfg).unwrap());
        let launcher: Arc<dyn WorkerLauncher> =
            Arc::new(ProcessWorkerLauncher::new("true", Vec::new()));
        let dispatcher = build_dispatcher(&cfg, Arc::clone(&registry), Arc::clone(&launcher));
        assert!(!dispatcher.isolation_enabled());

        cfg.scheduler.isolation_enabled = true;
        assert!(build_dispatcher(&cfg, registry, launcher).isolation_enabled());
    }
}
