use std::sync::Arc;

use action_hub_core::api::{CliError, HubConfig};
use action_hub_plugins::factory;

use super::cli::ServeArgs;
use crate::http::{start_server, AppState, ListenConfig};

pub async fn handle_serve(args: ServeArgs, mut cfg: HubConfig) -> Result<(), CliError> {
    if let Some(host) = args.host {
        cfg.server.host = host;
    }
    if let Some(port) = args.port {
        cfg.server.port = port;
    }
    cfg.validate_for_serve()?;
    if cfg.server.base_url.is_empty() {
        tracing::warn!("server.base_url is not set; connector urls will be relative");
    }

    let registry = Arc::new(factory::build_registry(&cfg)?);
    let launcher = factory::build_launcher()?;
    let dispatcher = factory::build_dispatcher(&cfg, Arc::clone(&registry), launcher);

    tracing::info!(
        connectors = registry.len(),
        isolation = dispatcher.isolation_enabled(),
        execute_concurrency = cfg.scheduler.execute.concurrency,
        extended_concurrency = cfg.scheduler.extended.concurrency,
        extended_max_workers = cfg.scheduler.extended.max_workers,
        "starting action hub"
    );

    let listen = ListenConfig {
        host: cfg.server.host.clone(),
        port: cfg.server.port,
    };
    start_server(listen, AppState::new(cfg, dispatcher)).await
}
