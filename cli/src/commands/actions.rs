use action_hub_core::api::{describe, CliError, HubConfig, Isolation};
use action_hub_plugins::factory;

use super::cli::ActionsArgs;
use crate::http::HubRoutes;

pub fn handle_actions(args: ActionsArgs, cfg: &HubConfig) -> Result<(), CliError> {
    let registry = factory::build_registry(cfg)?;
    let version = match args.client_version.as_deref() {
        Some(raw) => Some(
            semver::Version::parse(raw)
                .map_err(|e| CliError::Command(format!("invalid --client-version: {e}")))?,
        ),
        None => None,
    };
    let routes = HubRoutes::new(&cfg.server.base_url);
    let connectors = registry.all(version.as_ref());

    if args.json {
        let descriptors: Vec<_> = connectors
            .iter()
            .map(|c| describe(c.as_ref(), &routes))
            .collect();
        let out = serde_json::to_string_pretty(&descriptors)
            .map_err(|e| CliError::Command(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    for connector in connectors {
        let spec = connector.spec();
        let isolation = match spec.isolation {
            Isolation::None => "in-process",
            Isolation::Standard => "standard",
            Isolation::Extended => "extended",
        };
        let types: Vec<&str> = spec.supported_types.iter().map(|t| t.as_str()).collect();
        println!(
            "{:<18} {:<11} {:<22} {}{}",
            spec.name,
            isolation,
            types.join(","),
            spec.label,
            if spec.uses_streaming { " (streaming)" } else { "" }
        );
    }
    Ok(())
}
