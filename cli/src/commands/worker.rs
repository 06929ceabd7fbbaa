use action_hub_core::api::{run_worker, CliError, HubConfig, Variant};
use action_hub_plugins::factory;
use tokio::io::BufReader;

use super::cli::WorkerArgs;

/// Child side of an isolated task: one request on stdin, protocol messages on
/// stdout, logs on stderr.
pub async fn handle_worker(args: WorkerArgs, cfg: HubConfig) -> Result<(), CliError> {
    let variant = Variant::from(args.variant);
    let registry = factory::build_registry(&cfg)?;
    tracing::debug!(
        variant = %variant,
        webhook_id = %std::env::var("ACTION_HUB_WEBHOOK_ID").unwrap_or_default(),
        pid = std::process::id(),
        "worker started"
    );

    let input = BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();
    run_worker(&registry, variant, input, output)
        .await
        .map_err(|e| CliError::Worker(format!("{e:#}")))
}
