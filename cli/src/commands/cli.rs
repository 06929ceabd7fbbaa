use action_hub_core::api::Variant;
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantArg {
    Standard,
    Extended,
}

impl From<VariantArg> for Variant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Standard => Variant::Standard,
            VariantArg::Extended => Variant::Extended,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "action-hub", version, about = "Webhook-driven action dispatcher")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Overrides `server.host`.
    #[arg(long)]
    pub host: Option<String>,

    /// Overrides `server.port` (and `PORT`).
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ActionsArgs {
    /// Print connector descriptors as JSON.
    #[arg(long)]
    pub json: bool,

    /// Only show connectors visible to this client version.
    #[arg(long)]
    pub client_version: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct WorkerArgs {
    #[arg(long, value_enum, default_value_t = VariantArg::Standard)]
    pub variant: VariantArg,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// List registered connectors.
    Actions(ActionsArgs),
    /// Isolated worker entry point; reads one request on stdin.
    #[command(hide = true)]
    Worker(WorkerArgs),
}
