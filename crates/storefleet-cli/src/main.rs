mod cmd;
mod context;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, store::StoreSubcommand};
use context::Overrides;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "storefleet",
    about = "Provision isolated storefront instances on Kubernetes",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./storefleet.yaml)
    #[arg(long, global = true, env = "STOREFLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Registry database path (overrides registry_path)
    #[arg(long, global = true, env = "STOREFLEET_DB")]
    db: Option<PathBuf>,

    /// Helm values file (overrides values_file)
    #[arg(long, global = true, env = "STOREFLEET_VALUES")]
    values: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, inspect, refresh, and delete stores
    Store {
        #[command(subcommand)]
        subcommand: StoreSubcommand,
    },

    /// Serve the HTTP API
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,
    },

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let overrides = Overrides {
        config: cli.config,
        db: cli.db,
        values: cli.values,
    };

    let result = match cli.command {
        Commands::Store { subcommand } => cmd::store::run(&overrides, subcommand, cli.json),
        Commands::Serve { port } => cmd::serve::run(&overrides, port),
        Commands::Config { subcommand } => cmd::config::run(&overrides, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
