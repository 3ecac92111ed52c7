use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use debtmarket_core::{DeploymentConfig, OrderRole};
use tracing::info;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "debtmarket", version, about = "DebtMarket order tooling and settlement demo")]
struct Cli {
    /// Deployment config (JSON). Defaults to the built-in devnet deployment.
    #[arg(long, global = true, env = "DEBTMARKET_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a signing key and print its address
    Keygen {
        /// Derive the key from this 32-byte hex seed instead of the OS RNG
        #[arg(long)]
        seed: Option<String>,
    },

    /// Write an unsigned order template for this deployment
    NewOrder(commands::order::NewOrderArgs),

    /// Print the agreement id and signing hashes of an order file
    HashOrder {
        /// Order or signed order (JSON)
        #[arg(long)]
        order: PathBuf,
    },

    /// Add one party's signature to an order file
    SignOrder {
        /// Order or signed order (JSON)
        #[arg(long)]
        order: PathBuf,
        /// Role to sign as: debtor, creditor or underwriter
        #[arg(long)]
        role: OrderRole,
        /// Hex-encoded 32-byte signing secret
        #[arg(long, env = "DEBTMARKET_SECRET", hide_env_values = true)]
        secret: String,
        /// Write the signed order here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run the reference settlement scenario against an in-process deployment
    Demo {
        /// Print the full event ledger as JSON at the end
        #[arg(long, default_value_t = false)]
        ledger: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<DeploymentConfig> {
    match path {
        Some(path) => DeploymentConfig::from_json_file(path)
            .with_context(|| format!("loading deployment config {}", path.display())),
        None => Ok(DeploymentConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "debtmarket=info,info".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    info!(
        owner = %config.owner,
        terms_contracts = config.terms_contracts.len(),
        "deployment config loaded"
    );

    match cli.command {
        Commands::Keygen { seed } => commands::keys::keygen(seed.as_deref()),
        Commands::NewOrder(args) => commands::order::new_order(&config, &args),
        Commands::HashOrder { order } => commands::order::hash_order(&config, &order),
        Commands::SignOrder {
            order,
            role,
            secret,
            out,
        } => commands::order::sign_order(&config, &order, role, &secret, out.as_deref()),
        Commands::Demo { ledger } => commands::demo::run(&config, ledger),
    }
}
