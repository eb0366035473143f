//! courier CLI: administer a messaging store and run demo scenarios. Config from env (and `.env`).

use anyhow::{Context, Result};
use clap::Parser;
use courier::{CourierConfig, MessagingService};
use courier_cli::{run, Cli, Commands};
use courier_core::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = CourierConfig::load()?;
    if let Some(database) = cli.database.clone() {
        config.database_url = database;
    }

    init_tracing(&config.log_file).context("Initialise logging")?;
    info!(database_url = %config.database_url, "courier starting");

    let mut stdout = std::io::stdout().lock();
    if let Commands::Demo { scenario } = cli.command {
        return courier_cli::demo::run(scenario, &mut stdout).await;
    }

    let service = MessagingService::connect(&config)
        .await
        .with_context(|| format!("Open store at {}", config.database_url))?;
    run(&service, cli.command, &mut stdout).await
}
