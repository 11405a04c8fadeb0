use anyhow::{Context, Result};
use colored::Colorize;
use ethers::providers::{Http, Provider};
use log::{error, info};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use kpi_settlement::{
    campaign::{settle, KpiTokenSnapshot},
    chain::ChainReader,
    config::AppConfig,
    utils::setup_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    dotenv::dotenv().ok();
    let mut config = AppConfig::from_env()?;
    setup_logger(config.level_filter())?;

    // A path given on the command line wins over KPI_SNAPSHOT_PATH
    if let Some(path) = std::env::args().nth(1) {
        config.snapshot_path = path;
    }

    let mut snapshot = KpiTokenSnapshot::load(&config.snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", config.snapshot_path))?;
    snapshot.ensure_chain(config.chain_id)?;

    if let (Some(rpc_url), Some(holder)) = (config.rpc_url.as_deref(), config.holder) {
        refresh_snapshot(&mut snapshot, rpc_url, holder, config.chain_id).await?;
    }

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    match settle(&snapshot, now) {
        Ok(report) => {
            println!("{} {:?}", "KPI token".bold(), snapshot.address);
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            error!("Settlement failed: {}", e);
            Err(e.into())
        }
    }
}

/// Replace holder position and reward balances with live chain data
async fn refresh_snapshot(
    snapshot: &mut KpiTokenSnapshot,
    rpc_url: &str,
    holder: ethers::types::Address,
    chain_id: u64,
) -> Result<()> {
    info!("Refreshing snapshot from {}", rpc_url);
    let provider = Provider::<Http>::try_from(rpc_url)?;
    let reader = ChainReader::new(Arc::new(provider));
    reader.ensure_chain_id(chain_id).await?;

    snapshot.position = reader
        .holder_position(snapshot.address, holder, snapshot.position.initial_supply)
        .await?;
    snapshot.reward_balances = reader
        .reward_balances(snapshot.address, &snapshot.rewards)
        .await?;
    Ok(())
}
