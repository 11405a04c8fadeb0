use anyhow::{anyhow, Context, Result};
use ethers::types::Address;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{env, str::FromStr};
use url::Url;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    // Network configuration
    #[validate(custom = "validate_rpc_url")]
    pub rpc_url: Option<String>,
    #[validate(range(min = 1))]
    pub chain_id: u64,

    // Settlement inputs
    #[validate(length(min = 1))]
    pub snapshot_path: String,
    pub holder: Option<Address>,

    #[validate(custom = "validate_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            chain_id: 1,
            snapshot_path: "snapshot.json".to_string(),
            holder: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from `KPI_*` environment variables (a `.env`
    /// file is loaded by the binary beforehand).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            rpc_url: env::var("KPI_RPC_URL").ok().filter(|url| !url.is_empty()),
            chain_id: match env::var("KPI_CHAIN_ID") {
                Ok(id) => id.parse().context("KPI_CHAIN_ID is not a number")?,
                Err(_) => defaults.chain_id,
            },
            snapshot_path: env::var("KPI_SNAPSHOT_PATH").unwrap_or(defaults.snapshot_path),
            holder: match env::var("KPI_HOLDER") {
                Ok(holder) => Some(
                    Address::from_str(&holder).context("KPI_HOLDER is not an address")?,
                ),
                Err(_) => None,
            },
            log_level: env::var("KPI_LOG_LEVEL").unwrap_or(defaults.log_level),
        };
        config.validate_all()?;
        Ok(config)
    }

    pub fn validate_all(&self) -> Result<()> {
        if let Err(e) = self.validate() {
            return Err(anyhow!("Configuration validation failed: {:?}", e));
        }
        validate_chain_id(self.chain_id)
            .map_err(|e| anyhow!("Unsupported chain id {}: {}", self.chain_id, e))?;
        if self.holder.is_some() && self.rpc_url.is_none() {
            return Err(anyhow!("KPI_HOLDER requires KPI_RPC_URL"));
        }
        Ok(())
    }

    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }
}

// Custom validators
fn validate_rpc_url(url: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(url).map_err(|_| ValidationError::new("invalid_rpc_url"))?;
    match parsed.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(()),
        _ => Err(ValidationError::new("invalid_rpc_url")),
    }
}

fn validate_chain_id(chain_id: u64) -> Result<(), ValidationError> {
    match chain_id {
        // Mainnets
        1 => Ok(()),        // Ethereum
        10 => Ok(()),       // Optimism
        100 => Ok(()),      // Gnosis
        137 => Ok(()),      // Polygon
        42161 => Ok(()),    // Arbitrum
        8453 => Ok(()),     // Base

        // Testnets
        11155111 => Ok(()), // Sepolia
        421614 => Ok(()),   // Arbitrum Sepolia
        84532 => Ok(()),    // Base Sepolia

        // Local node
        31337 => Ok(()),

        _ => Err(ValidationError::new("unsupported_chain")),
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    LevelFilter::from_str(level)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_log_level"))
}
