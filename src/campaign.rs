use ethers::types::Address;
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path};

use crate::amount::Amount;
use crate::error::{KpiError, Result};
use crate::metrics::{record_settlement, record_settlement_error};
use crate::rewards::{
    guaranteed_rewards, maximum_rewards, recoverable_rewards, redeemable_rewards,
};
use crate::types::{HolderPosition, OracleResult, RewardDefinition};

/// On-chain state of a KPI token as seen by one holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiTokenSnapshot {
    pub address: Address,
    pub chain_id: u64,
    pub rewards: Vec<RewardDefinition>,
    pub oracles: Vec<OracleResult>,
    pub position: HolderPosition,
    pub reward_balances: Vec<Amount>, // KPI token's own balance of each reward
    pub expiration: u64, // Unix timestamp (seconds)
    pub finalized: bool,
    #[serde(default)]
    pub jit_funding: bool,
}

impl KpiTokenSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading KPI token snapshot from {}", path.display());
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Fails when the snapshot was taken on another chain than `chain_id`
    pub fn ensure_chain(&self, chain_id: u64) -> Result<()> {
        if self.chain_id != chain_id {
            return Err(KpiError::ChainMismatch {
                expected: chain_id,
                actual: self.chain_id,
            });
        }
        Ok(())
    }

    /// Mirrors the contract's `expired()` view
    pub fn is_expired(&self, now: u64) -> bool {
        !self.finalized && now >= self.expiration
    }

    pub fn validate(&self) -> Result<()> {
        if self.rewards.len() != self.reward_balances.len() {
            return Err(KpiError::InconsistentInput(format!(
                "{} rewards but {} reward balances",
                self.rewards.len(),
                self.reward_balances.len()
            )));
        }
        for reward in &self.rewards {
            reward.check()?;
            if reward.currency.chain_id != self.chain_id {
                return Err(KpiError::InconsistentInput(format!(
                    "reward {} is on chain {}, KPI token on chain {}",
                    reward.currency.symbol, reward.currency.chain_id, self.chain_id
                )));
            }
        }
        for oracle in &self.oracles {
            oracle.full_range()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub guaranteed: Vec<Amount>,
    pub maximum: Vec<Amount>,
    pub redeemable: Vec<Amount>,
    pub recoverable: Vec<Amount>,
    pub expired: bool,
}

/// Run every settlement computation against a snapshot at time `now`.
pub fn settle(snapshot: &KpiTokenSnapshot, now: u64) -> Result<SettlementReport> {
    let result = compute_report(snapshot, now);
    match &result {
        Ok(report) => {
            debug!("Settlement for {:?}: {:?}", snapshot.address, report);
            record_settlement(snapshot.address, report);
        }
        Err(e) => record_settlement_error(error_kind(e)),
    }
    result
}

fn compute_report(snapshot: &KpiTokenSnapshot, now: u64) -> Result<SettlementReport> {
    snapshot.validate()?;
    let expired = snapshot.is_expired(now);

    Ok(SettlementReport {
        guaranteed: guaranteed_rewards(&snapshot.position, &snapshot.rewards)?,
        maximum: maximum_rewards(&snapshot.position, &snapshot.rewards)?,
        redeemable: redeemable_rewards(
            &snapshot.oracles,
            &snapshot.position,
            &snapshot.rewards,
            expired,
        )?,
        recoverable: recoverable_rewards(
            &snapshot.rewards,
            &snapshot.reward_balances,
            expired,
            snapshot.jit_funding,
        )?,
        expired,
    })
}

fn error_kind(error: &KpiError) -> &'static str {
    match error {
        KpiError::InvalidSupply => "invalid_supply",
        KpiError::InconsistentInput(_) => "inconsistent_input",
        KpiError::Overflow => "overflow",
        KpiError::DivisionByZero => "division_by_zero",
        _ => "other",
    }
}

impl fmt::Display for SettlementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let section = |amounts: &[Amount]| {
            if amounts.is_empty() {
                "-".to_string()
            } else {
                amounts.iter().join(", ")
            }
        };
        writeln!(f, "expired:     {}", self.expired)?;
        writeln!(f, "guaranteed:  {}", section(&self.guaranteed))?;
        writeln!(f, "maximum:     {}", section(&self.maximum))?;
        writeln!(f, "redeemable:  {}", section(&self.redeemable))?;
        write!(f, "recoverable: {}", section(&self.recoverable))
    }
}
