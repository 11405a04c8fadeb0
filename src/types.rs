use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{KpiError, Result};

/// ERC20 token metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

impl Token {
    pub fn new(chain_id: u64, address: Address, decimals: u8, symbol: &str) -> Self {
        Self {
            chain_id,
            address,
            decimals,
            symbol: symbol.to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?} on chain {})", self.symbol, self.address, self.chain_id)
    }
}

/// A reward (collateral) locked in a KPI token campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDefinition {
    pub currency: Token,
    pub total_amount: U256, // Smallest unit
    pub minimum_payout: U256, // Always paid out, even on failure
}

impl RewardDefinition {
    pub fn new(currency: Token, total_amount: U256, minimum_payout: U256) -> Result<Self> {
        let reward = Self {
            currency,
            total_amount,
            minimum_payout,
        };
        reward.check()?;
        Ok(reward)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.minimum_payout > self.total_amount {
            return Err(KpiError::InconsistentInput(format!(
                "minimum payout {} exceeds total amount {} for {}",
                self.minimum_payout, self.total_amount, self.currency.symbol
            )));
        }
        Ok(())
    }
}

/// Finalized (or pending) result of a KPI oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResult {
    pub lower_bound: U256,
    pub higher_bound: U256,
    pub final_result: U256,
    pub weight: U256,
    pub finalized: bool,
}

impl OracleResult {
    pub fn full_range(&self) -> Result<U256> {
        self.higher_bound.checked_sub(self.lower_bound).ok_or_else(|| {
            KpiError::InconsistentInput(format!(
                "oracle higher bound {} is below lower bound {}",
                self.higher_bound, self.lower_bound
            ))
        })
    }

    /// Progress towards the higher bound, with the final result clamped to the bounds
    pub fn final_progress(&self) -> Result<U256> {
        let range = self.full_range()?;
        Ok(if self.final_result >= self.higher_bound {
            range
        } else if self.final_result <= self.lower_bound {
            U256::zero()
        } else {
            self.final_result - self.lower_bound
        })
    }
}

/// A holder's claim on the KPI token supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HolderPosition {
    pub balance: U256,
    pub initial_supply: U256,
    pub current_supply: U256,
}

impl HolderPosition {
    /// Position of a holder when nothing has been burned yet
    pub fn new(balance: U256, supply: U256) -> Self {
        Self {
            balance,
            initial_supply: supply,
            current_supply: supply,
        }
    }
}
