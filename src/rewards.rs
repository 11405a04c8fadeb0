//! Client-side replica of the KPI token settlement arithmetic.
//!
//! All amounts are integers in the smallest unit of their currency and every
//! division truncates, so results match what the settlement contract pays out.

use ethers::types::{U256, U512};
use log::debug;

use crate::amount::{mul_div, Amount};
use crate::error::{KpiError, Result};
use crate::types::{HolderPosition, OracleResult, RewardDefinition};

/// Fixed point shift applied to the weighted deduction (2^64)
pub const MULTIPLIER_SHIFT: usize = 64;

/// Share of the minimum payouts owned by the holder.
pub fn guaranteed_rewards(
    position: &HolderPosition,
    rewards: &[RewardDefinition],
) -> Result<Vec<Amount>> {
    if position.initial_supply.is_zero() {
        return Err(KpiError::InvalidSupply);
    }
    rewards
        .iter()
        .map(|reward| {
            reward.check()?;
            Amount::new(reward.currency.clone(), reward.minimum_payout)
                .mul_div(position.balance, position.initial_supply)
        })
        .collect()
}

/// Share of the full reward amounts owned by the holder, i.e. the payout if
/// every oracle reaches its higher bound.
pub fn maximum_rewards(
    position: &HolderPosition,
    rewards: &[RewardDefinition],
) -> Result<Vec<Amount>> {
    rewards
        .iter()
        .map(|reward| {
            reward.check()?;
            let total = Amount::new(reward.currency.clone(), reward.total_amount);
            if position.current_supply.is_zero() {
                Ok(total)
            } else {
                total.mul_div(position.balance, position.current_supply)
            }
        })
        .collect()
}

/// What the holder can redeem once every oracle has finalized.
pub fn redeemable_rewards(
    oracles: &[OracleResult],
    position: &HolderPosition,
    rewards: &[RewardDefinition],
    expired: bool,
) -> Result<Vec<Amount>> {
    if position.balance.is_zero() || oracles.iter().any(|oracle| !oracle.finalized) {
        return Ok(rewards
            .iter()
            .map(|reward| Amount::zero(reward.currency.clone()))
            .collect());
    }
    if expired {
        return guaranteed_rewards(position, rewards);
    }

    let remaining = remaining_rewards(oracles, rewards)?;
    if position.current_supply.is_zero() {
        return Err(KpiError::InvalidSupply);
    }
    remaining
        .into_iter()
        .map(|amount| amount.mul_div(position.balance, position.current_supply))
        .collect()
}

/// Reward amounts left in the campaign after applying every oracle's
/// deduction, in oracle order.
pub fn remaining_rewards(
    oracles: &[OracleResult],
    rewards: &[RewardDefinition],
) -> Result<Vec<Amount>> {
    let total_weight = oracles
        .iter()
        .try_fold(U256::zero(), |acc, oracle| acc.checked_add(oracle.weight))
        .ok_or(KpiError::Overflow)?;

    let mut remaining = rewards
        .iter()
        .map(|reward| {
            reward.check()?;
            Ok(reward.total_amount)
        })
        .collect::<Result<Vec<U256>>>()?;

    for (index, oracle) in oracles.iter().enumerate() {
        let range = oracle.full_range()?;
        let progress = oracle.final_progress()?;
        if progress >= range {
            continue;
        }
        if total_weight.is_zero() {
            return Err(KpiError::InconsistentInput(
                "oracle weights sum to zero".to_string(),
            ));
        }

        let shortfall = range - progress;
        for (amount, reward) in remaining.iter_mut().zip(rewards) {
            let deduction = weighted_deduction(
                *amount - reward.minimum_payout,
                oracle.weight,
                shortfall,
                range,
                total_weight,
            )?;
            debug!(
                "Oracle #{} deducts {} from {} reward ({} left before deduction)",
                index, deduction, reward.currency.symbol, amount
            );
            *amount -= deduction;
        }
    }

    Ok(rewards
        .iter()
        .zip(remaining)
        .map(|(reward, raw)| Amount::new(reward.currency.clone(), raw))
        .collect())
}

/// `((above_minimum * weight * shortfall) << 64) / (range * total_weight) >> 64`
fn weighted_deduction(
    above_minimum: U256,
    weight: U256,
    shortfall: U256,
    range: U256,
    total_weight: U256,
) -> Result<U256> {
    let numerator = above_minimum
        .full_mul(weight)
        .checked_mul(U512::from(shortfall))
        .and_then(|n| n.checked_mul(U512::one() << MULTIPLIER_SHIFT))
        .ok_or(KpiError::Overflow)?;
    let denominator = range.full_mul(total_weight);

    let deduction = (numerator / denominator) >> MULTIPLIER_SHIFT;
    U256::try_from(deduction).map_err(|_| KpiError::Overflow)
}

/// What the campaign creator can take back from the KPI token contract.
///
/// `reward_balances` are the on-chain balances the KPI token holds, one per
/// reward and in the same order.
pub fn recoverable_rewards(
    rewards: &[RewardDefinition],
    reward_balances: &[Amount],
    expired: bool,
    jit_funding: bool,
) -> Result<Vec<Amount>> {
    if rewards.len() != reward_balances.len() {
        return Err(KpiError::InconsistentInput(format!(
            "{} rewards but {} balances",
            rewards.len(),
            reward_balances.len()
        )));
    }
    for (reward, balance) in rewards.iter().zip(reward_balances) {
        if balance.currency != reward.currency {
            return Err(KpiError::InconsistentInput(format!(
                "balance in {} for a {} reward",
                balance.currency.symbol, reward.currency.symbol
            )));
        }
    }
    if jit_funding {
        return Ok(reward_balances.to_vec());
    }

    let mut recoverable = Vec::with_capacity(rewards.len());
    for (reward, balance) in rewards.iter().zip(reward_balances) {
        reward.check()?;
        let locked = if expired {
            reward.minimum_payout
        } else {
            reward.total_amount
        };
        let locked = Amount::new(reward.currency.clone(), locked);
        if let Some(leftover) = balance.checked_sub(&locked)? {
            if !leftover.is_zero() {
                recoverable.push(leftover);
            }
        }
    }
    Ok(recoverable)
}

/// Redeemed share of the maximum payout in basis points
pub fn redeemable_ratio_bps(redeemable: &[Amount], maximum: &[Amount]) -> Option<u64> {
    let (redeemed, max) = redeemable
        .iter()
        .zip(maximum)
        .try_fold((U256::zero(), U256::zero()), |(r, m), (a, b)| {
            Some((r.checked_add(a.raw)?, m.checked_add(b.raw)?))
        })?;
    if max.is_zero() {
        return None;
    }
    mul_div(redeemed, U256::from(10_000), max)
        .ok()
        .map(|bps| bps.low_u64())
}
