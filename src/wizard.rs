//! Campaign creation draft.
//!
//! The creation flow is a sequence of steps driven by [`reduce`], which takes
//! the current draft and an [`Action`] and returns the next draft. Nothing
//! outside the draft value is mutated.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{KpiError, Result};
use crate::types::{RewardDefinition, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    General,
    Rewards,
    Oracles,
    Deploy,
    Deployed,
}

impl Step {
    fn next(self) -> Option<Step> {
        match self {
            Step::General => Some(Step::Rewards),
            Step::Rewards => Some(Step::Oracles),
            Step::Oracles => Some(Step::Deploy),
            Step::Deploy | Step::Deployed => None,
        }
    }

    fn previous(self) -> Option<Step> {
        match self {
            Step::Rewards => Some(Step::General),
            Step::Oracles => Some(Step::Rewards),
            Step::Deploy => Some(Step::Oracles),
            Step::General | Step::Deployed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralData {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub expiration: u64, // Unix timestamp (seconds)
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDraft {
    pub token: Token,
    pub amount: U256,
    pub minimum_payout: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleDraft {
    pub template_id: u64,
    pub lower_bound: U256,
    pub higher_bound: U256,
    pub weight: U256,
}

#[derive(Debug, Clone)]
pub enum Action {
    SetGeneral(GeneralData),
    AddReward(RewardDraft),
    RemoveReward(usize),
    AddOracle(OracleDraft),
    RemoveOracle(usize),
    Next,
    Back,
    AllowanceUpdated { token: Address, allowance: U256 },
    Deployed { address: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationDraft {
    pub chain_id: u64,
    pub step: Step,
    pub general: Option<GeneralData>,
    pub rewards: Vec<RewardDraft>,
    pub oracles: Vec<OracleDraft>,
    pub allowances: HashMap<Address, U256>,
    pub deployed: Option<Address>,
}

impl CreationDraft {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            step: Step::General,
            general: None,
            rewards: Vec::new(),
            oracles: Vec::new(),
            allowances: HashMap::new(),
            deployed: None,
        }
    }

    /// Rewards as they will be locked in the KPI token
    pub fn reward_definitions(&self) -> Result<Vec<RewardDefinition>> {
        self.rewards
            .iter()
            .map(|r| RewardDefinition::new(r.token.clone(), r.amount, r.minimum_payout))
            .collect()
    }

    fn ensure_step(&self, expected: Step) -> Result<()> {
        if self.step != expected {
            return Err(KpiError::InvalidDraft(format!(
                "action requires step {:?}, draft is at {:?}",
                expected, self.step
            )));
        }
        Ok(())
    }

    fn validate_step(&self) -> Result<()> {
        match self.step {
            Step::General => {
                if self.general.is_none() {
                    return Err(KpiError::InvalidDraft("general data missing".to_string()));
                }
            }
            Step::Rewards => {
                if self.rewards.is_empty() {
                    return Err(KpiError::InvalidDraft("at least one reward required".to_string()));
                }
            }
            Step::Oracles => {
                if self.oracles.is_empty() {
                    return Err(KpiError::InvalidDraft("at least one oracle required".to_string()));
                }
            }
            Step::Deploy | Step::Deployed => {}
        }
        Ok(())
    }
}

/// Rewards whose allowance does not cover the amount to lock yet. Approvals
/// are submitted one at a time, in reward order, before deployment.
pub fn required_approvals(draft: &CreationDraft) -> Vec<&RewardDraft> {
    draft
        .rewards
        .iter()
        .filter(|reward| {
            let allowance = draft
                .allowances
                .get(&reward.token.address)
                .copied()
                .unwrap_or_default();
            allowance < reward.amount
        })
        .collect()
}

pub fn reduce(mut draft: CreationDraft, action: Action) -> Result<CreationDraft> {
    match action {
        Action::SetGeneral(general) => {
            draft.ensure_step(Step::General)?;
            validate_general(&general)?;
            draft.general = Some(general);
        }
        Action::AddReward(reward) => {
            draft.ensure_step(Step::Rewards)?;
            validate_reward(&draft, &reward)?;
            draft.rewards.push(reward);
        }
        Action::RemoveReward(index) => {
            draft.ensure_step(Step::Rewards)?;
            if index >= draft.rewards.len() {
                return Err(KpiError::InvalidDraft(format!("no reward at index {}", index)));
            }
            let removed = draft.rewards.remove(index);
            draft.allowances.remove(&removed.token.address);
        }
        Action::AddOracle(oracle) => {
            draft.ensure_step(Step::Oracles)?;
            validate_oracle(&oracle)?;
            draft.oracles.push(oracle);
        }
        Action::RemoveOracle(index) => {
            draft.ensure_step(Step::Oracles)?;
            if index >= draft.oracles.len() {
                return Err(KpiError::InvalidDraft(format!("no oracle at index {}", index)));
            }
            draft.oracles.remove(index);
        }
        Action::Next => {
            draft.validate_step()?;
            draft.step = draft
                .step
                .next()
                .ok_or_else(|| KpiError::InvalidDraft(format!("no step after {:?}", draft.step)))?;
        }
        Action::Back => {
            draft.step = draft
                .step
                .previous()
                .ok_or_else(|| KpiError::InvalidDraft(format!("no step before {:?}", draft.step)))?;
        }
        Action::AllowanceUpdated { token, allowance } => {
            draft.ensure_step(Step::Deploy)?;
            if !draft.rewards.iter().any(|r| r.token.address == token) {
                return Err(KpiError::InvalidDraft(format!("{:?} is not a reward token", token)));
            }
            draft.allowances.insert(token, allowance);
        }
        Action::Deployed { address } => {
            draft.ensure_step(Step::Deploy)?;
            if let Some(missing) = required_approvals(&draft).first() {
                return Err(KpiError::InvalidDraft(format!(
                    "{} allowance does not cover the reward amount",
                    missing.token.symbol
                )));
            }
            draft.deployed = Some(address);
            draft.step = Step::Deployed;
        }
    }
    Ok(draft)
}

fn validate_general(general: &GeneralData) -> Result<()> {
    if general.title.trim().is_empty() {
        return Err(KpiError::InvalidDraft("title is empty".to_string()));
    }
    if general.description.trim().is_empty() {
        return Err(KpiError::InvalidDraft("description is empty".to_string()));
    }
    if general.expiration <= general.created_at {
        return Err(KpiError::InvalidDraft("expiration must be in the future".to_string()));
    }
    Ok(())
}

fn validate_reward(draft: &CreationDraft, reward: &RewardDraft) -> Result<()> {
    if reward.token.chain_id != draft.chain_id {
        return Err(KpiError::InvalidDraft(format!(
            "{} is on chain {}, campaign on chain {}",
            reward.token.symbol, reward.token.chain_id, draft.chain_id
        )));
    }
    if reward.amount.is_zero() {
        return Err(KpiError::InvalidDraft("reward amount is zero".to_string()));
    }
    if reward.minimum_payout > reward.amount {
        return Err(KpiError::InvalidDraft(
            "minimum payout exceeds reward amount".to_string(),
        ));
    }
    if draft.rewards.iter().any(|r| r.token.address == reward.token.address) {
        return Err(KpiError::InvalidDraft(format!(
            "{} already used as reward",
            reward.token.symbol
        )));
    }
    Ok(())
}

fn validate_oracle(oracle: &OracleDraft) -> Result<()> {
    if oracle.lower_bound >= oracle.higher_bound {
        return Err(KpiError::InvalidDraft(
            "oracle lower bound must be below higher bound".to_string(),
        ));
    }
    if oracle.weight.is_zero() {
        return Err(KpiError::InvalidDraft("oracle weight is zero".to_string()));
    }
    Ok(())
}
