use ethers::{
    contract::abigen,
    providers::Middleware,
    types::{Address, U256},
};
use log::{debug, info};
use std::sync::Arc;

use crate::amount::Amount;
use crate::error::{KpiError, Result};
use crate::metrics::record_chain_read;
use crate::types::{HolderPosition, RewardDefinition};
use crate::wizard::{reduce, Action, CreationDraft};

abigen!(
    Erc20,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function totalSupply() external view returns (uint256)
        function allowance(address owner, address spender) external view returns (uint256)
    ]"#
);

/// Resolves on-chain ERC20 state into settlement inputs. Reads are issued
/// one after the other.
pub struct ChainReader<M> {
    client: Arc<M>,
}

impl<M: Middleware + 'static> ChainReader<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self { client }
    }

    pub async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        record_chain_read("balanceOf");
        Erc20::new(token, self.client.clone())
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| KpiError::Chain(format!("balanceOf({:?}) on {:?}: {}", owner, token, e)))
    }

    pub async fn total_supply(&self, token: Address) -> Result<U256> {
        record_chain_read("totalSupply");
        Erc20::new(token, self.client.clone())
            .total_supply()
            .call()
            .await
            .map_err(|e| KpiError::Chain(format!("totalSupply() on {:?}: {}", token, e)))
    }

    /// Fails unless the connected node serves `expected`
    pub async fn ensure_chain_id(&self, expected: u64) -> Result<()> {
        let actual = self
            .client
            .get_chainid()
            .await
            .map_err(|e| KpiError::Chain(format!("eth_chainId: {}", e)))?;
        if actual != U256::from(expected) {
            return Err(KpiError::ChainMismatch {
                expected,
                actual: actual.low_u64(),
            });
        }
        Ok(())
    }

    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256> {
        record_chain_read("allowance");
        Erc20::new(token, self.client.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| KpiError::Chain(format!("allowance() on {:?}: {}", token, e)))
    }

    /// Holder balance and current KPI token supply. The initial supply is
    /// not exposed by the ERC20 interface and comes from campaign data.
    pub async fn holder_position(
        &self,
        kpi_token: Address,
        holder: Address,
        initial_supply: U256,
    ) -> Result<HolderPosition> {
        let balance = self.balance_of(kpi_token, holder).await?;
        let current_supply = self.total_supply(kpi_token).await?;
        debug!(
            "Holder {:?} owns {} of {} {:?} tokens",
            holder, balance, current_supply, kpi_token
        );
        Ok(HolderPosition {
            balance,
            initial_supply,
            current_supply,
        })
    }

    /// Balance the KPI token holds of each reward currency, in reward order
    pub async fn reward_balances(
        &self,
        kpi_token: Address,
        rewards: &[RewardDefinition],
    ) -> Result<Vec<Amount>> {
        info!("Fetching {} reward balances for {:?}", rewards.len(), kpi_token);
        let mut balances = Vec::with_capacity(rewards.len());
        for reward in rewards {
            let raw = self.balance_of(reward.currency.address, kpi_token).await?;
            balances.push(Amount::new(reward.currency.clone(), raw));
        }
        Ok(balances)
    }

    /// Read the creator's allowance for every reward token of a draft at the
    /// deploy step and fold them into it, in reward order.
    pub async fn sync_allowances(
        &self,
        mut draft: CreationDraft,
        owner: Address,
        spender: Address,
    ) -> Result<CreationDraft> {
        let tokens: Vec<Address> = draft.rewards.iter().map(|r| r.token.address).collect();
        for token in tokens {
            let allowance = self.allowance(token, owner, spender).await?;
            draft = reduce(draft, Action::AllowanceUpdated { token, allowance })?;
        }
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Token;
    use crate::wizard::{required_approvals, GeneralData, OracleDraft, RewardDraft};
    use ethers::{
        abi::{encode, Token as AbiToken},
        providers::{MockProvider, Provider},
        types::Bytes,
    };

    fn encoded(value: u64) -> Bytes {
        Bytes::from(encode(&[AbiToken::Uint(U256::from(value))]))
    }

    /// Queue `eth_call` results in call order (the mock answers last-in first-out)
    fn queue(mock: &MockProvider, values: &[u64]) {
        for value in values.iter().rev() {
            mock.push::<Bytes, _>(encoded(*value)).unwrap();
        }
    }

    fn reward(byte: u8, symbol: &str, amount: u64) -> RewardDefinition {
        let token = Token::new(100, Address::repeat_byte(byte), 18, symbol);
        RewardDefinition::new(token, U256::from(amount), U256::zero()).unwrap()
    }

    fn draft_at_deploy() -> CreationDraft {
        let actions = vec![
            Action::SetGeneral(GeneralData {
                title: "Grow TVL".to_string(),
                description: "Reach 1M TVL".to_string(),
                tags: vec![],
                expiration: 2_000,
                created_at: 1_000,
            }),
            Action::Next,
            Action::AddReward(RewardDraft {
                token: Token::new(100, Address::repeat_byte(1), 18, "DAI"),
                amount: U256::from(1000),
                minimum_payout: U256::zero(),
            }),
            Action::AddReward(RewardDraft {
                token: Token::new(100, Address::repeat_byte(2), 18, "WETH"),
                amount: U256::from(5),
                minimum_payout: U256::zero(),
            }),
            Action::Next,
            Action::AddOracle(OracleDraft {
                template_id: 1,
                lower_bound: U256::zero(),
                higher_bound: U256::from(10),
                weight: U256::one(),
            }),
            Action::Next,
        ];
        actions
            .into_iter()
            .try_fold(CreationDraft::new(100), reduce)
            .unwrap()
    }

    #[tokio::test]
    async fn test_balance_of_decodes_response() {
        let (provider, mock) = Provider::mocked();
        mock.push::<Bytes, _>(encoded(42)).unwrap();

        let reader = ChainReader::new(Arc::new(provider));
        let balance = reader
            .balance_of(Address::repeat_byte(1), Address::repeat_byte(2))
            .await
            .unwrap();
        assert_eq!(balance, U256::from(42));
    }

    #[tokio::test]
    async fn test_holder_position_reads_balance_then_supply() {
        let (provider, mock) = Provider::mocked();
        queue(&mock, &[10, 800]);

        let reader = ChainReader::new(Arc::new(provider));
        let position = reader
            .holder_position(Address::repeat_byte(9), Address::repeat_byte(2), U256::from(1000))
            .await
            .unwrap();
        assert_eq!(
            position,
            HolderPosition {
                balance: U256::from(10),
                initial_supply: U256::from(1000),
                current_supply: U256::from(800),
            }
        );
    }

    #[tokio::test]
    async fn test_reward_balances_follow_reward_order() {
        let (provider, mock) = Provider::mocked();
        queue(&mock, &[1500, 3]);

        let rewards = [reward(1, "DAI", 1000), reward(2, "WETH", 5)];
        let reader = ChainReader::new(Arc::new(provider));
        let balances = reader
            .reward_balances(Address::repeat_byte(9), &rewards)
            .await
            .unwrap();

        assert_eq!(balances[0], Amount::new(rewards[0].currency.clone(), U256::from(1500)));
        assert_eq!(balances[1], Amount::new(rewards[1].currency.clone(), U256::from(3)));
    }

    #[tokio::test]
    async fn test_allowance_decodes_response() {
        let (provider, mock) = Provider::mocked();
        queue(&mock, &[7]);

        let reader = ChainReader::new(Arc::new(provider));
        let allowance = reader
            .allowance(Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(3))
            .await
            .unwrap();
        assert_eq!(allowance, U256::from(7));
    }

    #[tokio::test]
    async fn test_sync_allowances_updates_draft() {
        let (provider, mock) = Provider::mocked();
        // DAI fully approved, WETH short by one unit
        queue(&mock, &[1000, 4]);

        let reader = ChainReader::new(Arc::new(provider));
        let draft = reader
            .sync_allowances(draft_at_deploy(), Address::repeat_byte(7), Address::repeat_byte(8))
            .await
            .unwrap();

        assert_eq!(draft.allowances[&Address::repeat_byte(1)], U256::from(1000));
        let pending = required_approvals(&draft);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].token.symbol, "WETH");
    }

    #[tokio::test]
    async fn test_chain_id_mismatch() {
        let (provider, mock) = Provider::mocked();
        mock.push::<U256, _>(U256::from(100)).unwrap();
        mock.push::<U256, _>(U256::from(100)).unwrap();

        let reader = ChainReader::new(Arc::new(provider));
        assert!(reader.ensure_chain_id(100).await.is_ok());
        assert!(matches!(
            reader.ensure_chain_id(1).await,
            Err(KpiError::ChainMismatch { expected: 1, actual: 100 })
        ));
    }

    #[tokio::test]
    async fn test_missing_response_is_chain_error() {
        let (provider, _mock) = Provider::mocked();
        let reader = ChainReader::new(Arc::new(provider));
        let result = reader.total_supply(Address::repeat_byte(1)).await;
        assert!(matches!(result, Err(KpiError::Chain(_))));
    }
}
