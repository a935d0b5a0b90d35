//! Live YES/NO balance reads for a condition.
//!
//! Token ids are derived per outcome: the CTF computes the collection id
//! (an elliptic-curve hash, so it stays an RPC read) and the position id is
//! hashed locally from the collateral and collection id.

use crate::onchain::abi::{position_id, PARENT_COLLECTION_ID, USDC};
use crate::onchain::{ChainError, Outcome, PositionBalances, RetryPolicy, SettlementChain};
use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;
use tracing::debug;

pub struct BalanceReader<C> {
    chain: Arc<C>,
    collateral: Address,
    retry: RetryPolicy,
}

impl<C: SettlementChain> BalanceReader<C> {
    pub fn new(chain: Arc<C>, retry: RetryPolicy) -> Self {
        Self {
            chain,
            collateral: USDC,
            retry,
        }
    }

    /// ERC-1155 token id of one outcome of `condition_id`.
    pub async fn token_id(&self, condition_id: B256, outcome: Outcome) -> Result<U256, ChainError> {
        let collection_id = self
            .retry
            .run("getCollectionId", || {
                self.chain
                    .collection_id(PARENT_COLLECTION_ID, condition_id, outcome.index_set())
            })
            .await?;
        Ok(position_id(self.collateral, collection_id))
    }

    /// Current balances of `wallet` on both outcomes. Never cached.
    pub async fn read(&self, condition_id: B256, wallet: Address) -> Result<PositionBalances, ChainError> {
        let yes = self.outcome_balance(condition_id, Outcome::Yes, wallet).await?;
        let no = self.outcome_balance(condition_id, Outcome::No, wallet).await?;
        let balances = PositionBalances::new(yes, no);
        debug!(condition = %condition_id, wallet = %wallet, %balances, "position balances");
        Ok(balances)
    }

    /// Outcome slots of the condition; the settler only handles 2.
    pub async fn outcome_slot_count(&self, condition_id: B256) -> Result<U256, ChainError> {
        self.retry
            .run("getOutcomeSlotCount", || self.chain.outcome_slot_count(condition_id))
            .await
    }

    async fn outcome_balance(
        &self,
        condition_id: B256,
        outcome: Outcome,
        wallet: Address,
    ) -> Result<U256, ChainError> {
        let token_id = self.token_id(condition_id, outcome).await?;
        self.retry
            .run("balanceOf", || self.chain.balance_of(wallet, token_id))
            .await
    }
}
