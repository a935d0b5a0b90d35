//! Calldata for the two settlement operations.
//!
//! Both calls act on top-level USDC positions (zero parent collection) of a
//! binary condition, so the partition / index sets are always `[1, 2]`.

use crate::onchain::abi::{ConditionalTokens, CONDITIONAL_TOKENS, NEG_RISK_ADAPTER, PARENT_COLLECTION_ID, USDC};
use crate::onchain::binary_index_sets;
use crate::onchain::types::format_usdc;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementAction {
    /// Burn `amount` full YES+NO sets for `amount` collateral.
    Merge { amount: U256 },
    /// Burn every resolved position for its payout.
    Redeem,
}

impl std::fmt::Display for SettlementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementAction::Merge { amount } => write!(f, "MERGE({})", format_usdc(*amount)),
            SettlementAction::Redeem => write!(f, "REDEEM"),
        }
    }
}

/// An encoded call the Safe should make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementCall {
    pub condition_id: B256,
    pub action: SettlementAction,
    pub to: Address,
    pub data: Bytes,
}

/// Contract that receives settlement calls.
pub fn settlement_target(neg_risk: bool) -> Address {
    if neg_risk {
        NEG_RISK_ADAPTER
    } else {
        CONDITIONAL_TOKENS
    }
}

pub fn encode_merge(condition_id: B256, amount: U256) -> Bytes {
    ConditionalTokens::mergePositionsCall {
        collateralToken: USDC,
        parentCollectionId: PARENT_COLLECTION_ID,
        conditionId: condition_id,
        partition: binary_index_sets(),
        amount,
    }
    .abi_encode()
    .into()
}

pub fn encode_redeem(condition_id: B256) -> Bytes {
    ConditionalTokens::redeemPositionsCall {
        collateralToken: USDC,
        parentCollectionId: PARENT_COLLECTION_ID,
        conditionId: condition_id,
        indexSets: binary_index_sets(),
    }
    .abi_encode()
    .into()
}

pub fn merge_call(condition_id: B256, amount: U256, neg_risk: bool) -> SettlementCall {
    SettlementCall {
        condition_id,
        action: SettlementAction::Merge { amount },
        to: settlement_target(neg_risk),
        data: encode_merge(condition_id, amount),
    }
}

pub fn redeem_call(condition_id: B256, neg_risk: bool) -> SettlementCall {
    SettlementCall {
        condition_id,
        action: SettlementAction::Redeem,
        to: settlement_target(neg_risk),
        data: encode_redeem(condition_id),
    }
}
