//! Shared chain-facing types for settlement.

use crate::onchain::abi::USDC_DECIMALS;
use alloy::primitives::{Address, Bytes, B256, U256};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("rpc call {call} failed: {message}")]
    Rpc { call: &'static str, message: String },
    #[error("invalid rpc url {0}")]
    InvalidUrl(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

impl ChainError {
    pub fn rpc(call: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Rpc {
            call,
            message: err.to_string(),
        }
    }
}

/// Binary outcome of a condition. The discriminant is the CTF index set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Yes = 1,
    No = 2,
}

impl Outcome {
    pub const ALL: [Outcome; 2] = [Outcome::Yes, Outcome::No];

    pub fn index_set(self) -> U256 {
        U256::from(self as u64)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Yes => write!(f, "YES"),
            Outcome::No => write!(f, "NO"),
        }
    }
}

/// Index sets covering both outcomes: the merge partition and the redeem set.
pub fn binary_index_sets() -> Vec<U256> {
    Outcome::ALL.iter().map(|o| o.index_set()).collect()
}

/// Live YES/NO balances of one condition, in raw collateral units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionBalances {
    pub yes: U256,
    pub no: U256,
}

impl PositionBalances {
    pub fn new(yes: U256, no: U256) -> Self {
        Self { yes, no }
    }

    pub fn is_empty(&self) -> bool {
        self.yes.is_zero() && self.no.is_zero()
    }

    /// Full sets that can be merged back into collateral.
    pub fn mergeable(&self) -> U256 {
        self.yes.min(self.no)
    }

    /// Balances expected once `amount` full sets have been merged.
    pub fn after_merge(&self, amount: U256) -> Self {
        Self {
            yes: self.yes.saturating_sub(amount),
            no: self.no.saturating_sub(amount),
        }
    }

    /// Amount still awaiting resolution after all full sets are merged.
    pub fn unmatched(&self) -> U256 {
        self.yes.max(self.no) - self.mergeable()
    }
}

impl std::fmt::Display for PositionBalances {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "YES {} / NO {}", format_usdc(self.yes), format_usdc(self.no))
    }
}

/// Render a raw USDC amount with six decimal places. Display only.
pub fn format_usdc(raw: U256) -> Decimal {
    match u128::try_from(raw).ok().and_then(|v| i128::try_from(v).ok()) {
        Some(v) if v <= Decimal::MAX.mantissa() => Decimal::from_i128_with_scale(v, USDC_DECIMALS),
        _ => Decimal::MAX,
    }
}

/// Oracle-published payout state of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Resolved { payout_denominator: U256 },
}

impl ResolutionState {
    pub fn from_denominator(payout_denominator: U256) -> Self {
        if payout_denominator.is_zero() {
            Self::Unresolved
        } else {
            Self::Resolved { payout_denominator }
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

/// Safe operation type. Settlement only issues plain calls, never delegatecall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Call = 0,
}

/// A Safe transaction as hashed by `getTransactionHash` and executed by
/// `execTransaction`. No refunds: gas fields and tokens are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: Operation,
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
    pub nonce: U256,
}

impl SafeTransaction {
    pub fn call(to: Address, data: Bytes, nonce: U256) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data,
            operation: Operation::Call,
            safe_tx_gas: U256::ZERO,
            base_gas: U256::ZERO,
            gas_price: U256::ZERO,
            gas_token: Address::ZERO,
            refund_receiver: Address::ZERO,
            nonce,
        }
    }
}

/// Outcome of a mined `execTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecReceipt {
    pub tx_hash: B256,
    /// Receipt status == 1.
    pub success: bool,
}
