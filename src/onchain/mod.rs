//! Polygon access for settlement.
//!
//! - `abi`: contract ABIs, addresses and position id derivation
//! - `types`: balances, resolution state, Safe transaction shape, errors
//! - `client`: the `SettlementChain` trait and its alloy implementation
//! - `retry`: bounded backoff for read calls

pub mod abi;
pub mod client;
pub mod retry;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use client::{RpcChain, SettlementChain};
pub use retry::RetryPolicy;
pub use types::{
    binary_index_sets, format_usdc, ChainError, ExecReceipt, Operation, Outcome, PositionBalances,
    ResolutionState, SafeTransaction,
};
