//! Per-condition settlement decisions.
//!
//! Each condition runs through:
//!
//! ```text
//! Start → CheckBalances → MergeIfPossible → CheckResolution → RedeemIfResolved → Done
//!                 └──────────────┴──────── Failed ──────────────────┘
//! ```
//!
//! - Equal YES/NO amounts are merged back to USDC first; that works whether
//!   or not the market has resolved.
//! - Whatever is left is redeemed only once the oracle has reported payouts.
//! - Zero balances and unresolved markets are successes, not errors, so the
//!   settler can be re-run over the same conditions at any time.
//!
//! All actions for a wallet run one at a time: each reads the Safe nonce,
//! signs, submits and waits for the receipt before the next one starts.

pub mod batch;

pub use batch::{dedup_conditions, BatchTally, MergeSummary, PositionRedeemer};

use crate::balances::BalanceReader;
use crate::calls::{merge_call, redeem_call, SettlementCall};
use crate::onchain::{format_usdc, PositionBalances, RetryPolicy, SettlementChain};
use crate::resolution::ResolutionChecker;
use crate::safe::submitter::{DEFAULT_GAS_LIMIT, DEFAULT_RECEIPT_TIMEOUT};
use crate::safe::{TransactionAuthorizer, TransactionSubmitter};
use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Number of outcomes the settler supports per condition.
pub const BINARY_OUTCOME_SLOTS: u64 = 2;

/// Submission and read tuning shared by every component.
#[derive(Debug, Clone, Copy)]
pub struct SettlementSettings {
    pub gas_limit: u64,
    pub receipt_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementState {
    Start,
    CheckBalances,
    MergeIfPossible,
    CheckResolution,
    RedeemIfResolved,
    Done,
    Failed,
}

impl std::fmt::Display for SettlementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementState::Start => write!(f, "START"),
            SettlementState::CheckBalances => write!(f, "CHECK_BALANCES"),
            SettlementState::MergeIfPossible => write!(f, "MERGE"),
            SettlementState::CheckResolution => write!(f, "CHECK_RESOLUTION"),
            SettlementState::RedeemIfResolved => write!(f, "REDEEM"),
            SettlementState::Done => write!(f, "DONE"),
            SettlementState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Terminal result for one condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Both balances were already zero. No transaction sent.
    NothingToSettle,
    /// Every position was merged back to collateral.
    Merged { amount: U256 },
    /// Market unresolved; `remaining` waits for a later run.
    AwaitingResolution { merged: U256, remaining: PositionBalances },
    Redeemed { merged: U256, redeemed: PositionBalances },
    RedeemFailed { merged: U256, remaining: PositionBalances },
    /// Balances could not be read; nothing was attempted past that point.
    BalanceReadFailed { error: String },
    /// Not a binary condition.
    Unsupported { outcome_slots: U256 },
}

impl SettlementOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SettlementOutcome::NothingToSettle
                | SettlementOutcome::Merged { .. }
                | SettlementOutcome::AwaitingResolution { .. }
                | SettlementOutcome::Redeemed { .. }
        )
    }

    pub fn state(&self) -> SettlementState {
        if self.is_success() {
            SettlementState::Done
        } else {
            SettlementState::Failed
        }
    }
}

/// Result of a merge-only pass over one condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    NothingToMerge,
    Merged { amount: U256 },
    Failed,
}

impl MergeOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, MergeOutcome::Failed)
    }

    pub fn merged_amount(&self) -> U256 {
        match self {
            MergeOutcome::Merged { amount } => *amount,
            _ => U256::ZERO,
        }
    }
}

/// Drives merge / redeem decisions for the positions held by one Safe.
pub struct SettlementOrchestrator<C> {
    safe: Address,
    balances: BalanceReader<C>,
    resolution: ResolutionChecker<C>,
    authorizer: TransactionAuthorizer<C>,
    submitter: TransactionSubmitter<C>,
}

impl<C: SettlementChain> SettlementOrchestrator<C> {
    pub fn new(
        chain: Arc<C>,
        signer: PrivateKeySigner,
        safe: Address,
        settings: SettlementSettings,
    ) -> Self {
        Self {
            safe,
            balances: BalanceReader::new(chain.clone(), settings.retry),
            resolution: ResolutionChecker::new(chain.clone(), settings.retry),
            authorizer: TransactionAuthorizer::new(chain.clone(), signer, settings.retry),
            submitter: TransactionSubmitter::new(chain, settings.gas_limit, settings.receipt_timeout),
        }
    }

    pub fn safe(&self) -> Address {
        self.safe
    }

    /// Merge what can be merged, then redeem the rest if the market resolved.
    pub async fn settle_condition(&self, condition_id: B256, neg_risk: bool) -> SettlementOutcome {
        let outcome = self.run(condition_id, neg_risk).await;
        debug!(condition = %condition_id, state = %outcome.state(), ?outcome, "settlement finished");
        outcome
    }

    async fn run(&self, condition_id: B256, neg_risk: bool) -> SettlementOutcome {
        self.transition(condition_id, SettlementState::Start, SettlementState::CheckBalances);
        let mut balances = match self.balances.read(condition_id, self.safe).await {
            Ok(b) => b,
            Err(e) => return self.balance_read_failed(condition_id, e),
        };

        if balances.is_empty() {
            debug!(condition = %condition_id, "no positions to settle");
            return SettlementOutcome::NothingToSettle;
        }

        info!(condition = %condition_id, %balances, "found positions");

        if let Some(unsupported) = self.check_binary(condition_id).await {
            return unsupported;
        }

        self.transition(condition_id, SettlementState::CheckBalances, SettlementState::MergeIfPossible);
        let mut merged = U256::ZERO;
        let merge_amount = balances.mergeable();
        if !merge_amount.is_zero() {
            info!(condition = %condition_id, amount = %format_usdc(merge_amount), "merging full sets");
            if self.execute(merge_call(condition_id, merge_amount, neg_risk)).await {
                merged = merge_amount;
                balances = match self.balances.read(condition_id, self.safe).await {
                    Ok(b) => b,
                    Err(e) => return self.balance_read_failed(condition_id, e),
                };
                info!(condition = %condition_id, %balances, "balances after merge");
            } else {
                warn!(condition = %condition_id, "merge failed, will still redeem if resolved");
            }
        }

        if balances.is_empty() {
            info!(condition = %condition_id, amount = %format_usdc(merged), "all positions merged");
            return SettlementOutcome::Merged { amount: merged };
        }

        self.transition(condition_id, SettlementState::MergeIfPossible, SettlementState::CheckResolution);
        if !self.resolution.is_resolved(condition_id).await {
            info!(
                condition = %condition_id,
                remaining = %format_usdc(balances.yes.max(balances.no)),
                "market not yet resolved, remaining positions redeemable after resolution"
            );
            return SettlementOutcome::AwaitingResolution {
                merged,
                remaining: balances,
            };
        }

        self.transition(condition_id, SettlementState::CheckResolution, SettlementState::RedeemIfResolved);
        info!(condition = %condition_id, %balances, "market resolved, redeeming");
        if self.execute(redeem_call(condition_id, neg_risk)).await {
            info!(
                condition = %condition_id,
                up_to = %format_usdc(balances.yes.saturating_add(balances.no)),
                "positions redeemed"
            );
            SettlementOutcome::Redeemed {
                merged,
                redeemed: balances,
            }
        } else {
            error!(condition = %condition_id, "redeem transaction failed");
            SettlementOutcome::RedeemFailed {
                merged,
                remaining: balances,
            }
        }
    }

    /// Merge equal YES/NO amounts only. Works before resolution.
    pub async fn merge_condition(&self, condition_id: B256, neg_risk: bool) -> MergeOutcome {
        let balances = match self.balances.read(condition_id, self.safe).await {
            Ok(b) => b,
            Err(e) => {
                error!(condition = %condition_id, error = %e, "balance read failed");
                return MergeOutcome::Failed;
            }
        };

        let amount = balances.mergeable();
        if amount.is_zero() {
            debug!(condition = %condition_id, "no full sets to merge");
            return MergeOutcome::NothingToMerge;
        }

        if self.check_binary(condition_id).await.is_some() {
            return MergeOutcome::Failed;
        }

        if self.execute(merge_call(condition_id, amount, neg_risk)).await {
            info!(condition = %condition_id, amount = %format_usdc(amount), "merged");
            MergeOutcome::Merged { amount }
        } else {
            error!(condition = %condition_id, "merge transaction failed");
            MergeOutcome::Failed
        }
    }

    /// Authorize at the current Safe nonce and submit. Returns true only on a
    /// confirmed receipt.
    async fn execute(&self, call: SettlementCall) -> bool {
        let authorized = match self.authorizer.authorize(self.safe, &call).await {
            Ok(a) => a,
            Err(e) => {
                error!(condition = %call.condition_id, action = %call.action, error = %e, "authorization failed");
                return false;
            }
        };
        self.submitter.submit(authorized).await.is_success()
    }

    /// `Some(Unsupported)` unless the condition has exactly two outcome slots.
    async fn check_binary(&self, condition_id: B256) -> Option<SettlementOutcome> {
        match self.balances.outcome_slot_count(condition_id).await {
            Ok(slots) if slots == U256::from(BINARY_OUTCOME_SLOTS) => None,
            Ok(slots) => {
                error!(condition = %condition_id, outcome_slots = %slots, "only binary conditions are supported");
                Some(SettlementOutcome::Unsupported { outcome_slots: slots })
            }
            Err(e) => Some(self.balance_read_failed(condition_id, e)),
        }
    }

    fn balance_read_failed(&self, condition_id: B256, e: impl std::fmt::Display) -> SettlementOutcome {
        error!(condition = %condition_id, error = %e, "position read failed, skipping condition");
        SettlementOutcome::BalanceReadFailed {
            error: e.to_string(),
        }
    }

    fn transition(&self, condition_id: B256, from: SettlementState, to: SettlementState) {
        debug!(condition = %condition_id, %from, %to, "settlement state");
    }
}
