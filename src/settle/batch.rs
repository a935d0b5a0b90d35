//! Multi-condition drivers.
//!
//! Conditions are settled strictly one after another for the wallet; a failed
//! condition is logged and counted, and the batch moves on.

use crate::onchain::{format_usdc, SettlementChain};
use crate::positions::{condition_ids, PositionSource, PositionsClient};
use crate::settle::{MergeOutcome, SettlementOrchestrator};
use alloy::primitives::{B256, U256};
use std::collections::HashSet;
use tracing::{info, warn};

/// `(successful, total)` over the deduplicated conditions of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub successful: usize,
    pub total: usize,
}

impl BatchTally {
    pub fn failed(&self) -> usize {
        self.total - self.successful
    }
}

impl std::fmt::Display for BatchTally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.successful, self.total)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Conditions where a merge was confirmed.
    pub merges: usize,
    pub total: usize,
    /// Raw collateral units recovered.
    pub recovered: U256,
}

/// Drop repeated ids, keeping first-seen order.
pub fn dedup_conditions(ids: impl IntoIterator<Item = B256>) -> Vec<B256> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

impl<C: SettlementChain> SettlementOrchestrator<C> {
    /// Settle every condition (standard CTF markets).
    pub async fn settle_all(&self, condition_ids: &[B256]) -> BatchTally {
        let ids = dedup_conditions(condition_ids.iter().copied());
        let mut tally = BatchTally {
            successful: 0,
            total: ids.len(),
        };

        for (i, condition_id) in ids.iter().enumerate() {
            let outcome = self.settle_condition(*condition_id, false).await;
            if outcome.is_success() {
                tally.successful += 1;
            } else {
                warn!(condition = %condition_id, ?outcome, n = i + 1, of = ids.len(), "condition not settled");
            }
        }

        info!(successful = tally.successful, total = tally.total, "settlement batch complete");
        tally
    }

    /// Merge balanced YES/NO holdings across conditions without redeeming.
    pub async fn merge_all(&self, condition_ids: &[B256]) -> MergeSummary {
        let ids = dedup_conditions(condition_ids.iter().copied());
        let mut summary = MergeSummary {
            total: ids.len(),
            ..MergeSummary::default()
        };

        for condition_id in &ids {
            match self.merge_condition(*condition_id, false).await {
                MergeOutcome::Merged { amount } => {
                    summary.merges += 1;
                    summary.recovered += amount;
                }
                MergeOutcome::NothingToMerge => {}
                MergeOutcome::Failed => {
                    warn!(condition = %condition_id, "failed to merge condition");
                }
            }
        }

        if summary.merges > 0 {
            info!(
                merges = summary.merges,
                recovered = %format_usdc(summary.recovered),
                "merge complete"
            );
        } else {
            info!("no positions were merged");
        }
        summary
    }
}

/// Settles whatever the position source reports the Safe as holding.
pub struct PositionRedeemer<C, P = PositionsClient> {
    positions: P,
    orchestrator: SettlementOrchestrator<C>,
}

impl<C: SettlementChain, P: PositionSource> PositionRedeemer<C, P> {
    pub fn new(positions: P, orchestrator: SettlementOrchestrator<C>) -> Self {
        Self {
            positions,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &SettlementOrchestrator<C> {
        &self.orchestrator
    }

    /// Settle every condition held in markets matching `market_slug`.
    pub async fn redeem_market_positions(&self, market_slug: &str) -> BatchTally {
        info!(market = market_slug, "checking for redeemable positions");
        let rows = self.positions.redeemable_positions(Some(market_slug)).await;
        self.settle_rows(&condition_ids(&rows)).await
    }

    /// Settle every condition the wallet holds.
    pub async fn redeem_all_positions(&self) -> BatchTally {
        info!("checking for all redeemable positions");
        let rows = self.positions.redeemable_positions(None).await;
        self.settle_rows(&condition_ids(&rows)).await
    }

    /// Merge balanced positions right away, without waiting for resolution.
    pub async fn merge_balanced_positions(&self) -> MergeSummary {
        info!("checking for balanced positions to merge");
        let ids = condition_ids(&self.positions.mergeable_positions().await);
        if ids.is_empty() {
            info!("no balanced positions to merge");
            return MergeSummary::default();
        }
        info!(conditions = ids.len(), "found balanced positions");
        self.orchestrator.merge_all(&ids).await
    }

    async fn settle_rows(&self, ids: &[B256]) -> BatchTally {
        if ids.is_empty() {
            info!("no positions to redeem");
            return BatchTally::default();
        }
        info!(conditions = ids.len(), "found conditions to settle");
        self.orchestrator.settle_all(ids).await
    }
}
