//! Oracle resolution state of a condition.

use crate::onchain::{ResolutionState, RetryPolicy, SettlementChain};
use alloy::primitives::B256;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ResolutionChecker<C> {
    chain: Arc<C>,
    retry: RetryPolicy,
}

impl<C: SettlementChain> ResolutionChecker<C> {
    pub fn new(chain: Arc<C>, retry: RetryPolicy) -> Self {
        Self { chain, retry }
    }

    /// Payout state from `payoutDenominator`. An unreadable condition is
    /// reported as unresolved so no redeem is attempted against it.
    pub async fn state(&self, condition_id: B256) -> ResolutionState {
        match self
            .retry
            .run("payoutDenominator", || self.chain.payout_denominator(condition_id))
            .await
        {
            Ok(denominator) => {
                let state = ResolutionState::from_denominator(denominator);
                debug!(condition = %condition_id, denominator = %denominator, resolved = state.is_resolved(), "resolution state");
                state
            }
            Err(e) => {
                warn!(
                    condition = %condition_id,
                    error = %e,
                    "payout denominator unreadable, treating condition as unresolved"
                );
                ResolutionState::Unresolved
            }
        }
    }

    pub async fn is_resolved(&self, condition_id: B256) -> bool {
        self.state(condition_id).await.is_resolved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain::mock::MockChain;
    use alloy::primitives::{b256, Address, U256};

    const CID: B256 = b256!("00000000000000000000000000000000000000000000000000000000000000b2");

    #[tokio::test]
    async fn test_unresolved_until_denominator_set() {
        let chain = Arc::new(MockChain::new(Address::ZERO));
        let checker = ResolutionChecker::new(chain.clone(), RetryPolicy::none());
        assert!(!checker.is_resolved(CID).await);

        chain.resolve(CID);
        assert_eq!(
            checker.state(CID).await,
            ResolutionState::Resolved {
                payout_denominator: U256::from(1u64)
            }
        );
    }

    #[tokio::test]
    async fn test_rpc_failure_falls_back_to_unresolved() {
        let chain = Arc::new(MockChain::new(Address::ZERO));
        chain.resolve(CID);
        chain.with_state(|s| s.fail_payout_reads = true);

        let checker = ResolutionChecker::new(chain, RetryPolicy::none());
        assert!(!checker.is_resolved(CID).await);
    }
}
