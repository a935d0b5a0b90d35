//! `execTransaction` submission with a bounded receipt wait.

use crate::onchain::SettlementChain;
use crate::safe::AuthorizedCall;
use alloy::primitives::B256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_GAS_LIMIT: u64 = 500_000;
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of one submission. Never an error: anything but a mined receipt
/// with status 1 is a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Confirmed { tx_hash: B256 },
    Reverted { tx_hash: B256 },
    TimedOut,
    RpcError(String),
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Confirmed { .. })
    }
}

pub struct TransactionSubmitter<C> {
    chain: Arc<C>,
    gas_limit: u64,
    receipt_timeout: Duration,
}

impl<C: SettlementChain> TransactionSubmitter<C> {
    pub fn new(chain: Arc<C>, gas_limit: u64, receipt_timeout: Duration) -> Self {
        Self {
            chain,
            gas_limit,
            receipt_timeout,
        }
    }

    /// Execute `call` through its Safe. Not retried on failure: the caller
    /// re-authorizes (re-reading the nonce) if it wants another attempt.
    pub async fn submit(&self, call: AuthorizedCall) -> SubmitOutcome {
        let exec = self.chain.exec_transaction(
            call.safe,
            &call.tx,
            call.signature.to_bytes(),
            self.gas_limit,
        );

        let outcome = match tokio::time::timeout(self.receipt_timeout, exec).await {
            Ok(Ok(receipt)) if receipt.success => SubmitOutcome::Confirmed {
                tx_hash: receipt.tx_hash,
            },
            Ok(Ok(receipt)) => SubmitOutcome::Reverted {
                tx_hash: receipt.tx_hash,
            },
            Ok(Err(e)) => SubmitOutcome::RpcError(e.to_string()),
            Err(_) => SubmitOutcome::TimedOut,
        };

        match &outcome {
            SubmitOutcome::Confirmed { tx_hash } => {
                info!(action = %call.action, nonce = %call.nonce(), tx = %tx_hash, "safe transaction confirmed");
            }
            SubmitOutcome::Reverted { tx_hash } => {
                error!(action = %call.action, nonce = %call.nonce(), tx = %tx_hash, "safe transaction reverted");
            }
            SubmitOutcome::TimedOut => {
                warn!(
                    action = %call.action,
                    nonce = %call.nonce(),
                    timeout_secs = self.receipt_timeout.as_secs(),
                    "no receipt before timeout"
                );
            }
            SubmitOutcome::RpcError(e) => {
                error!(action = %call.action, nonce = %call.nonce(), error = %e, "safe transaction submission failed");
            }
        }

        outcome
    }
}
