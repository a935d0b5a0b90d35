//! Owner authorization of Safe transactions.

use crate::calls::SettlementCall;
use crate::onchain::{ChainError, RetryPolicy, SafeTransaction, SettlementChain};
use crate::safe::{AuthorizedCall, SafeSignature};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use std::sync::Arc;
use tracing::debug;

/// Signs Safe transactions with the controlling owner key.
pub struct TransactionAuthorizer<C> {
    chain: Arc<C>,
    signer: PrivateKeySigner,
    retry: RetryPolicy,
}

impl<C: SettlementChain> TransactionAuthorizer<C> {
    pub fn new(chain: Arc<C>, signer: PrivateKeySigner, retry: RetryPolicy) -> Self {
        Self {
            chain,
            signer,
            retry,
        }
    }

    pub fn owner(&self) -> Address {
        self.signer.address()
    }

    /// Build and sign a Safe transaction for `call` at the Safe's current nonce.
    ///
    /// The nonce and the hash are both read from the Safe right before
    /// signing; the hash is the Safe's own, so domain separation (chain id,
    /// Safe address, version) is whatever the deployed contract uses.
    pub async fn authorize(
        &self,
        safe: Address,
        call: &SettlementCall,
    ) -> Result<AuthorizedCall, ChainError> {
        let nonce = self
            .retry
            .run("nonce", || self.chain.safe_nonce(safe))
            .await?;

        let tx = SafeTransaction::call(call.to, call.data.clone(), nonce);

        let safe_tx_hash = self
            .retry
            .run("getTransactionHash", || self.chain.safe_transaction_hash(safe, &tx))
            .await?;

        let signature = self
            .signer
            .sign_hash_sync(&safe_tx_hash)
            .map_err(|e| ChainError::Signing(e.to_string()))?;

        debug!(
            safe = %safe,
            to = %call.to,
            action = %call.action,
            nonce = %nonce,
            hash = %safe_tx_hash,
            "safe transaction signed"
        );

        Ok(AuthorizedCall {
            safe,
            action: call.action,
            tx,
            safe_tx_hash,
            signature: SafeSignature::from_signature(&signature),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::{merge_call, redeem_call};
    use crate::onchain::mock::MockChain;
    use alloy::primitives::{b256, B256, U256};

    const CID: B256 = b256!("00000000000000000000000000000000000000000000000000000000000000c1");

    fn setup() -> (Arc<MockChain>, TransactionAuthorizer<MockChain>, Address) {
        let signer = PrivateKeySigner::random();
        let chain = Arc::new(MockChain::new(signer.address()));
        let safe = Address::repeat_byte(0x5a);
        let auth = TransactionAuthorizer::new(chain.clone(), signer, RetryPolicy::none());
        (chain, auth, safe)
    }

    #[tokio::test]
    async fn test_authorize_signs_safe_hash() {
        let (chain, auth, safe) = setup();
        chain.with_state(|s| s.nonce = U256::from(7u64));

        let call = merge_call(CID, U256::from(10u64), false);
        let authorized = auth.authorize(safe, &call).await.unwrap();

        assert_eq!(authorized.nonce(), U256::from(7u64));
        assert_eq!(authorized.tx.to, call.to);
        assert_eq!(authorized.tx.data, call.data);
        assert_eq!(authorized.tx.value, U256::ZERO);
        assert_eq!(
            authorized.signature.recover_signer(authorized.safe_tx_hash).unwrap(),
            auth.owner()
        );
        assert_eq!(
            authorized.safe_tx_hash,
            chain.safe_transaction_hash(safe, &authorized.tx).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_signature_bound_to_calldata_and_nonce() {
        let (chain, auth, safe) = setup();

        let a = auth.authorize(safe, &redeem_call(CID, false)).await.unwrap();
        let b = auth.authorize(safe, &merge_call(CID, U256::from(1u64), false)).await.unwrap();
        assert_ne!(a.safe_tx_hash, b.safe_tx_hash);

        chain.with_state(|s| s.nonce = U256::from(1u64));
        let c = auth.authorize(safe, &redeem_call(CID, false)).await.unwrap();
        assert_ne!(a.safe_tx_hash, c.safe_tx_hash);
        assert_ne!(a.signature, c.signature);
    }

    #[tokio::test]
    async fn test_nonce_read_for_every_authorization() {
        let (chain, auth, safe) = setup();
        auth.authorize(safe, &redeem_call(CID, false)).await.unwrap();
        auth.authorize(safe, &redeem_call(CID, false)).await.unwrap();
        assert_eq!(chain.state.lock().unwrap().nonce_reads, 2);
    }
}
