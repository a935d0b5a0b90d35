//! RPC surface used by the settlement pipeline.
//!
//! `SettlementChain` is the seam between settlement logic and Polygon: every
//! read (balances, payout state, Safe nonce and hash) and the single write
//! (`execTransaction`) goes through it. `RpcChain` is the alloy-backed
//! implementation; tests substitute an in-memory chain.

use crate::onchain::abi::{ConditionalTokens, GnosisSafe, CONDITIONAL_TOKENS};
use crate::onchain::types::{ChainError, ExecReceipt, SafeTransaction};
use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use reqwest::Url;
use async_trait::async_trait;
use tracing::{debug, info};

#[async_trait]
pub trait SettlementChain: Send + Sync {
    /// Number of outcome slots the condition was prepared with (0 if unknown).
    async fn outcome_slot_count(&self, condition_id: B256) -> Result<U256, ChainError>;

    async fn collection_id(
        &self,
        parent_collection_id: B256,
        condition_id: B256,
        index_set: U256,
    ) -> Result<B256, ChainError>;

    async fn balance_of(&self, owner: Address, position_id: U256) -> Result<U256, ChainError>;

    /// Zero while the condition is unresolved.
    async fn payout_denominator(&self, condition_id: B256) -> Result<U256, ChainError>;

    async fn safe_nonce(&self, safe: Address) -> Result<U256, ChainError>;

    /// The Safe's own EIP-712 digest of `tx`, computed on-chain.
    async fn safe_transaction_hash(
        &self,
        safe: Address,
        tx: &SafeTransaction,
    ) -> Result<B256, ChainError>;

    /// Submit `execTransaction` in an outer transaction and wait for its receipt.
    async fn exec_transaction(
        &self,
        safe: Address,
        tx: &SafeTransaction,
        signatures: Bytes,
        gas_limit: u64,
    ) -> Result<ExecReceipt, ChainError>;
}

/// Alloy HTTP provider with the controlling key as its wallet.
#[derive(Clone)]
pub struct RpcChain {
    provider: DynProvider,
    ctf: Address,
}

impl RpcChain {
    pub fn connect_http(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self, ChainError> {
        let url: Url = rpc_url
            .parse()
            .map_err(|_| ChainError::InvalidUrl(rpc_url.to_string()))?;

        let from = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        info!(url = %rpc_url, signer = %from, "polygon rpc provider ready");

        Ok(Self {
            provider,
            ctf: CONDITIONAL_TOKENS,
        })
    }

    fn ctf(&self) -> ConditionalTokens::ConditionalTokensInstance<DynProvider> {
        ConditionalTokens::new(self.ctf, self.provider.clone())
    }

    fn safe(&self, safe: Address) -> GnosisSafe::GnosisSafeInstance<DynProvider> {
        GnosisSafe::new(safe, self.provider.clone())
    }
}

#[async_trait]
impl SettlementChain for RpcChain {
    async fn outcome_slot_count(&self, condition_id: B256) -> Result<U256, ChainError> {
        self.ctf()
            .getOutcomeSlotCount(condition_id)
            .call()
            .await
            .map_err(|e| ChainError::rpc("getOutcomeSlotCount", e))
    }

    async fn collection_id(
        &self,
        parent_collection_id: B256,
        condition_id: B256,
        index_set: U256,
    ) -> Result<B256, ChainError> {
        self.ctf()
            .getCollectionId(parent_collection_id, condition_id, index_set)
            .call()
            .await
            .map_err(|e| ChainError::rpc("getCollectionId", e))
    }

    async fn balance_of(&self, owner: Address, position_id: U256) -> Result<U256, ChainError> {
        self.ctf()
            .balanceOf(owner, position_id)
            .call()
            .await
            .map_err(|e| ChainError::rpc("balanceOf", e))
    }

    async fn payout_denominator(&self, condition_id: B256) -> Result<U256, ChainError> {
        self.ctf()
            .payoutDenominator(condition_id)
            .call()
            .await
            .map_err(|e| ChainError::rpc("payoutDenominator", e))
    }

    async fn safe_nonce(&self, safe: Address) -> Result<U256, ChainError> {
        self.safe(safe)
            .nonce()
            .call()
            .await
            .map_err(|e| ChainError::rpc("nonce", e))
    }

    async fn safe_transaction_hash(
        &self,
        safe: Address,
        tx: &SafeTransaction,
    ) -> Result<B256, ChainError> {
        self.safe(safe)
            .getTransactionHash(
                tx.to,
                tx.value,
                tx.data.clone(),
                tx.operation as u8,
                tx.safe_tx_gas,
                tx.base_gas,
                tx.gas_price,
                tx.gas_token,
                tx.refund_receiver,
                tx.nonce,
            )
            .call()
            .await
            .map_err(|e| ChainError::rpc("getTransactionHash", e))
    }

    async fn exec_transaction(
        &self,
        safe: Address,
        tx: &SafeTransaction,
        signatures: Bytes,
        gas_limit: u64,
    ) -> Result<ExecReceipt, ChainError> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::rpc("eth_gasPrice", e))?;

        let pending = self
            .safe(safe)
            .execTransaction(
                tx.to,
                tx.value,
                tx.data.clone(),
                tx.operation as u8,
                tx.safe_tx_gas,
                tx.base_gas,
                tx.gas_price,
                tx.gas_token,
                tx.refund_receiver,
                signatures,
            )
            .gas(gas_limit)
            .gas_price(gas_price)
            .send()
            .await
            .map_err(|e| ChainError::rpc("execTransaction", e))?;

        let tx_hash = *pending.tx_hash();
        debug!(tx = %tx_hash, gas_limit, gas_price, "execTransaction sent, awaiting receipt");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainError::rpc("eth_getTransactionReceipt", e))?;

        Ok(ExecReceipt {
            tx_hash,
            success: receipt.status(),
        })
    }
}
