//! In-memory chain for settlement tests.
//!
//! Simulates the parts of the CTF and the Safe the settler touches: position
//! balances keyed by ERC-1155 id, payout denominators, outcome slot counts,
//! the Safe nonce and hash, owner signature checks, and the balance effects of
//! executed merge / redeem calls.

use crate::onchain::abi::{
    keccak256, position_id, ConditionalTokens, CONDITIONAL_TOKENS, NEG_RISK_ADAPTER,
    PARENT_COLLECTION_ID, USDC,
};
use crate::onchain::client::SettlementChain;
use crate::onchain::types::{ChainError, ExecReceipt, Outcome, PositionBalances, SafeTransaction};
use crate::safe::SafeSignature;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExecRecord {
    pub to: Address,
    pub data: Bytes,
    pub nonce: U256,
    pub success: bool,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub balances: HashMap<(Address, U256), U256>,
    pub collateral: HashMap<Address, U256>,
    pub denominators: HashMap<B256, U256>,
    pub slot_counts: HashMap<B256, U256>,
    pub nonce: U256,
    pub fail_balance_reads: bool,
    pub fail_payout_reads: bool,
    pub fail_exec_rpc: bool,
    pub revert_merges: bool,
    pub exec_delay: Option<Duration>,
    pub executed: Vec<ExecRecord>,
    pub nonce_reads: usize,
}

pub struct MockChain {
    pub owner: Address,
    pub state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            state: Mutex::new(MockState::default()),
        }
    }

    fn collection(condition_id: B256, index_set: U256) -> B256 {
        let mut packed = Vec::with_capacity(96);
        packed.extend_from_slice(PARENT_COLLECTION_ID.as_slice());
        packed.extend_from_slice(condition_id.as_slice());
        packed.extend_from_slice(&index_set.to_be_bytes::<32>());
        keccak256(&packed)
    }

    fn position(condition_id: B256, outcome: Outcome) -> U256 {
        position_id(USDC, Self::collection(condition_id, outcome.index_set()))
    }

    /// Give `safe` YES/NO balances on a binary condition.
    pub fn seed(&self, safe: Address, condition_id: B256, yes: u64, no: u64) {
        let mut state = self.state.lock().unwrap();
        state
            .balances
            .insert((safe, Self::position(condition_id, Outcome::Yes)), U256::from(yes));
        state
            .balances
            .insert((safe, Self::position(condition_id, Outcome::No)), U256::from(no));
        state.slot_counts.entry(condition_id).or_insert(U256::from(2u64));
    }

    pub fn resolve(&self, condition_id: B256) {
        self.state
            .lock()
            .unwrap()
            .denominators
            .insert(condition_id, U256::from(1u64));
    }

    pub fn set_slot_count(&self, condition_id: B256, slots: u64) {
        self.state
            .lock()
            .unwrap()
            .slot_counts
            .insert(condition_id, U256::from(slots));
    }

    pub fn balances(&self, safe: Address, condition_id: B256) -> PositionBalances {
        let state = self.state.lock().unwrap();
        let get = |o| {
            state
                .balances
                .get(&(safe, Self::position(condition_id, o)))
                .copied()
                .unwrap_or_default()
        };
        PositionBalances::new(get(Outcome::Yes), get(Outcome::No))
    }

    pub fn collateral(&self, safe: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .collateral
            .get(&safe)
            .copied()
            .unwrap_or_default()
    }

    pub fn executed(&self) -> Vec<ExecRecord> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn nonce(&self) -> U256 {
        self.state.lock().unwrap().nonce
    }

    pub fn with_state(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock().unwrap());
    }

    fn tx_hash(safe: Address, tx: &SafeTransaction) -> B256 {
        let mut packed = Vec::new();
        packed.extend_from_slice(safe.as_slice());
        packed.extend_from_slice(tx.to.as_slice());
        packed.extend_from_slice(&tx.value.to_be_bytes::<32>());
        packed.extend_from_slice(&tx.data);
        packed.push(tx.operation as u8);
        packed.extend_from_slice(&tx.nonce.to_be_bytes::<32>());
        keccak256(&packed)
    }

    /// Apply the CTF effect of `data`. Returns false where the contract would revert.
    fn apply_call(state: &mut MockState, safe: Address, data: &[u8]) -> bool {
        if let Ok(call) = ConditionalTokens::mergePositionsCall::abi_decode(data) {
            if state.revert_merges {
                return false;
            }
            let ids = [
                Self::position(call.conditionId, Outcome::Yes),
                Self::position(call.conditionId, Outcome::No),
            ];
            let held: Vec<U256> = ids
                .iter()
                .map(|id| state.balances.get(&(safe, *id)).copied().unwrap_or_default())
                .collect();
            if held.iter().any(|b| *b < call.amount) {
                return false;
            }
            for (id, bal) in ids.iter().zip(held) {
                state.balances.insert((safe, *id), bal - call.amount);
            }
            *state.collateral.entry(safe).or_default() += call.amount;
            return true;
        }

        if let Ok(call) = ConditionalTokens::redeemPositionsCall::abi_decode(data) {
            let resolved = state
                .denominators
                .get(&call.conditionId)
                .is_some_and(|d| !d.is_zero());
            if !resolved {
                return false;
            }
            // Payout [1, 0]: YES pays out in full, NO is burned.
            let yes = state
                .balances
                .insert((safe, Self::position(call.conditionId, Outcome::Yes)), U256::ZERO)
                .unwrap_or_default();
            state
                .balances
                .insert((safe, Self::position(call.conditionId, Outcome::No)), U256::ZERO);
            *state.collateral.entry(safe).or_default() += yes;
            return true;
        }

        false
    }
}

#[async_trait]
impl SettlementChain for MockChain {
    async fn outcome_slot_count(&self, condition_id: B256) -> Result<U256, ChainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .slot_counts
            .get(&condition_id)
            .copied()
            .unwrap_or_default())
    }

    async fn collection_id(
        &self,
        _parent_collection_id: B256,
        condition_id: B256,
        index_set: U256,
    ) -> Result<B256, ChainError> {
        if self.state.lock().unwrap().fail_balance_reads {
            return Err(ChainError::rpc("getCollectionId", "connection refused"));
        }
        Ok(Self::collection(condition_id, index_set))
    }

    async fn balance_of(&self, owner: Address, position_id: U256) -> Result<U256, ChainError> {
        let state = self.state.lock().unwrap();
        if state.fail_balance_reads {
            return Err(ChainError::rpc("balanceOf", "connection refused"));
        }
        Ok(state
            .balances
            .get(&(owner, position_id))
            .copied()
            .unwrap_or_default())
    }

    async fn payout_denominator(&self, condition_id: B256) -> Result<U256, ChainError> {
        let state = self.state.lock().unwrap();
        if state.fail_payout_reads {
            return Err(ChainError::rpc("payoutDenominator", "timeout"));
        }
        Ok(state
            .denominators
            .get(&condition_id)
            .copied()
            .unwrap_or_default())
    }

    async fn safe_nonce(&self, _safe: Address) -> Result<U256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.nonce_reads += 1;
        Ok(state.nonce)
    }

    async fn safe_transaction_hash(
        &self,
        safe: Address,
        tx: &SafeTransaction,
    ) -> Result<B256, ChainError> {
        Ok(Self::tx_hash(safe, tx))
    }

    async fn exec_transaction(
        &self,
        safe: Address,
        tx: &SafeTransaction,
        signatures: Bytes,
        _gas_limit: u64,
    ) -> Result<ExecReceipt, ChainError> {
        let delay = self.state.lock().unwrap().exec_delay;
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_exec_rpc {
            return Err(ChainError::rpc("execTransaction", "nonce too low"));
        }

        let digest = Self::tx_hash(safe, tx);
        let signed_by_owner = SafeSignature::try_from(signatures.as_ref())
            .and_then(|s| s.recover_signer(digest))
            .is_ok_and(|a| a == self.owner);
        let known_target = tx.to == CONDITIONAL_TOKENS || tx.to == NEG_RISK_ADAPTER;

        let success = tx.nonce == state.nonce
            && signed_by_owner
            && known_target
            && Self::apply_call(&mut state, safe, &tx.data);

        if success {
            state.nonce += U256::from(1u64);
        }
        state.executed.push(ExecRecord {
            to: tx.to,
            data: tx.data.clone(),
            nonce: tx.nonce,
            success,
        });

        Ok(ExecReceipt {
            tx_hash: keccak256(digest.as_slice()),
            success,
        })
    }
}
