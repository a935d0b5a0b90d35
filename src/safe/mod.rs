//! Gnosis Safe transaction authorization and submission.
//!
//! Positions live in the user's Polymarket proxy Safe, so every settlement
//! call is wrapped in a Safe transaction:
//! 1. `TransactionAuthorizer` reads the Safe nonce, asks the Safe for its
//!    transaction hash and signs it with the owner key.
//! 2. `TransactionSubmitter` calls `execTransaction` with that signature and
//!    waits (bounded) for the receipt.
//!
//! The Safe nonce only advances on a successful execution, so an
//! `AuthorizedCall` is single-use and must be submitted before the next one is
//! built for the same wallet.

pub mod authorizer;
pub mod submitter;

pub use authorizer::TransactionAuthorizer;
pub use submitter::{SubmitOutcome, TransactionSubmitter};

use crate::calls::SettlementAction;
use crate::onchain::SafeTransaction;
use alloy::primitives::{Address, Bytes, Signature, SignatureError, B256, U256};

/// Length of a single-owner Safe signature: r ‖ s ‖ v.
pub const SIGNATURE_LEN: usize = 65;

/// ECDSA owner signature in the Safe's packed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeSignature([u8; SIGNATURE_LEN]);

impl SafeSignature {
    /// Pack `r` and `s` as 32-byte big-endian words followed by the `v` byte.
    pub fn from_parts(r: U256, s: U256, v: u8) -> Self {
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes[..32].copy_from_slice(&r.to_be_bytes::<32>());
        bytes[32..64].copy_from_slice(&s.to_be_bytes::<32>());
        bytes[64] = v;
        Self(bytes)
    }

    /// `v` is encoded as 27/28, the form Safe accepts for raw `eth_sign`-less
    /// ECDSA signatures over the transaction hash.
    pub fn from_signature(sig: &Signature) -> Self {
        Self::from_parts(sig.r(), sig.s(), 27 + sig.v() as u8)
    }

    pub fn r(&self) -> U256 {
        U256::from_be_slice(&self.0[..32])
    }

    pub fn s(&self) -> U256 {
        U256::from_be_slice(&self.0[32..64])
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0)
    }

    /// Recover the signing address for `digest` from the packed blob.
    pub fn recover_signer(&self, digest: B256) -> Result<Address, SignatureError> {
        let y_parity = match self.v() {
            0 | 27 => false,
            1 | 28 => true,
            other => return Err(SignatureError::InvalidParity(other as u64)),
        };
        Signature::new(self.r(), self.s(), y_parity).recover_address_from_prehash(&digest)
    }
}

impl TryFrom<&[u8]> for SafeSignature {
    type Error = SignatureError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let packed: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| SignatureError::FromBytes("expected 65 signature bytes"))?;
        Ok(Self(packed))
    }
}

/// A Safe transaction signed by the owner, ready for `execTransaction`.
///
/// Consumed by value on submission: once the Safe nonce moves, the signature
/// no longer matches any executable transaction.
#[derive(Debug, Clone)]
pub struct AuthorizedCall {
    pub safe: Address,
    pub action: SettlementAction,
    pub tx: SafeTransaction,
    pub safe_tx_hash: B256,
    pub signature: SafeSignature,
}

impl AuthorizedCall {
    pub fn nonce(&self) -> U256 {
        self.tx.nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain::abi::keccak256;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::SignerSync;

    #[test]
    fn test_signature_layout() {
        let sig = SafeSignature::from_parts(U256::from(1u64), U256::from(2u64), 28);
        let bytes = sig.as_bytes();
        assert_eq!(bytes.len(), SIGNATURE_LEN);
        assert_eq!(bytes[31], 1);
        assert!(bytes[..31].iter().all(|b| *b == 0));
        assert_eq!(bytes[63], 2);
        assert_eq!(bytes[64], 28);
        assert_eq!(sig.r(), U256::from(1u64));
        assert_eq!(sig.s(), U256::from(2u64));
    }

    #[test]
    fn test_sign_then_decompose_recovers_signer() {
        let signer = PrivateKeySigner::random();
        for msg in [&b"merge"[..], b"redeem", b""] {
            let digest = keccak256(msg);
            let sig = signer.sign_hash_sync(&digest).unwrap();
            let packed = SafeSignature::from_signature(&sig);

            assert!(packed.v() == 27 || packed.v() == 28);
            assert_eq!(packed.r(), sig.r());
            assert_eq!(packed.s(), sig.s());

            let reparsed = SafeSignature::try_from(packed.to_bytes().as_ref()).unwrap();
            assert_eq!(reparsed.recover_signer(digest).unwrap(), signer.address());
        }
    }

    #[test]
    fn test_signature_does_not_verify_other_digest() {
        let signer = PrivateKeySigner::random();
        let digest = keccak256(b"nonce 7");
        let sig = SafeSignature::from_signature(&signer.sign_hash_sync(&digest).unwrap());

        let recovered = sig.recover_signer(keccak256(b"nonce 8"));
        assert!(recovered.map(|a| a != signer.address()).unwrap_or(true));
    }

    #[test]
    fn test_signature_rejects_wrong_length_and_parity() {
        assert!(SafeSignature::try_from(&[0u8; 64][..]).is_err());
        let sig = SafeSignature::from_parts(U256::from(1u64), U256::from(1u64), 5);
        assert!(sig.recover_signer(B256::ZERO).is_err());
    }
}
