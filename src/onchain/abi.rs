//! Contract ABI definitions and addresses for settlement.
//!
//! We define minimal ABIs covering just the functions the settler calls:
//! collection/position id derivation, balances and payout state on the
//! Conditional Tokens Framework (CTF), and the nonce / hash / execute surface
//! of the Gnosis Safe that holds the positions.

use alloy::primitives::{address, Address, B256, U256};
use alloy::sol;

// ─── Polygon mainnet addresses ───────────────────────────────────────────────

/// Conditional Tokens Framework.
pub const CONDITIONAL_TOKENS: Address = address!("4D97DCd97eC945f40cF65F87097ACe5EA0476045");

/// Neg Risk Adapter. Settlement calls for negative-risk markets go here.
pub const NEG_RISK_ADAPTER: Address = address!("d91E80cF2E7be2e162c6513ceD06f1dD0dA35296");

/// USDC.e, the collateral every Polymarket position is denominated in.
pub const USDC: Address = address!("2791bca1f2de4661ed88a30c99a7a9449aa84174");

/// USDC.e decimals.
pub const USDC_DECIMALS: u32 = 6;

/// Top-level positions have no parent collection.
pub const PARENT_COLLECTION_ID: B256 = B256::ZERO;

// ─── ABIs ────────────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract ConditionalTokens {
        function getOutcomeSlotCount(bytes32 conditionId) external view returns (uint256);
        function getCollectionId(bytes32 parentCollectionId, bytes32 conditionId, uint256 indexSet) external view returns (bytes32);
        function balanceOf(address owner, uint256 id) external view returns (uint256);
        function payoutDenominator(bytes32 conditionId) external view returns (uint256);
        function mergePositions(address collateralToken, bytes32 parentCollectionId, bytes32 conditionId, uint256[] partition, uint256 amount) external;
        function redeemPositions(address collateralToken, bytes32 parentCollectionId, bytes32 conditionId, uint256[] indexSets) external;
    }
}

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract GnosisSafe {
        function nonce() external view returns (uint256);
        function getTransactionHash(
            address to,
            uint256 value,
            bytes data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 baseGas,
            uint256 gasPrice,
            address gasToken,
            address refundReceiver,
            uint256 _nonce
        ) external view returns (bytes32);
        function execTransaction(
            address to,
            uint256 value,
            bytes data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 baseGas,
            uint256 gasPrice,
            address gasToken,
            address refundReceiver,
            bytes signatures
        ) external payable returns (bool success);
    }
}

/// Compute keccak256 hash of a byte slice.
pub fn keccak256(data: &[u8]) -> B256 {
    use tiny_keccak::{Hasher, Keccak};
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    B256::from(output)
}

/// ERC-1155 token id of a position: `uint256(keccak256(collateral ‖ collectionId))`.
///
/// Mirrors `CTHelpers.getPositionId`, so the id can be derived without an RPC
/// round trip once the collection id is known.
pub fn position_id(collateral: Address, collection_id: B256) -> U256 {
    let mut packed = [0u8; 52];
    packed[..20].copy_from_slice(collateral.as_slice());
    packed[20..].copy_from_slice(collection_id.as_slice());
    U256::from_be_bytes(keccak256(&packed).0)
}
