//! Settlement engine for Polymarket conditional-token positions held in a
//! Gnosis Safe: merges balanced YES/NO holdings back to USDC and redeems
//! resolved markets, one Safe transaction at a time.

pub mod balances;
pub mod calls;
pub mod config;
pub mod onchain;
pub mod positions;
pub mod resolution;
pub mod safe;
pub mod settle;
