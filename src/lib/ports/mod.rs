pub mod clock;
pub mod proof_source;
pub mod registry;
pub mod vault;

use alloy_primitives::{Address, U256};

use crate::domain::leaf::LeafKey;

/// Value released to a user for one withdrawn leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub key: LeafKey,
    pub chain_id: u64,
    pub token: Address,
    pub to: Address,
    /// Committed amount net of debt; may be zero.
    pub amount: U256,
}
