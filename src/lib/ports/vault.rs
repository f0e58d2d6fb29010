use alloy_primitives::{Address, U256};

use super::Payout;

/// Custody of the withdrawable funds.
///
/// `transfer_batch` is all-or-nothing: on error no payout of the batch has
/// moved.
pub trait TokenVault: Send + Sync {
    fn transfer_batch(&self, payouts: &[Payout]) -> Result<(), VaultError>;
}

impl<T: TokenVault + ?Sized> TokenVault for std::sync::Arc<T> {
    fn transfer_batch(&self, payouts: &[Payout]) -> Result<(), VaultError> {
        (**self).transfer_batch(payouts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("insufficient balance of {token} on chain {chain_id}: need {needed}, have {available}")]
    InsufficientBalance {
        chain_id: u64,
        token: Address,
        needed: U256,
        available: U256,
    },

    #[error("transfer rejected: {0}")]
    Rejected(String),
}
