use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use parking_lot::Mutex;

use crate::ports::vault::{TokenVault, VaultError};
use crate::ports::Payout;

type Asset = (u64, Address);

#[derive(Debug, Default)]
struct Ledger {
    reserves: HashMap<Asset, U256>,
    paid: HashMap<(Asset, Address), U256>,
    transfers: usize,
}

/// In-memory vault holding per-(chain, token) reserves.
///
/// A batch is checked against the reserves in full before any balance
/// moves. `fail_next` makes the next batch fail, to exercise rollback.
#[derive(Debug, Default)]
pub struct InMemoryVault {
    ledger: Mutex<Ledger>,
    fail_next: Mutex<Option<String>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, chain_id: u64, token: Address, amount: U256) {
        let mut ledger = self.ledger.lock();
        let reserve = ledger.reserves.entry((chain_id, token)).or_default();
        *reserve = reserve.saturating_add(amount);
    }

    pub fn reserve(&self, chain_id: u64, token: Address) -> U256 {
        self.ledger
            .lock()
            .reserves
            .get(&(chain_id, token))
            .copied()
            .unwrap_or_default()
    }

    /// Total paid out to `user` in `token` on `chain_id`.
    pub fn paid_to(&self, chain_id: u64, token: Address, user: Address) -> U256 {
        self.ledger
            .lock()
            .paid
            .get(&((chain_id, token), user))
            .copied()
            .unwrap_or_default()
    }

    /// Number of payouts that moved value.
    pub fn transfer_count(&self) -> usize {
        self.ledger.lock().transfers
    }

    pub fn fail_next(&self, reason: impl Into<String>) {
        *self.fail_next.lock() = Some(reason.into());
    }
}

impl TokenVault for InMemoryVault {
    fn transfer_batch(&self, payouts: &[Payout]) -> Result<(), VaultError> {
        if let Some(reason) = self.fail_next.lock().take() {
            return Err(VaultError::Rejected(reason));
        }

        let mut ledger = self.ledger.lock();

        let mut needed: HashMap<Asset, U256> = HashMap::new();
        for payout in payouts.iter().filter(|p| !p.amount.is_zero()) {
            let total = needed.entry((payout.chain_id, payout.token)).or_default();
            *total = total.saturating_add(payout.amount);
        }
        for (&(chain_id, token), &amount) in &needed {
            let available = ledger
                .reserves
                .get(&(chain_id, token))
                .copied()
                .unwrap_or_default();
            if available < amount {
                return Err(VaultError::InsufficientBalance {
                    chain_id,
                    token,
                    needed: amount,
                    available,
                });
            }
        }

        for payout in payouts.iter().filter(|p| !p.amount.is_zero()) {
            let asset = (payout.chain_id, payout.token);
            if let Some(reserve) = ledger.reserves.get_mut(&asset) {
                *reserve -= payout.amount;
            }
            let paid = ledger.paid.entry((asset, payout.to)).or_default();
            *paid = paid.saturating_add(payout.amount);
            ledger.transfers += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::leaf::LeafKey;
    use alloy_primitives::B256;

    const TOKEN: Address = Address::repeat_byte(0x70);
    const USER: Address = Address::repeat_byte(0x05);

    fn payout(amount: u64) -> Payout {
        Payout {
            key: LeafKey(B256::repeat_byte(amount as u8)),
            chain_id: 1,
            token: TOKEN,
            to: USER,
            amount: U256::from(amount),
        }
    }

    #[test]
    fn batch_moves_every_payout() {
        let vault = InMemoryVault::new();
        vault.deposit(1, TOKEN, U256::from(100u64));
        vault.transfer_batch(&[payout(30), payout(0), payout(20)]).unwrap();

        assert_eq!(vault.reserve(1, TOKEN), U256::from(50u64));
        assert_eq!(vault.paid_to(1, TOKEN, USER), U256::from(50u64));
        assert_eq!(vault.transfer_count(), 2);
    }

    #[test]
    fn short_reserve_moves_nothing() {
        let vault = InMemoryVault::new();
        vault.deposit(1, TOKEN, U256::from(40u64));
        let err = vault.transfer_batch(&[payout(30), payout(20)]).unwrap_err();

        assert!(matches!(err, VaultError::InsufficientBalance { .. }));
        assert_eq!(vault.reserve(1, TOKEN), U256::from(40u64));
        assert_eq!(vault.transfer_count(), 0);
    }

    #[test]
    fn injected_failure_applies_once() {
        let vault = InMemoryVault::new();
        vault.deposit(1, TOKEN, U256::from(40u64));
        vault.fail_next("paused");
        assert_eq!(
            vault.transfer_batch(&[payout(10)]),
            Err(VaultError::Rejected("paused".into()))
        );
        vault.transfer_batch(&[payout(10)]).unwrap();
        assert_eq!(vault.reserve(1, TOKEN), U256::from(30u64));
    }
}
