use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, B256, U256};
use tracing::{debug, warn};

use crate::domain::leaf::{LeafKey, SmtLeaf};
use crate::domain::merge::MergeValue;
use crate::domain::proof::LeafProof;
use crate::domain::round::Round;
use crate::domain::wire::ProofItem;
use crate::error::{FeeManagerError, Result};
use crate::ports::vault::TokenVault;
use crate::ports::Payout;

/// Withdrawal request over N leaves, as parallel arrays.
///
/// Index `i` of every array belongs to the same leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawBatch {
    pub leaves: Vec<SmtLeaf>,
    pub siblings: Vec<Vec<MergeValue>>,
    pub start_index: Vec<u8>,
    pub first_zero_bits: Vec<B256>,
    pub bitmaps: Vec<B256>,
    pub amounts: Vec<U256>,
}

impl WithdrawBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, leaf: SmtLeaf, proof: LeafProof, amount: U256) {
        self.leaves.push(leaf);
        self.siblings.push(proof.siblings);
        self.start_index.push(proof.start_index);
        self.first_zero_bits.push(proof.first_zero_bits);
        self.bitmaps.push(proof.bitmap);
        self.amounts.push(amount);
    }

    /// Batch claiming every item's full committed balance for `user`.
    pub fn from_proof_items(user: Address, items: &[ProofItem]) -> Self {
        let mut batch = Self::new();
        for item in items {
            batch.push(item.leaf(user), item.proof(), item.token.balance);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn proof(&self, index: usize) -> Option<LeafProof> {
        Some(LeafProof::new(
            self.siblings.get(index)?.clone(),
            *self.bitmaps.get(index)?,
            *self.start_index.get(index)?,
            *self.first_zero_bits.get(index)?,
        ))
    }

    fn check_lengths(&self) -> Result<()> {
        let n = self.leaves.len();
        if n == 0 {
            return Err(FeeManagerError::BatchMalformed("empty batch".into()));
        }
        let lengths = [
            ("siblings", self.siblings.len()),
            ("start_index", self.start_index.len()),
            ("first_zero_bits", self.first_zero_bits.len()),
            ("bitmaps", self.bitmaps.len()),
            ("amounts", self.amounts.len()),
        ];
        if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != n) {
            return Err(FeeManagerError::BatchMalformed(format!(
                "{name} has {len} entries for {n} leaves"
            )));
        }
        Ok(())
    }
}

/// Verifies withdrawal batches and owns the consumption records.
///
/// A record maps a leaf key to the index of the round in which it was
/// withdrawn; a later round makes it stale without any cleanup.
#[derive(Debug, Default)]
pub struct WithdrawalProcessor {
    consumed: HashMap<LeafKey, u64>,
}

impl WithdrawalProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_consumed(&self, key: &LeafKey, round_index: u64) -> bool {
        self.consumed.get(key) == Some(&round_index)
    }

    /// Check every leaf against `round`, then mark and pay them all.
    ///
    /// Nothing is recorded unless every leaf passes and the vault accepts the
    /// whole batch.
    pub fn process<V: TokenVault>(
        &mut self,
        round: &Round,
        caller: Address,
        batch: &WithdrawBatch,
        vault: &V,
    ) -> Result<Vec<Payout>> {
        batch.check_lengths()?;
        let payouts = self.validate(round, caller, batch)?;

        let previous: Vec<(LeafKey, Option<u64>)> = payouts
            .iter()
            .map(|p| (p.key, self.consumed.insert(p.key, round.index)))
            .collect();

        if let Err(err) = vault.transfer_batch(&payouts) {
            warn!(round = round.index, %caller, error = %err, "vault rejected batch, rolling back");
            for (key, prior) in previous {
                match prior {
                    Some(index) => self.consumed.insert(key, index),
                    None => self.consumed.remove(&key),
                };
            }
            return Err(err.into());
        }
        Ok(payouts)
    }

    fn validate(&self, round: &Round, caller: Address, batch: &WithdrawBatch) -> Result<Vec<Payout>> {
        let mut seen = HashSet::with_capacity(batch.len());
        let mut payouts = Vec::with_capacity(batch.len());

        for (index, leaf) in batch.leaves.iter().enumerate() {
            if leaf.user != caller {
                return Err(FeeManagerError::UserMismatch {
                    index,
                    leaf_user: leaf.user,
                    caller,
                });
            }

            let proof = batch
                .proof(index)
                .ok_or_else(|| FeeManagerError::BatchMalformed(format!("no proof for leaf {index}")))?;
            proof
                .verify(leaf, &round.profit_root)
                .map_err(|err| FeeManagerError::from_proof(index, err))?;

            let key = leaf.key();
            if self.is_consumed(&key, round.index) || !seen.insert(key) {
                return Err(FeeManagerError::AlreadyWithdrawn {
                    index,
                    key,
                    round: round.index,
                });
            }

            let declared = batch.amounts[index];
            if declared != leaf.amount {
                return Err(FeeManagerError::AmountMismatch {
                    index,
                    declared,
                    committed: leaf.amount,
                });
            }

            debug!(index, %key, chain_id = leaf.chain_id, token = %leaf.token, "leaf verified");
            payouts.push(Payout {
                key,
                chain_id: leaf.chain_id,
                token: leaf.token,
                to: leaf.user,
                amount: leaf.net_amount(),
            });
        }
        Ok(payouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_vault::InMemoryVault;
    use crate::adapters::profit_tree::ProfitTree;
    use crate::error::ErrorKind;

    const ALICE: Address = Address::repeat_byte(0xA1);
    const BOB: Address = Address::repeat_byte(0xB0);
    const TOKEN_A: Address = Address::repeat_byte(0x01);
    const TOKEN_B: Address = Address::repeat_byte(0x02);

    fn tree() -> ProfitTree {
        ProfitTree::from_leaves([
            SmtLeaf::new(5, TOKEN_A, ALICE, U256::from(100u64), U256::from(30u64)),
            SmtLeaf::new(5, TOKEN_B, ALICE, U256::from(50u64), U256::ZERO),
            SmtLeaf::new(5, TOKEN_A, BOB, U256::from(70u64), U256::ZERO),
        ])
    }

    fn round(tree: &ProfitTree, index: u64) -> Round {
        Round {
            index,
            start_block: 0,
            end_block: 10,
            profit_root: tree.root(),
            state_trans_tree_root: B256::ZERO,
            submitted_at: 0,
        }
    }

    fn funded_vault() -> InMemoryVault {
        let vault = InMemoryVault::new();
        vault.deposit(5, TOKEN_A, U256::from(1_000u64));
        vault.deposit(5, TOKEN_B, U256::from(1_000u64));
        vault
    }

    fn alice_batch(tree: &ProfitTree) -> WithdrawBatch {
        WithdrawBatch::from_proof_items(ALICE, &tree.proofs_for_user(ALICE))
    }

    #[test]
    fn pays_net_of_debt_and_marks_consumed() {
        let tree = tree();
        let round = round(&tree, 0);
        let vault = funded_vault();
        let mut processor = WithdrawalProcessor::new();

        let payouts = processor
            .process(&round, ALICE, &alice_batch(&tree), &vault)
            .unwrap();
        assert_eq!(payouts.len(), 2);
        assert_eq!(vault.paid_to(5, TOKEN_A, ALICE), U256::from(70u64));
        assert_eq!(vault.paid_to(5, TOKEN_B, ALICE), U256::from(50u64));
        for payout in &payouts {
            assert!(processor.is_consumed(&payout.key, 0));
        }
    }

    #[test]
    fn second_call_is_already_withdrawn() {
        let tree = tree();
        let round = round(&tree, 0);
        let vault = funded_vault();
        let mut processor = WithdrawalProcessor::new();
        let batch = alice_batch(&tree);

        processor.process(&round, ALICE, &batch, &vault).unwrap();
        let err = processor.process(&round, ALICE, &batch, &vault).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyWithdrawn);
    }

    #[test]
    fn consumed_leaf_with_bad_proof_is_rejected_on_the_proof() {
        let tree = tree();
        let round = round(&tree, 0);
        let vault = funded_vault();
        let mut processor = WithdrawalProcessor::new();
        let batch = alice_batch(&tree);
        processor.process(&round, ALICE, &batch, &vault).unwrap();

        let mut forged = batch.clone();
        forged.siblings[0][0] = MergeValue::Value(B256::repeat_byte(0x42));
        let err = processor.process(&round, ALICE, &forged, &vault).unwrap_err();
        assert!(matches!(err, FeeManagerError::ProofInvalid { index: 0, .. }));

        forged.siblings[0].clear();
        let err = processor.process(&round, ALICE, &forged, &vault).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProofMalformed);
    }

    #[test]
    fn next_round_reopens_the_leaf() {
        let tree = tree();
        let vault = funded_vault();
        let mut processor = WithdrawalProcessor::new();
        let batch = alice_batch(&tree);

        processor.process(&round(&tree, 0), ALICE, &batch, &vault).unwrap();
        processor.process(&round(&tree, 1), ALICE, &batch, &vault).unwrap();
        assert_eq!(vault.paid_to(5, TOKEN_B, ALICE), U256::from(100u64));
    }

    #[test]
    fn duplicate_leaf_in_one_batch_is_rejected() {
        let tree = tree();
        let item = tree.proof_item(5, TOKEN_B, ALICE).unwrap();
        let batch = WithdrawBatch::from_proof_items(ALICE, &[item.clone(), item]);
        let vault = funded_vault();

        let err = WithdrawalProcessor::new()
            .process(&round(&tree, 0), ALICE, &batch, &vault)
            .unwrap_err();
        assert!(matches!(err, FeeManagerError::AlreadyWithdrawn { index: 1, .. }));
        assert_eq!(vault.transfer_count(), 0);
    }

    #[test]
    fn one_bad_leaf_aborts_the_batch() {
        let tree = tree();
        let vault = funded_vault();
        let mut processor = WithdrawalProcessor::new();
        let mut batch = alice_batch(&tree);
        batch.amounts[1] += U256::from(1u64);

        let err = processor
            .process(&round(&tree, 0), ALICE, &batch, &vault)
            .unwrap_err();
        assert!(matches!(err, FeeManagerError::AmountMismatch { index: 1, .. }));
        assert_eq!(vault.transfer_count(), 0);
        assert!(!processor.is_consumed(&batch.leaves[0].key(), 0));
    }

    #[test]
    fn caller_must_own_every_leaf() {
        let tree = tree();
        let err = WithdrawalProcessor::new()
            .process(&round(&tree, 0), BOB, &alice_batch(&tree), &funded_vault())
            .unwrap_err();
        assert!(matches!(
            err,
            FeeManagerError::UserMismatch { index: 0, leaf_user, caller } if leaf_user == ALICE && caller == BOB
        ));
    }

    #[test]
    fn vault_failure_rolls_back_consumption() {
        let tree = tree();
        let vault = funded_vault();
        let mut processor = WithdrawalProcessor::new();
        let batch = alice_batch(&tree);

        vault.fail_next("paused");
        let err = processor
            .process(&round(&tree, 0), ALICE, &batch, &vault)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransferFailed);
        assert!(batch.leaves.iter().all(|l| !processor.is_consumed(&l.key(), 0)));

        processor.process(&round(&tree, 0), ALICE, &batch, &vault).unwrap();
    }

    #[test]
    fn rollback_restores_older_round_records() {
        let tree = tree();
        let vault = funded_vault();
        let mut processor = WithdrawalProcessor::new();
        let batch = alice_batch(&tree);

        processor.process(&round(&tree, 0), ALICE, &batch, &vault).unwrap();
        vault.fail_next("paused");
        processor
            .process(&round(&tree, 1), ALICE, &batch, &vault)
            .unwrap_err();

        let key = batch.leaves[0].key();
        assert!(processor.is_consumed(&key, 0));
        assert!(!processor.is_consumed(&key, 1));
    }

    #[test]
    fn wrong_root_is_proof_invalid() {
        let tree = tree();
        let mut round = round(&tree, 0);
        round.profit_root = B256::repeat_byte(0xEE);
        let err = WithdrawalProcessor::new()
            .process(&round, ALICE, &alice_batch(&tree), &funded_vault())
            .unwrap_err();
        assert!(matches!(err, FeeManagerError::ProofInvalid { index: 0, .. }));
    }

    #[test]
    fn ragged_or_empty_batches_are_malformed() {
        let tree = tree();
        let mut processor = WithdrawalProcessor::new();
        let vault = funded_vault();

        let mut ragged = alice_batch(&tree);
        ragged.bitmaps.pop();
        let err = processor.process(&round(&tree, 0), ALICE, &ragged, &vault).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProofMalformed);

        let err = processor
            .process(&round(&tree, 0), ALICE, &WithdrawBatch::new(), &vault)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProofMalformed);
    }

    #[test]
    fn malformed_proof_is_reported_with_its_index() {
        let tree = tree();
        let mut batch = alice_batch(&tree);
        batch.siblings[1].push(MergeValue::zero());
        let err = WithdrawalProcessor::new()
            .process(&round(&tree, 0), ALICE, &batch, &funded_vault())
            .unwrap_err();
        assert!(matches!(err, FeeManagerError::ProofMalformed { index: 1, .. }));
    }
}
