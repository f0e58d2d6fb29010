use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};

use crate::domain::leaf::{leaf_key, LeafKey, SmtLeaf};
use crate::domain::merge::{into_merge_value, merge, MergeValue, PathBits};
use crate::domain::wire::{ProofItem, TokenBalance};
use crate::ports::proof_source::{ProofSource, ProofSourceError};

/// Reference profit tree.
///
/// Holds the full leaf set in memory and recomputes nodes on demand. It
/// produces roots and proof bundles in the same shape the profit-proof
/// service returns, which makes it the fixture generator for tests and the
/// CLI `build` command.
#[derive(Debug, Clone, Default)]
pub struct ProfitTree {
    leaves: BTreeMap<LeafKey, SmtLeaf>,
}

type Entry = (B256, B256);

impl ProfitTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_leaves(leaves: impl IntoIterator<Item = SmtLeaf>) -> Self {
        let mut tree = Self::new();
        for leaf in leaves {
            tree.insert(leaf);
        }
        tree
    }

    /// Insert or replace the leaf at this leaf's key.
    pub fn insert(&mut self, leaf: SmtLeaf) -> Option<SmtLeaf> {
        self.leaves.insert(leaf.key(), leaf)
    }

    pub fn remove(&mut self, key: &LeafKey) -> Option<SmtLeaf> {
        self.leaves.remove(key)
    }

    pub fn get(&self, key: &LeafKey) -> Option<&SmtLeaf> {
        self.leaves.get(key)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &SmtLeaf> {
        self.leaves.values()
    }

    fn entries(&self) -> Vec<Entry> {
        self.leaves
            .iter()
            .map(|(key, leaf)| (key.0, leaf.value_hash()))
            .collect()
    }

    /// Root over every leaf; the empty tree has the zero root.
    pub fn root(&self) -> B256 {
        subtree(u8::MAX, &self.entries()).hash()
    }

    /// Proof bundle for the leaf at `(chain_id, token, user)`.
    pub fn proof_item(&self, chain_id: u64, token: Address, user: Address) -> Option<ProofItem> {
        let key = leaf_key(chain_id, token, user);
        let leaf = self.leaves.get(&key)?;
        let entries = self.entries();
        let path = key.0;

        let mut per_level = Vec::with_capacity(256);
        for height in 0..=u8::MAX {
            let side: Vec<Entry> = entries
                .iter()
                .filter(|(k, _)| {
                    k.get_bit(height) != path.get_bit(height)
                        && (*k ^ path).parent_path(height).is_zero()
                })
                .copied()
                .collect();
            per_level.push(child(height, &side));
        }

        let start_index = (0..=u8::MAX)
            .find(|h| !per_level[usize::from(*h)].is_zero())
            .unwrap_or(u8::MAX);
        let mut siblings = vec![per_level[usize::from(start_index)]];
        let mut bitmap = B256::ZERO;
        if let Some(from) = start_index.checked_add(1) {
            for height in from..=u8::MAX {
                let sibling = per_level[usize::from(height)];
                if !sibling.is_zero() {
                    bitmap.set_bit(height);
                    siblings.push(sibling);
                }
            }
        }

        Some(ProofItem {
            path,
            leave_bitmap: bitmap,
            token: TokenBalance {
                token: leaf.token,
                token_chain_id: leaf.chain_id,
                balance: leaf.amount,
                debt: leaf.debt,
            },
            siblings,
            root: self.root(),
            no1_merge_value: (start_index, path.bits_below(start_index)),
        })
    }

    /// Every proof bundle owned by `user`, ordered by leaf key.
    pub fn proofs_for_user(&self, user: Address) -> Vec<ProofItem> {
        self.leaves
            .values()
            .filter(|leaf| leaf.user == user)
            .filter_map(|leaf| self.proof_item(leaf.chain_id, leaf.token, user))
            .collect()
    }
}

/// Node formed by the merge at `height` over `entries`, all of which share
/// their key bits above `height`.
fn subtree(height: u8, entries: &[Entry]) -> MergeValue {
    match entries {
        [] => MergeValue::zero(),
        [(key, value)] if height < u8::MAX => into_merge_value(*key, *value, height + 1),
        _ => {
            let (right, left): (Vec<Entry>, Vec<Entry>) =
                entries.iter().copied().partition(|(k, _)| k.get_bit(height));
            let node_key = entries[0].0.parent_path(height);
            merge(height, &node_key, &child(height, &left), &child(height, &right))
        }
    }
}

/// One side of the merge at `height`.
fn child(height: u8, entries: &[Entry]) -> MergeValue {
    match (height.checked_sub(1), entries) {
        (_, []) => MergeValue::zero(),
        (None, [(_, value), ..]) => MergeValue::Value(*value),
        (Some(below), _) => subtree(below, entries),
    }
}

impl ProofSource for ProfitTree {
    async fn fetch_profit_proofs(
        &self,
        user: Address,
        tokens: &[(u64, Address)],
    ) -> Result<Vec<ProofItem>, ProofSourceError> {
        tokens
            .iter()
            .map(|&(chain_id, token)| {
                self.proof_item(chain_id, token, user)
                    .ok_or(ProofSourceError::Missing { chain_id, token })
            })
            .collect()
    }
}
