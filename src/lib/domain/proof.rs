use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use super::leaf::SmtLeaf;
use super::merge::{leaf_zero_run, merge, MergeValue, PathBits};

/// Compact membership proof for one leaf.
///
/// Levels `0..start_index` are the leaf's private zero run, summarised by
/// `first_zero_bits`. The first sibling always covers level `start_index`
/// (or, as a `ShortCut`, stands in for the whole run); every level above it
/// takes the next sibling when its `bitmap` bit is set and an empty sibling
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafProof {
    pub siblings: Vec<MergeValue>,
    pub bitmap: B256,
    pub start_index: u8,
    pub first_zero_bits: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    #[error("proof has no siblings")]
    Empty,

    #[error("bitmap marks levels below start index {start_index}")]
    BitmapBelowStart { start_index: u8 },

    #[error("bitmap marks level {start_index}, already covered by the first sibling")]
    BitmapAtStart { start_index: u8 },

    #[error("first zero bits extend to or above start index {start_index}")]
    ZeroBitsOutOfRange { start_index: u8 },

    #[error("expected {expected} siblings from the bitmap, got {actual}")]
    SiblingCountMismatch { expected: usize, actual: usize },

    #[error("short-cut sibling at position {position}; only the first sibling may be a short-cut")]
    MisplacedShortCut { position: usize },

    #[error("short-cut sibling does not describe the presented leaf")]
    ShortCutMismatch,

    #[error("reconstructed root {computed} does not match {expected}")]
    RootMismatch { computed: B256, expected: B256 },
}

impl ProofError {
    /// Structural problems, as opposed to a well-formed proof for another root.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, ProofError::RootMismatch { .. })
    }
}

fn count_ones(bits: &B256) -> usize {
    bits.0.iter().map(|b| b.count_ones() as usize).sum()
}

impl LeafProof {
    pub fn new(
        siblings: Vec<MergeValue>,
        bitmap: B256,
        start_index: u8,
        first_zero_bits: B256,
    ) -> Self {
        Self {
            siblings,
            bitmap,
            start_index,
            first_zero_bits,
        }
    }

    fn leads_with_short_cut(&self) -> bool {
        matches!(self.siblings.first(), Some(MergeValue::ShortCut { .. }))
    }

    /// Number of siblings this proof's bitmap and start index call for.
    pub fn expected_siblings(&self) -> usize {
        1 + count_ones(&self.bitmap.copy_bits(self.start_index))
    }

    /// Structural checks that do not depend on the leaf.
    pub fn check_shape(&self) -> Result<(), ProofError> {
        let start = self.start_index;
        if self.siblings.is_empty() {
            return Err(ProofError::Empty);
        }
        if !self.bitmap.bits_below(start).is_zero() {
            return Err(ProofError::BitmapBelowStart { start_index: start });
        }
        if !self.first_zero_bits.copy_bits(start).is_zero() {
            return Err(ProofError::ZeroBitsOutOfRange { start_index: start });
        }
        let short_cut = self.leads_with_short_cut();
        if !short_cut && self.bitmap.get_bit(start) {
            return Err(ProofError::BitmapAtStart { start_index: start });
        }
        if let Some(position) = self
            .siblings
            .iter()
            .skip(1)
            .position(|s| matches!(s, MergeValue::ShortCut { .. }))
        {
            return Err(ProofError::MisplacedShortCut {
                position: position + 1,
            });
        }
        let expected = self.expected_siblings();
        if self.siblings.len() != expected {
            return Err(ProofError::SiblingCountMismatch {
                expected,
                actual: self.siblings.len(),
            });
        }
        Ok(())
    }

    /// Fold the proof from the leaf up to the root.
    pub fn compute_root(&self, key: &B256, value: &B256) -> Result<B256, ProofError> {
        self.check_shape()?;
        let start = self.start_index;
        let mut siblings = self.siblings.iter();

        let mut current = match siblings.next() {
            Some(MergeValue::ShortCut {
                key: sc_key,
                value: sc_value,
                height,
            }) => {
                if sc_key != key || sc_value != value || *height != start {
                    return Err(ProofError::ShortCutMismatch);
                }
                leaf_zero_run(key, value, self.first_zero_bits, start)
            }
            Some(first) => {
                let running = leaf_zero_run(key, value, self.first_zero_bits, start);
                fold_level(start, key, &running, first)
            }
            None => return Err(ProofError::Empty),
        };

        let first_bitmap_level = if self.leads_with_short_cut() {
            Some(start)
        } else {
            start.checked_add(1)
        };
        let Some(from) = first_bitmap_level else {
            return Ok(current.hash());
        };

        for height in from..=u8::MAX {
            let sibling = if self.bitmap.get_bit(height) {
                // count was checked against the bitmap above
                siblings.next().copied().unwrap_or_default()
            } else {
                MergeValue::zero()
            };
            current = fold_level(height, key, &current, &sibling);
        }
        Ok(current.hash())
    }

    /// Check that `leaf` sits under `root`.
    pub fn verify(&self, leaf: &SmtLeaf, root: &B256) -> Result<(), ProofError> {
        let computed = reconstruct_root(leaf, self)?;
        if computed != *root {
            return Err(ProofError::RootMismatch {
                computed,
                expected: *root,
            });
        }
        Ok(())
    }
}

fn fold_level(height: u8, key: &B256, current: &MergeValue, sibling: &MergeValue) -> MergeValue {
    let parent = key.parent_path(height);
    if key.get_bit(height) {
        merge(height, &parent, sibling, current)
    } else {
        merge(height, &parent, current, sibling)
    }
}

/// Root implied by `leaf` and its proof.
pub fn reconstruct_root(leaf: &SmtLeaf, proof: &LeafProof) -> Result<B256, ProofError> {
    proof.compute_root(leaf.key().as_b256(), &leaf.value_hash())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::merge::{hash_base_node, into_merge_value};

    fn key_with_bits(bits: &[u8]) -> B256 {
        let mut key = B256::ZERO;
        for b in bits {
            key.set_bit(*b);
        }
        key
    }

    /// Two leaves that first diverge at bit 3, nothing else in the tree.
    fn pair() -> (B256, B256, B256, B256, B256) {
        let key_a = key_with_bits(&[0, 200]);
        let key_b = key_with_bits(&[0, 3, 200]);
        let val_a = B256::repeat_byte(0xA1);
        let val_b = B256::repeat_byte(0xB2);

        let a = into_merge_value(key_a, val_a, 3);
        let b = into_merge_value(key_b, val_b, 3);
        let mut node = merge(3, &key_a.parent_path(3), &a, &b);
        for height in 4..=u8::MAX {
            node = fold_level(height, &key_a, &node, &MergeValue::zero());
        }
        (key_a, val_a, key_b, val_b, node.hash())
    }

    #[test]
    fn sibling_pair_reconstructs() {
        let (key_a, val_a, key_b, val_b, root) = pair();
        let proof_a = LeafProof::new(
            vec![into_merge_value(key_b, val_b, 3)],
            B256::ZERO,
            3,
            key_a.bits_below(3),
        );
        assert_eq!(proof_a.compute_root(&key_a, &val_a).unwrap(), root);

        let proof_b = LeafProof::new(
            vec![into_merge_value(key_a, val_a, 3)],
            B256::ZERO,
            3,
            key_b.bits_below(3),
        );
        assert_eq!(proof_b.compute_root(&key_b, &val_b).unwrap(), root);
    }

    #[test]
    fn short_cut_form_reconstructs_the_same_root() {
        let (key_a, val_a, key_b, val_b, root) = pair();
        let mut bitmap = B256::ZERO;
        bitmap.set_bit(3);
        let proof = LeafProof::new(
            vec![
                MergeValue::ShortCut {
                    key: key_a,
                    value: val_a,
                    height: 3,
                },
                into_merge_value(key_b, val_b, 3),
            ],
            bitmap,
            3,
            key_a.bits_below(3),
        );
        assert_eq!(proof.compute_root(&key_a, &val_a).unwrap(), root);
    }

    #[test]
    fn short_cut_for_another_leaf_is_rejected() {
        let (key_a, val_a, key_b, val_b, _) = pair();
        let mut bitmap = B256::ZERO;
        bitmap.set_bit(3);
        let proof = LeafProof::new(
            vec![
                MergeValue::ShortCut {
                    key: key_b,
                    value: val_b,
                    height: 3,
                },
                into_merge_value(key_b, val_b, 3),
            ],
            bitmap,
            3,
            key_a.bits_below(3),
        );
        assert_eq!(
            proof.compute_root(&key_a, &val_a),
            Err(ProofError::ShortCutMismatch)
        );
    }

    #[test]
    fn short_cut_after_the_first_sibling_is_malformed() {
        let key = key_with_bits(&[1]);
        let mut bitmap = B256::ZERO;
        bitmap.set_bit(9);
        let proof = LeafProof::new(
            vec![
                MergeValue::Value(B256::repeat_byte(1)),
                MergeValue::ShortCut {
                    key,
                    value: B256::repeat_byte(2),
                    height: 9,
                },
            ],
            bitmap,
            4,
            B256::ZERO,
        );
        assert_eq!(
            proof.check_shape(),
            Err(ProofError::MisplacedShortCut { position: 1 })
        );
    }

    #[test]
    fn sole_occupant_degenerates_to_one_combine() {
        let key = key_with_bits(&[5, 255]);
        let value = B256::repeat_byte(0x33);
        let sibling = B256::repeat_byte(0x44);
        let proof = LeafProof::new(vec![MergeValue::Value(sibling)], B256::ZERO, 255, B256::ZERO);

        let running = MergeValue::MergeWithZero {
            base_node: hash_base_node(0, &key.parent_path(0), &value),
            zero_bits: B256::ZERO,
            zero_count: 255,
        };
        // bit 255 is set, so the running node is the right child
        let expected = merge(255, &B256::ZERO, &MergeValue::Value(sibling), &running).hash();
        assert_eq!(proof.compute_root(&key, &value).unwrap(), expected);
    }

    #[test]
    fn start_zero_folds_every_level() {
        let key = key_with_bits(&[]);
        let value = B256::repeat_byte(0x10);
        let sibling = MergeValue::Value(B256::repeat_byte(0x20));
        let proof = LeafProof::new(vec![sibling], B256::ZERO, 0, B256::ZERO);

        let mut node = merge(0, &key.parent_path(0), &MergeValue::Value(value), &sibling);
        for height in 1..=u8::MAX {
            node = merge(height, &key.parent_path(height), &node, &MergeValue::zero());
        }
        assert_eq!(proof.compute_root(&key, &value).unwrap(), node.hash());
    }

    #[test]
    fn bitmap_below_start_is_malformed() {
        let mut bitmap = B256::ZERO;
        bitmap.set_bit(2);
        let proof = LeafProof::new(vec![MergeValue::zero(); 2], bitmap, 10, B256::ZERO);
        assert_eq!(
            proof.check_shape(),
            Err(ProofError::BitmapBelowStart { start_index: 10 })
        );
    }

    #[test]
    fn bitmap_at_start_without_short_cut_is_malformed() {
        let mut bitmap = B256::ZERO;
        bitmap.set_bit(10);
        let proof = LeafProof::new(vec![MergeValue::zero(); 2], bitmap, 10, B256::ZERO);
        assert_eq!(
            proof.check_shape(),
            Err(ProofError::BitmapAtStart { start_index: 10 })
        );
    }

    #[test]
    fn zero_bits_at_start_are_malformed() {
        let proof = LeafProof::new(
            vec![MergeValue::zero()],
            B256::ZERO,
            10,
            key_with_bits(&[10]),
        );
        assert_eq!(
            proof.check_shape(),
            Err(ProofError::ZeroBitsOutOfRange { start_index: 10 })
        );
    }

    #[test]
    fn sibling_count_must_follow_bitmap() {
        let mut bitmap = B256::ZERO;
        bitmap.set_bit(20);
        bitmap.set_bit(30);
        let proof = LeafProof::new(vec![MergeValue::zero(); 2], bitmap, 10, B256::ZERO);
        assert_eq!(
            proof.check_shape(),
            Err(ProofError::SiblingCountMismatch {
                expected: 3,
                actual: 2
            })
        );

        let proof = LeafProof::new(Vec::new(), B256::ZERO, 10, B256::ZERO);
        assert_eq!(proof.check_shape(), Err(ProofError::Empty));
    }

    #[test]
    fn tampered_siblings_change_the_root() {
        let key = key_with_bits(&[0, 7]);
        let value = B256::repeat_byte(0x01);
        let mut bitmap = B256::ZERO;
        bitmap.set_bit(12);
        let siblings = vec![
            MergeValue::Value(B256::repeat_byte(0x02)),
            MergeValue::Value(B256::repeat_byte(0x03)),
        ];
        let proof = LeafProof::new(siblings.clone(), bitmap, 8, key.bits_below(8));
        let root = proof.compute_root(&key, &value).unwrap();

        let mut flipped = proof.clone();
        if let MergeValue::Value(v) = &mut flipped.siblings[1] {
            v.0[31] ^= 1;
        }
        assert_ne!(flipped.compute_root(&key, &value).unwrap(), root);

        let mut swapped = proof.clone();
        swapped.siblings.swap(0, 1);
        assert_ne!(swapped.compute_root(&key, &value).unwrap(), root);

        let mut moved = proof.clone();
        moved.bitmap = B256::ZERO;
        moved.bitmap.set_bit(13);
        assert_ne!(moved.compute_root(&key, &value).unwrap(), root);
    }

    #[test]
    fn root_mismatch_is_not_malformed() {
        let err = ProofError::RootMismatch {
            computed: B256::ZERO,
            expected: B256::repeat_byte(1),
        };
        assert!(!err.is_malformed());
        assert!(ProofError::Empty.is_malformed());
    }
}
