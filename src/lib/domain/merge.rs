//! Sparse-Merkle-tree node algebra.
//!
//! Nodes are Keccak-256 hashes over 32-byte ABI words, so every preimage
//! can be reproduced on-chain with `abi.encode`. Key bits are addressed
//! least-significant first: bit `i` lives in byte `i / 8` at position `i % 8`.

use alloy_primitives::{Keccak256, B256};
use serde::{Deserialize, Serialize};

/// Domain tag of an ordinary two-child merge.
pub const MERGE_NORMAL: u8 = 1;
/// Domain tag of a node compressed with a run of zero siblings.
pub const MERGE_ZEROS: u8 = 2;

/// Bit addressing over a 256-bit tree path.
pub trait PathBits: Sized {
    fn get_bit(&self, i: u8) -> bool;
    fn set_bit(&mut self, i: u8);
    fn clear_bit(&mut self, i: u8);
    /// Keeps bits `start..=255`.
    fn copy_bits(&self, start: u8) -> Self;
    /// Keeps bits `0..end`.
    fn bits_below(&self, end: u8) -> Self;
    /// Key of the node one level above `height`: bits `0..=height` cleared.
    fn parent_path(&self, height: u8) -> Self;
}

impl PathBits for B256 {
    fn get_bit(&self, i: u8) -> bool {
        (self.0[usize::from(i / 8)] >> (i % 8)) & 1 != 0
    }

    fn set_bit(&mut self, i: u8) {
        self.0[usize::from(i / 8)] |= 1 << (i % 8);
    }

    fn clear_bit(&mut self, i: u8) {
        self.0[usize::from(i / 8)] &= !(1 << (i % 8));
    }

    fn copy_bits(&self, start: u8) -> Self {
        let first = usize::from(start / 8);
        let mut out = B256::ZERO;
        out.0[first..].copy_from_slice(&self.0[first..]);
        out.0[first] &= 0xFFu8 << (start % 8);
        out
    }

    fn bits_below(&self, end: u8) -> Self {
        let mut out = *self;
        for i in end..=u8::MAX {
            out.clear_bit(i);
        }
        out
    }

    fn parent_path(&self, height: u8) -> Self {
        if height == u8::MAX {
            B256::ZERO
        } else {
            self.copy_bits(height + 1)
        }
    }
}

/// One node on a proof path.
///
/// The serde form is externally tagged, which is exactly the shape the
/// profit-proof service emits: `{"Value": "…"}`, `{"MergeWithZero": {…}}`
/// or `{"ShortCut": {…}}`. A payload naming two variants does not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeValue {
    Value(B256),
    MergeWithZero {
        base_node: B256,
        zero_bits: B256,
        zero_count: u8,
    },
    ShortCut {
        key: B256,
        value: B256,
        height: u8,
    },
}

impl MergeValue {
    pub const fn zero() -> Self {
        MergeValue::Value(B256::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, MergeValue::Value(v) if v.is_zero())
    }

    /// The 32-byte node this value stands for.
    pub fn hash(&self) -> B256 {
        match self {
            MergeValue::Value(v) => *v,
            MergeValue::MergeWithZero {
                base_node,
                zero_bits,
                zero_count,
            } => keccak_words(&[word(MERGE_ZEROS), *base_node, *zero_bits, word(*zero_count)]),
            MergeValue::ShortCut { key, value, height } => {
                into_merge_value(*key, *value, *height).hash()
            }
        }
    }
}

impl Default for MergeValue {
    fn default() -> Self {
        Self::zero()
    }
}

fn word(byte: u8) -> B256 {
    B256::with_last_byte(byte)
}

fn keccak_words(words: &[B256]) -> B256 {
    let mut hasher = Keccak256::new();
    for w in words {
        hasher.update(w);
    }
    hasher.finalize()
}

/// keccak256(abi.encode(uint8 height, bytes32 baseKey, bytes32 value))
pub fn hash_base_node(base_height: u8, base_key: &B256, base_value: &B256) -> B256 {
    keccak_words(&[word(base_height), *base_key, *base_value])
}

/// State of a leaf after it has been merged with `zero_count` empty
/// siblings, the right-hand positions of which are recorded in `zero_bits`.
pub fn leaf_zero_run(key: &B256, value: &B256, zero_bits: B256, zero_count: u8) -> MergeValue {
    if zero_count == 0 || value.is_zero() {
        return MergeValue::Value(*value);
    }
    MergeValue::MergeWithZero {
        base_node: hash_base_node(0, &key.parent_path(0), value),
        zero_bits,
        zero_count,
    }
}

/// Collapse a single-occupant subtree of the given height into one node.
pub fn into_merge_value(key: B256, value: B256, height: u8) -> MergeValue {
    leaf_zero_run(&key, &value, key.bits_below(height), height)
}

/// Parent of `lhs` and `rhs` at `height`.
///
/// Two non-empty children hash as
/// `keccak256(abi.encode(uint8 1, uint8 height, bytes32 nodeKey, bytes32 lhs, bytes32 rhs))`;
/// a child paired with an empty sibling is folded into a `MergeWithZero`.
pub fn merge(height: u8, node_key: &B256, lhs: &MergeValue, rhs: &MergeValue) -> MergeValue {
    match (lhs.is_zero(), rhs.is_zero()) {
        (true, true) => MergeValue::zero(),
        (true, false) => merge_with_zero(height, node_key, rhs, true),
        (false, true) => merge_with_zero(height, node_key, lhs, false),
        (false, false) => MergeValue::Value(keccak_words(&[
            word(MERGE_NORMAL),
            word(height),
            *node_key,
            lhs.hash(),
            rhs.hash(),
        ])),
    }
}

/// `set_bit` is true when the empty sibling sits on the left, i.e. `value`
/// is the right child.
fn merge_with_zero(height: u8, node_key: &B256, value: &MergeValue, set_bit: bool) -> MergeValue {
    match value {
        MergeValue::Value(v) => {
            let mut zero_bits = B256::ZERO;
            if set_bit {
                zero_bits.set_bit(height);
            }
            MergeValue::MergeWithZero {
                base_node: hash_base_node(height, node_key, v),
                zero_bits,
                zero_count: 1,
            }
        }
        MergeValue::MergeWithZero {
            base_node,
            zero_bits,
            zero_count,
        } => {
            let mut zero_bits = *zero_bits;
            if set_bit {
                zero_bits.set_bit(height);
            }
            MergeValue::MergeWithZero {
                base_node: *base_node,
                zero_bits,
                // 256 consecutive zero merges wrap to 0, as in the tree builder
                zero_count: zero_count.wrapping_add(1),
            }
        }
        MergeValue::ShortCut { key, value, height: h } => {
            merge_with_zero(height, node_key, &into_merge_value(*key, *value, *h), set_bit)
        }
    }
}
