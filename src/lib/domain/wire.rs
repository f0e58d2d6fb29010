//! JSON shapes emitted by the profit-proof service.
//!
//! Hex fields arrive with or without a `0x` prefix; balances are quantity
//! strings (`"0xa12bc40"` or decimal).

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use super::leaf::SmtLeaf;
use super::merge::MergeValue;
use super::proof::{LeafProof, ProofError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token: Address,
    pub token_chain_id: u64,
    #[serde(with = "quantity")]
    pub balance: U256,
    #[serde(with = "quantity")]
    pub debt: U256,
}

/// One leaf's proof bundle as returned by `submitter_getProfitProof`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofItem {
    pub path: B256,
    pub leave_bitmap: B256,
    pub token: TokenBalance,
    pub siblings: Vec<MergeValue>,
    pub root: B256,
    /// `(start_index, first_zero_bits)`
    pub no1_merge_value: (u8, B256),
}

impl ProofItem {
    /// The leaf this item commits to, owned by `user`.
    pub fn leaf(&self, user: Address) -> SmtLeaf {
        SmtLeaf::new(
            self.token.token_chain_id,
            self.token.token,
            user,
            self.token.balance,
            self.token.debt,
        )
    }

    pub fn proof(&self) -> LeafProof {
        LeafProof::new(
            self.siblings.clone(),
            self.leave_bitmap,
            self.no1_merge_value.0,
            self.no1_merge_value.1,
        )
    }

    /// Reconstruct this item's root offline; the result is compared with
    /// the root the service reported alongside it.
    pub fn verify(&self, user: Address) -> Result<B256, ProofError> {
        let leaf = self.leaf(user);
        self.proof().verify(&leaf, &self.root)?;
        Ok(self.root)
    }

    /// Whether `path` agrees with the key derived from the token fields.
    pub fn path_matches(&self, user: Address) -> bool {
        self.leaf(user).key().0 == self.path
    }
}

/// JSON-RPC 2.0 envelope around a list of proof items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResponse {
    pub jsonrpc: String,
    pub result: Vec<ProofItem>,
    pub id: u64,
}

impl ProofResponse {
    pub fn new(result: Vec<ProofItem>, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result,
            id,
        }
    }
}

/// Quantity strings: `0x`-prefixed hex or plain decimal.
pub mod quantity {
    use std::str::FromStr;

    use alloy_primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{value:x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(U256::from(n)),
            Raw::Text(s) => U256::from_str(s.trim())
                .map_err(|e| de::Error::custom(format!("invalid quantity {s:?}: {e}"))),
        }
    }
}
