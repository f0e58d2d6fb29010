use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// Position of a leaf in the profit tree.
///
/// key = keccak256(abi.encode(uint64 chainId, address token, address user))
///
/// The key doubles as the consumption identity: a leaf is withdrawn at most
/// once per round, whatever its committed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeafKey(pub B256);

impl LeafKey {
    pub fn as_b256(&self) -> &B256 {
        &self.0
    }
}

impl From<B256> for LeafKey {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<LeafKey> for B256 {
    fn from(value: LeafKey) -> Self {
        value.0
    }
}

impl std::fmt::Display for LeafKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// One user's committed balance for one token on one chain.
///
/// Built off-system when the profit tree is assembled and only ever read
/// here: the withdrawal path recomputes its key and value hash and proves
/// membership against the committed root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtLeaf {
    pub chain_id: u64,
    pub token: Address,
    pub user: Address,
    pub amount: U256,
    pub debt: U256,
}

impl SmtLeaf {
    pub fn new(chain_id: u64, token: Address, user: Address, amount: U256, debt: U256) -> Self {
        Self {
            chain_id,
            token,
            user,
            amount,
            debt,
        }
    }

    pub fn key(&self) -> LeafKey {
        leaf_key(self.chain_id, self.token, self.user)
    }

    /// Hash stored in the tree for this leaf.
    pub fn value_hash(&self) -> B256 {
        leaf_hash(self.chain_id, self.token, self.user, self.amount, self.debt)
    }

    /// Amount released to the user once the recorded debt is settled.
    pub fn net_amount(&self) -> U256 {
        self.amount.saturating_sub(self.debt)
    }
}

/// keccak256(abi.encode(uint64 chainId, address token, address user))
pub fn leaf_key(chain_id: u64, token: Address, user: Address) -> LeafKey {
    LeafKey(keccak256((chain_id, token, user).abi_encode_params()))
}

/// keccak256(abi.encode(uint64 chainId, address token, address user, uint256 amount, uint256 debt))
///
/// Field order and widths are fixed by the tree builder; changing either
/// breaks every outstanding proof.
pub fn leaf_hash(chain_id: u64, token: Address, user: Address, amount: U256, debt: U256) -> B256 {
    keccak256((chain_id, token, user, amount, debt).abi_encode_params())
}
