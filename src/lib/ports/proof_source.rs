use alloy_primitives::Address;
use std::future::Future;

use crate::domain::wire::ProofItem;

/// Port for the off-system profit-tree service.
///
/// Implementations:
/// - `RpcProofSource` (JSON-RPC over HTTP)
/// - `ProfitTree` (in-process reference tree)
pub trait ProofSource: Send + Sync {
    /// Proof bundles for `user`'s balance of each `(chain_id, token)`.
    fn fetch_profit_proofs(
        &self,
        user: Address,
        tokens: &[(u64, Address)],
    ) -> impl Future<Output = Result<Vec<ProofItem>, ProofSourceError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ProofSourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("no proof for token {token} on chain {chain_id}")]
    Missing { chain_id: u64, token: Address },
}
