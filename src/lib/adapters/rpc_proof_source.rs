use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::Address;
use serde::Deserialize;
use tracing::debug;

use crate::domain::wire::ProofItem;
use crate::ports::proof_source::{ProofSource, ProofSourceError};

pub const PROFIT_PROOF_METHOD: &str = "submitter_getProfitProof";

/// `ProofSource` backed by the submitter's JSON-RPC endpoint.
pub struct RpcProofSource {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Vec<ProofItem>>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl RpcProofSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, ProofSourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(url, client))
    }

    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// `{"jsonrpc":"2.0","method":…,"params":[[[chainId, token], …], user],"id":…}`
pub(crate) fn request_body(id: u64, user: Address, tokens: &[(u64, Address)]) -> serde_json::Value {
    let pairs: Vec<serde_json::Value> = tokens
        .iter()
        .map(|(chain_id, token)| serde_json::json!([chain_id, token]))
        .collect();
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": PROFIT_PROOF_METHOD,
        "params": [pairs, user],
        "id": id,
    })
}

pub(crate) fn parse_response(body: serde_json::Value) -> Result<Vec<ProofItem>, ProofSourceError> {
    let envelope: RpcEnvelope =
        serde_json::from_value(body).map_err(|e| ProofSourceError::Decode(e.to_string()))?;
    if let Some(err) = envelope.error {
        return Err(ProofSourceError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    envelope
        .result
        .ok_or_else(|| ProofSourceError::Decode("response has neither result nor error".into()))
}

impl ProofSource for RpcProofSource {
    async fn fetch_profit_proofs(
        &self,
        user: Address,
        tokens: &[(u64, Address)],
    ) -> Result<Vec<ProofItem>, ProofSourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(url = %self.url, %user, tokens = tokens.len(), id, "requesting profit proofs");

        let body: serde_json::Value = self
            .client
            .post(&self.url)
            .json(&request_body(id, user, tokens))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let items = parse_response(body)?;
        debug!(id, items = items.len(), "profit proofs received");
        Ok(items)
    }
}
