//! Operator CLI for profit-proof bundles.
//!
//! Checks proof bundles offline against their reported (or an expected)
//! root, fetches fresh bundles from a submitter, and builds fixture bundles
//! from a list of leaves.
//!
//! Run with:
//!   cargo run --bin profit-proof -- verify --proofs response.json --user 0x…
//!   cargo run --bin profit-proof -- fetch --config config.toml --user 0x… --token 5:0x…
//!   cargo run --bin profit-proof -- build --leaves leaves.json --user 0x…

use std::path::{Path, PathBuf};

use alloy_primitives::{Address, B256};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use profit_withdrawal::adapters::profit_tree::ProfitTree;
use profit_withdrawal::adapters::rpc_proof_source::RpcProofSource;
use profit_withdrawal::config::EngineConfig;
use profit_withdrawal::domain::leaf::SmtLeaf;
use profit_withdrawal::domain::proof::reconstruct_root;
use profit_withdrawal::domain::wire::{ProofItem, ProofResponse};
use profit_withdrawal::ports::proof_source::ProofSource as _;

#[derive(Parser)]
#[command(name = "profit-proof", about = "Inspect and verify profit withdrawal proofs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconstruct every root in a saved JSON-RPC response.
    Verify {
        /// File holding a `submitter_getProfitProof` response.
        #[arg(long)]
        proofs: PathBuf,
        /// Owner of the leaves.
        #[arg(long)]
        user: Address,
        /// Committed profit root to check against instead of each item's reported root.
        #[arg(long)]
        root: Option<B256>,
    },
    /// Request proofs from the configured submitter and verify them.
    Fetch {
        /// Path to the TOML configuration file.
        #[arg(long, default_value = "./config.toml")]
        config: PathBuf,
        #[arg(long)]
        user: Address,
        /// `<chain_id>:<token address>`, repeatable.
        #[arg(long = "token", value_parser = parse_token, required = true)]
        tokens: Vec<(u64, Address)>,
        /// Save the response here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build a tree from a JSON list of leaves and print one user's proofs.
    Build {
        #[arg(long)]
        leaves: PathBuf,
        #[arg(long)]
        user: Address,
    },
}

fn parse_token(s: &str) -> Result<(u64, Address), String> {
    let (chain, token) = s
        .split_once(':')
        .ok_or_else(|| format!("expected <chain_id>:<token>, got {s:?}"))?;
    let chain_id = chain
        .parse::<u64>()
        .map_err(|e| format!("bad chain id {chain:?}: {e}"))?;
    let token = token
        .parse::<Address>()
        .map_err(|e| format!("bad token address {token:?}: {e}"))?;
    Ok((chain_id, token))
}

/// Print one line per item; returns how many failed.
fn report(items: &[ProofItem], user: Address, expected: Option<B256>) -> usize {
    let mut failures = 0;
    for (index, item) in items.iter().enumerate() {
        let leaf = item.leaf(user);
        let label = format!(
            "[{index}] chain {} token {} balance {} debt {}",
            leaf.chain_id, leaf.token, leaf.amount, leaf.debt
        );
        if !item.path_matches(user) {
            warn!(index, path = %item.path, key = %leaf.key(), "path does not match leaf key");
        }
        match reconstruct_root(&leaf, &item.proof()) {
            Ok(computed) => {
                let target = expected.unwrap_or(item.root);
                if computed == target {
                    if computed != item.root {
                        warn!(index, reported = %item.root, "service reported a different root");
                    }
                    println!("{label}: OK {computed}");
                } else {
                    failures += 1;
                    println!(
                        "{label}: FAIL computed {computed}, reported {}, expected {target}",
                        item.root
                    );
                }
            }
            Err(err) => {
                failures += 1;
                println!("{label}: MALFORMED {err}");
            }
        }
    }
    failures
}

fn read_response(path: &Path) -> anyhow::Result<ProofResponse> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read proofs from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("decode {}", path.display()))
}

fn finish(failures: usize, total: usize) -> anyhow::Result<()> {
    if failures > 0 {
        bail!("{failures} of {total} proofs failed");
    }
    info!(total, "all proofs verified");
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Verify { proofs, user, root } => {
            let response = read_response(&proofs)?;
            info!(items = response.result.len(), %user, "verifying saved proofs");
            let failures = report(&response.result, user, root);
            finish(failures, response.result.len())
        }
        Command::Fetch {
            config,
            user,
            tokens,
            out,
        } => {
            let config = EngineConfig::load(&config)
                .with_context(|| format!("load config {}", config.display()))?;
            let Some(rpc) = config.rpc else {
                bail!("[rpc] section is required for fetch");
            };
            let source = RpcProofSource::with_timeout(rpc.url, rpc.timeout)?;
            info!(url = source.url(), %user, tokens = tokens.len(), "fetching proofs");

            let items = source
                .fetch_profit_proofs(user, &tokens)
                .await
                .context("fetch profit proofs")?;
            let failures = report(&items, user, None);

            if let Some(out) = out {
                let json = serde_json::to_string_pretty(&ProofResponse::new(items.clone(), 1))?;
                std::fs::write(&out, json)
                    .with_context(|| format!("write {}", out.display()))?;
                info!(path = %out.display(), "response saved");
            }
            finish(failures, items.len())
        }
        Command::Build { leaves, user } => {
            let content = std::fs::read_to_string(&leaves)
                .with_context(|| format!("read leaves from {}", leaves.display()))?;
            let leaves: Vec<SmtLeaf> =
                serde_json::from_str(&content).context("decode leaf list")?;
            let tree = ProfitTree::from_leaves(leaves);
            info!(leaves = tree.len(), root = %tree.root(), "tree built");

            let items = tree.proofs_for_user(user);
            if items.is_empty() {
                warn!(%user, "user owns no leaves in this tree");
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&ProofResponse::new(items, 1))?
            );
            Ok(())
        }
    }
}
