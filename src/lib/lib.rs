//! Profit root submission and Merkle-proof withdrawal verification.
//!
//! Submitters publish a profit root during the Lock phase of a round; after
//! the Challenge phase the root opens for withdrawals, and users redeem their
//! per-token balances by presenting compact sparse-Merkle-tree proofs.
//!
//! The crate is organised hexagonally:
//! - [`domain`]: pure types (leaves, merge values, proofs, rounds, wire format)
//! - [`ports`]: traits for the host collaborators (clock, registry, vault, proof source)
//! - [`adapters`]: in-memory and HTTP implementations of the ports
//! - [`fee_manager`]: the facade exposing `submit`, `withdraw_verification`,
//!   `duration_check` and `current_round`

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod fee_manager;
pub mod ledger;
pub mod ports;
pub mod withdrawal;
