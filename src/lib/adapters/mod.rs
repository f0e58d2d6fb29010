pub mod manual_clock;
pub mod memory_registry;
pub mod memory_vault;
pub mod profit_tree;
pub mod rpc_proof_source;
