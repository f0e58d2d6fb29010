use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use parking_lot::RwLock;

use crate::ports::registry::SubmitterRegistry;

/// In-memory submitter registry: address → posted margin.
#[derive(Debug, Default)]
pub struct InMemorySubmitterRegistry {
    margins: RwLock<HashMap<Address, U256>>,
}

impl InMemorySubmitterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submitter(submitter: Address, margin: U256) -> Self {
        let registry = Self::new();
        registry.set_margin(submitter, margin);
        registry
    }

    pub fn set_margin(&self, submitter: Address, margin: U256) {
        self.margins.write().insert(submitter, margin);
    }

    pub fn remove(&self, submitter: Address) {
        self.margins.write().remove(&submitter);
    }
}

impl SubmitterRegistry for InMemorySubmitterRegistry {
    fn margin(&self, submitter: Address) -> U256 {
        self.margins
            .read()
            .get(&submitter)
            .copied()
            .unwrap_or_default()
    }
}
