use std::sync::atomic::{AtomicU64, Ordering};

use crate::ports::clock::BlockClock;

/// Block clock advanced by hand, for tests and offline tooling.
#[derive(Debug, Default)]
pub struct ManualClock {
    block: AtomicU64,
}

impl ManualClock {
    pub fn new(block: u64) -> Self {
        Self {
            block: AtomicU64::new(block),
        }
    }

    pub fn set(&self, block: u64) {
        self.block.store(block, Ordering::SeqCst);
    }

    /// Move forward by `blocks` and return the new height.
    pub fn advance(&self, blocks: u64) -> u64 {
        self.block.fetch_add(blocks, Ordering::SeqCst) + blocks
    }
}

impl BlockClock for ManualClock {
    fn current_block(&self) -> u64 {
        self.block.load(Ordering::SeqCst)
    }
}
