use alloy_primitives::B256;

use crate::domain::round::Round;
use crate::error::RangeMismatch;

/// Holds the single current round and enforces block-range chaining.
///
/// Each accepted submission replaces the slot; nothing older is kept.
#[derive(Debug, Default)]
pub struct SubmissionLedger {
    current: Option<Round>,
    next_index: u64,
}

impl SubmissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Round> {
        self.current.as_ref()
    }

    /// Block at which the current round was accepted.
    pub fn last_submission_block(&self) -> Option<u64> {
        self.current.as_ref().map(|r| r.submitted_at)
    }

    /// `end_block` of the current round, or 0 before the first submission.
    pub fn previous_end(&self) -> u64 {
        self.current.as_ref().map_or(0, |r| r.end_block)
    }

    pub fn check_range(&self, start_block: u64, end_block: u64) -> Result<(), RangeMismatch> {
        if end_block <= start_block {
            return Err(RangeMismatch::EmptyRange {
                start_block,
                end_block,
            });
        }
        let expected = self.previous_end();
        if start_block < expected {
            return Err(RangeMismatch::StartBehind {
                start_block,
                expected,
            });
        }
        if start_block > expected {
            return Err(RangeMismatch::StartAhead {
                start_block,
                expected,
            });
        }
        Ok(())
    }

    /// Store a new current round. Callers check range, phase and submitter
    /// first.
    pub fn record(
        &mut self,
        start_block: u64,
        end_block: u64,
        profit_root: B256,
        state_trans_tree_root: B256,
        submitted_at: u64,
    ) -> &Round {
        let round = Round {
            index: self.next_index,
            start_block,
            end_block,
            profit_root,
            state_trans_tree_root,
            submitted_at,
        };
        self.next_index += 1;
        self.current.insert(round)
    }
}
