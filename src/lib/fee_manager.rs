use alloy_primitives::{Address, B256};
use tracing::{info, warn};

use crate::domain::leaf::SmtLeaf;
use crate::domain::round::{Durations, Phase, PhaseWindow, Round};
use crate::error::{FeeManagerError, Operation, Result};
use crate::ledger::SubmissionLedger;
use crate::ports::clock::BlockClock;
use crate::ports::registry::SubmitterRegistry;
use crate::ports::vault::TokenVault;
use crate::ports::Payout;
use crate::withdrawal::{WithdrawBatch, WithdrawalProcessor};

/// Profit-root submission and withdrawal engine.
///
/// Generic over the host collaborators: `BlockClock` (current block),
/// `SubmitterRegistry` (margin lookup) and `TokenVault` (payouts). All state
/// transitions take `&mut self`, so calls are serialised by the owner the
/// same way a host chain orders transactions.
pub struct FeeManager<C: BlockClock, R: SubmitterRegistry, V: TokenVault> {
    clock: C,
    registry: R,
    vault: V,
    durations: Durations,
    ledger: SubmissionLedger,
    withdrawals: WithdrawalProcessor,
}

impl<C: BlockClock, R: SubmitterRegistry, V: TokenVault> FeeManager<C, R, V> {
    pub fn new(clock: C, registry: R, vault: V, durations: Durations) -> Self {
        Self {
            clock,
            registry,
            vault,
            durations,
            ledger: SubmissionLedger::new(),
            withdrawals: WithdrawalProcessor::new(),
        }
    }

    /// Publish a new round.
    ///
    /// Checked in order: submitter margin, block-range chaining, then phase,
    /// so a broken range is reported whatever the phase.
    pub fn submit(
        &mut self,
        submitter: Address,
        start_block: u64,
        end_block: u64,
        profit_root: B256,
        state_trans_tree_root: B256,
    ) -> Result<Round> {
        if !self.registry.is_submitter(submitter) {
            warn!(%submitter, "submit rejected: not a funded submitter");
            return Err(FeeManagerError::NotSubmitter(submitter));
        }

        if let Err(mismatch) = self.ledger.check_range(start_block, end_block) {
            warn!(%submitter, start_block, end_block, %mismatch, "submit rejected: range");
            return Err(FeeManagerError::RangeMismatch(mismatch));
        }

        let now = self.clock.current_block();
        let phase = self.phase_at(now);
        if phase != Phase::Lock {
            warn!(%submitter, %phase, now, "submit rejected: wrong phase");
            return Err(FeeManagerError::wrong_phase(Operation::Submit, phase));
        }

        let round = self
            .ledger
            .record(start_block, end_block, profit_root, state_trans_tree_root, now)
            .clone();
        info!(
            %submitter,
            round = round.index,
            start_block,
            end_block,
            %profit_root,
            submitted_at = now,
            "profit root submitted"
        );
        Ok(round)
    }

    /// Verify and pay out a batch of leaves against the current profit root.
    pub fn withdraw_verification(
        &mut self,
        caller: Address,
        batch: &WithdrawBatch,
    ) -> Result<Vec<Payout>> {
        let now = self.clock.current_block();
        let phase = self.phase_at(now);
        let round = match (phase, self.ledger.current()) {
            (Phase::Withdraw, Some(round)) => round,
            _ => {
                warn!(%caller, %phase, now, "withdraw rejected: wrong phase");
                return Err(FeeManagerError::wrong_phase(Operation::Withdraw, phase));
            }
        };

        match self.withdrawals.process(round, caller, batch, &self.vault) {
            Ok(payouts) => {
                info!(
                    %caller,
                    round = round.index,
                    leaves = payouts.len(),
                    "withdrawal paid"
                );
                Ok(payouts)
            }
            Err(err) => {
                warn!(%caller, round = round.index, kind = %err.kind(), error = %err, "withdraw rejected");
                Err(err)
            }
        }
    }

    /// Phase at the current block. Recomputed on every call.
    pub fn duration_check(&self) -> Phase {
        self.phase_at(self.clock.current_block())
    }

    /// Current phase together with the block at which it ends.
    pub fn phase_window(&self) -> PhaseWindow {
        self.durations
            .window(self.ledger.last_submission_block(), self.clock.current_block())
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.ledger.current()
    }

    pub fn durations(&self) -> &Durations {
        &self.durations
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    /// Whether `leaf` has been withdrawn in the current round.
    pub fn is_withdrawn(&self, leaf: &SmtLeaf) -> bool {
        self.current_round()
            .is_some_and(|round| self.withdrawals.is_consumed(&leaf.key(), round.index))
    }

    fn phase_at(&self, now: u64) -> Phase {
        self.durations
            .phase_at(self.ledger.last_submission_block(), now)
    }
}
