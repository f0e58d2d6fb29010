use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Time-gated stage of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lock = 0,
    Challenge = 1,
    Withdraw = 2,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Lock => "lock",
            Phase::Challenge => "challenge",
            Phase::Withdraw => "withdraw",
        };
        f.write_str(name)
    }
}

/// Phase lengths in blocks.
///
/// A round opens with one Challenge window after its submission, then
/// alternates Withdraw and Lock until the next submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durations {
    pub challenge: u64,
    pub withdraw: u64,
    pub lock: u64,
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            challenge: 3600,
            withdraw: 3360,
            lock: 240,
        }
    }
}

/// The phase in force at `now` and the block at which it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseWindow {
    pub phase: Phase,
    /// First block of the next phase; `None` while no round exists.
    pub closes_at: Option<u64>,
}

impl Durations {
    pub fn new(challenge: u64, withdraw: u64, lock: u64) -> Self {
        Self {
            challenge,
            withdraw,
            lock,
        }
    }

    fn cycle(&self) -> u64 {
        self.withdraw.saturating_add(self.lock)
    }

    /// Phase at block `now` for a round submitted at `submitted_at`.
    ///
    /// Derived on every call; nothing about the phase is ever stored.
    pub fn phase_at(&self, submitted_at: Option<u64>, now: u64) -> Phase {
        self.window(submitted_at, now).phase
    }

    pub fn window(&self, submitted_at: Option<u64>, now: u64) -> PhaseWindow {
        let Some(submitted_at) = submitted_at else {
            return PhaseWindow {
                phase: Phase::Lock,
                closes_at: None,
            };
        };
        let elapsed = now.saturating_sub(submitted_at);
        if elapsed < self.challenge {
            return PhaseWindow {
                phase: Phase::Challenge,
                closes_at: Some(submitted_at.saturating_add(self.challenge)),
            };
        }

        let into_cycle = elapsed - self.challenge;
        // A zero-length cycle never leaves Lock.
        let Some(offset) = into_cycle.checked_rem(self.cycle()) else {
            return PhaseWindow {
                phase: Phase::Lock,
                closes_at: None,
            };
        };
        let cycle_start = now - offset;
        if offset < self.withdraw {
            PhaseWindow {
                phase: Phase::Withdraw,
                closes_at: Some(cycle_start.saturating_add(self.withdraw)),
            }
        } else {
            PhaseWindow {
                phase: Phase::Lock,
                closes_at: Some(cycle_start.saturating_add(self.cycle())),
            }
        }
    }
}

/// One committed epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// Increases by one per accepted submission; scopes consumption records.
    pub index: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub profit_root: B256,
    pub state_trans_tree_root: B256,
    /// Block at which the round was accepted.
    pub submitted_at: u64,
}
