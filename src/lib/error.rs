use alloy_primitives::{Address, B256, U256};

use crate::domain::leaf::LeafKey;
use crate::domain::proof::ProofError;
use crate::domain::round::Phase;
use crate::ports::vault::VaultError;

/// Which public operation was gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Submit,
    Withdraw,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Submit => f.write_str("submit"),
            Operation::Withdraw => f.write_str("withdraw"),
        }
    }
}

/// Whether a phase-gated caller should wait or has missed its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTiming {
    TooEarly,
    TooLate,
}

impl PhaseTiming {
    /// Classify `operation` attempted during the wrong `phase`.
    pub fn classify(operation: Operation, phase: Phase) -> Self {
        match (operation, phase) {
            // the previous round's withdraw window has not finished yet
            (Operation::Submit, Phase::Withdraw) => PhaseTiming::TooEarly,
            (Operation::Submit, _) => PhaseTiming::TooLate,
            (Operation::Withdraw, Phase::Lock) => PhaseTiming::TooLate,
            (Operation::Withdraw, _) => PhaseTiming::TooEarly,
        }
    }
}

impl std::fmt::Display for PhaseTiming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseTiming::TooEarly => f.write_str("too early"),
            PhaseTiming::TooLate => f.write_str("too late"),
        }
    }
}

/// Which side of a submitted block range fails to chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMismatch {
    /// `end_block <= start_block`
    EmptyRange { start_block: u64, end_block: u64 },
    /// `start_block` overlaps the previous round.
    StartBehind { start_block: u64, expected: u64 },
    /// `start_block` leaves a gap after the previous round.
    StartAhead { start_block: u64, expected: u64 },
}

impl std::fmt::Display for RangeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeMismatch::EmptyRange {
                start_block,
                end_block,
            } => write!(f, "empty range {start_block}..{end_block}"),
            RangeMismatch::StartBehind {
                start_block,
                expected,
            } => write!(f, "start block {start_block} is behind previous end {expected}"),
            RangeMismatch::StartAhead {
                start_block,
                expected,
            } => write!(f, "start block {start_block} is ahead of previous end {expected}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeeManagerError {
    #[error("{operation} not allowed during {phase} phase ({timing})")]
    WrongPhase {
        operation: Operation,
        phase: Phase,
        timing: PhaseTiming,
    },

    #[error("block range does not chain: {0}")]
    RangeMismatch(RangeMismatch),

    #[error("{0} is not a funded submitter")]
    NotSubmitter(Address),

    #[error("leaf {index}: malformed proof: {reason}")]
    ProofMalformed { index: usize, reason: ProofError },

    #[error("leaf {index}: proof reconstructs {computed}, committed root is {expected}")]
    ProofInvalid {
        index: usize,
        computed: B256,
        expected: B256,
    },

    #[error("leaf {index}: owned by {leaf_user}, caller is {caller}")]
    UserMismatch {
        index: usize,
        leaf_user: Address,
        caller: Address,
    },

    #[error("leaf {index}: {key} already withdrawn in round {round}")]
    AlreadyWithdrawn {
        index: usize,
        key: LeafKey,
        round: u64,
    },

    #[error("leaf {index}: declared amount {declared} differs from committed {committed}")]
    AmountMismatch {
        index: usize,
        declared: U256,
        committed: U256,
    },

    #[error("batch is malformed: {0}")]
    BatchMalformed(String),

    #[error("transfer failed: {0}")]
    TransferFailed(#[from] VaultError),
}

/// Stable tag per failure, for callers that branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    WrongPhase,
    RangeMismatch,
    NotSubmitter,
    ProofMalformed,
    ProofInvalid,
    UserMismatch,
    AlreadyWithdrawn,
    AmountMismatch,
    TransferFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::WrongPhase => "WRONG_PHASE",
            ErrorKind::RangeMismatch => "RANGE_MISMATCH",
            ErrorKind::NotSubmitter => "NOT_SUBMITTER",
            ErrorKind::ProofMalformed => "PROOF_MALFORMED",
            ErrorKind::ProofInvalid => "PROOF_INVALID",
            ErrorKind::UserMismatch => "USER_MISMATCH",
            ErrorKind::AlreadyWithdrawn => "ALREADY_WITHDRAWN",
            ErrorKind::AmountMismatch => "AMOUNT_MISMATCH",
            ErrorKind::TransferFailed => "TRANSFER_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FeeManagerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeeManagerError::WrongPhase { .. } => ErrorKind::WrongPhase,
            FeeManagerError::RangeMismatch(_) => ErrorKind::RangeMismatch,
            FeeManagerError::NotSubmitter(_) => ErrorKind::NotSubmitter,
            FeeManagerError::ProofMalformed { .. } | FeeManagerError::BatchMalformed(_) => {
                ErrorKind::ProofMalformed
            }
            FeeManagerError::ProofInvalid { .. } => ErrorKind::ProofInvalid,
            FeeManagerError::UserMismatch { .. } => ErrorKind::UserMismatch,
            FeeManagerError::AlreadyWithdrawn { .. } => ErrorKind::AlreadyWithdrawn,
            FeeManagerError::AmountMismatch { .. } => ErrorKind::AmountMismatch,
            FeeManagerError::TransferFailed(_) => ErrorKind::TransferFailed,
        }
    }

    pub(crate) fn wrong_phase(operation: Operation, phase: Phase) -> Self {
        FeeManagerError::WrongPhase {
            operation,
            phase,
            timing: PhaseTiming::classify(operation, phase),
        }
    }

    /// Map a per-leaf proof failure onto `ProofMalformed` / `ProofInvalid`.
    pub(crate) fn from_proof(index: usize, err: ProofError) -> Self {
        match err {
            ProofError::RootMismatch { computed, expected } => FeeManagerError::ProofInvalid {
                index,
                computed,
                expected,
            },
            reason => FeeManagerError::ProofMalformed { index, reason },
        }
    }
}

pub type Result<T> = std::result::Result<T, FeeManagerError>;
