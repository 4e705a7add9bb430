//! Error types for the finalization core
//!
//! Three layers:
//! - [`FinalizationError`]: the closed set of outcomes returned by the
//!   `validate_*` functions of the transition engine
//! - [`CommitError`]: rejection of a finalizer commit by commit validation,
//!   carrying a reject reason and a misbehavior score
//! - [`ProcessorError`]: failures of the state repository entry points

use crate::domain::admin::{ADMIN_MULTISIG_KEYS, ADMIN_MULTISIG_SIGNATURES};
use crate::domain::{Epoch, InitStatus};
use shared_types::{Height, TxType};
use thiserror::Error;

/// Outcome of a transition-engine validation. `Ok(())` is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FinalizationError {
    #[error("Epoch initialization out of sequence: expected epoch {expected}, got {actual}")]
    InitWrongEpoch { expected: Epoch, actual: Epoch },

    #[error("Reward factor is not positive")]
    InitInvalidReward,

    #[error("Deposit below minimum: {amount} < {minimum}")]
    DepositInsufficient { amount: u64, minimum: u64 },

    #[error("Validator already has a deposit")]
    DepositDuplicate,

    #[error("Vote references an unknown checkpoint")]
    VoteMalformed,

    #[error("Vote not cast by a known validator")]
    VoteNotByValidator,

    #[error("Validator is not active in the current or previous dynasty")]
    VoteNotVotable,

    #[error("Validator already voted for target epoch {target_epoch}")]
    VoteAlreadyVoted { target_epoch: Epoch },

    #[error("Vote target hash differs from the recommended target")]
    VoteWrongTargetHash,

    #[error("Vote target epoch {actual} is not the previous epoch {expected}")]
    VoteWrongTargetEpoch { expected: Epoch, actual: Epoch },

    #[error("Vote source epoch {source_epoch} is not justified")]
    VoteSrcEpochNotJustified { source_epoch: Epoch },

    #[error("Validator already logged out")]
    LogoutAlreadyDone,

    #[error("Logout not sent by an active validator")]
    LogoutNotAValidator,

    #[error("Withdrawal is not allowed before the withdrawal epoch")]
    WithdrawTooEarly,

    #[error("Withdrawal not sent by a validator")]
    WithdrawNotAValidator,

    #[error("Requested withdrawal {requested} exceeds withdrawable {available}")]
    WithdrawWrongAmount { requested: u64, available: u64 },

    #[error("Slash evidence contains the same vote twice")]
    SlashSameVote,

    #[error("Slash evidence votes are from different validators")]
    SlashNotSameValidator,

    #[error("Validator has not started validating yet")]
    SlashTooEarly,

    #[error("Validator already slashed")]
    SlashAlreadySlashed,

    #[error("Votes are neither a double vote nor a surround vote")]
    SlashNotValid,

    #[error("Slash evidence references an unknown validator")]
    SlashNotValidator,

    #[error("Validator is not whitelisted")]
    AdminBlacklisted,

    #[error("Admin keys are not authorized")]
    AdminNotAuthorized,
}

/// Result of a transition-engine validation.
pub type FinalizationResult<T = ()> = Result<T, FinalizationError>;

/// Reject code attached to a rejected commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    /// Transaction could not be decoded into its semantic payload.
    Malformed = 0x01,
    /// Transaction decoded but violates a rule.
    Invalid = 0x10,
}

/// Why commit validation rejected a finalizer transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    #[error("Transaction of type {0:?} is not a finalizer commit")]
    NotACommit(TxType),

    #[error("Malformed {kind:?} transaction: {inputs} inputs, {outputs} outputs")]
    Malformed {
        kind: TxType,
        inputs: usize,
        outputs: usize,
    },

    #[error("Output 0 of {kind:?} transaction is not a finalizer commitment")]
    NotCommitScript { kind: TxType },

    #[error("Output 0 of withdraw transaction is not pay-to-pubkey-hash")]
    NotPayToPubkeyHash,

    #[error("Cannot extract validator address from {kind:?} transaction")]
    NoValidatorAddress { kind: TxType },

    #[error("Cannot decode vote data from {kind:?} transaction")]
    VoteDataFormat { kind: TxType },

    #[error("Vote address does not match the commitment key")]
    VoteAddressMismatch,

    #[error("Vote signature does not verify against the validator key")]
    InvalidVoteSignature,

    #[error("Admin output {index} does not decode to a valid command")]
    InvalidAdminCommand { index: usize },

    #[error("Admin transaction ends permissioning more than once")]
    AdminDoubleDisable,

    #[error("Admin command follows the end of permissioning")]
    AdminCommandAfterDisable,

    #[error(
        "Admin witness does not carry a {}-of-{} admin key set",
        ADMIN_MULTISIG_SIGNATURES,
        ADMIN_MULTISIG_KEYS
    )]
    InvalidAdminWitness,

    #[error("Admin witness signature {index} does not verify against admin key {index}")]
    InvalidAdminSignature { index: usize },

    #[error("Previous transaction of {kind:?} commit not found")]
    PrevTxNotFound { kind: TxType },

    #[error("Previous transaction of {kind:?} commit has disallowed type {found:?}")]
    PrevTxWrongType { kind: TxType, found: TxType },

    #[error("{kind:?} commit does not repeat the previous commitment script")]
    PrevScriptMismatch { kind: TxType },

    #[error("{kind:?} commit rejected by finalization state: {source}")]
    InvalidState {
        kind: TxType,
        #[source]
        source: FinalizationError,
    },
}

impl CommitError {
    pub fn invalid_state(kind: TxType, source: FinalizationError) -> Self {
        Self::InvalidState { kind, source }
    }

    /// Stable reject reason reported to peers.
    pub fn reject_reason(&self) -> &'static str {
        use TxType::*;
        match self {
            Self::NotACommit(_) => "bad-commit-type",
            Self::Malformed { kind, .. } => match kind {
                Deposit => "bad-deposit-malformed",
                Vote => "bad-vote-malformed",
                Logout => "bad-logout-malformed",
                Withdraw => "bad-withdraw-malformed",
                Slash => "bad-slash-malformed",
                Admin => "bad-admin-malformed",
                Regular | Coinbase => "bad-commit-malformed",
            },
            Self::NotCommitScript { kind } => match kind {
                Deposit => "bad-deposit-vout-script-invalid-finalizercommit",
                Vote => "bad-vote-vout-script-invalid-finalizercommit",
                Logout => "bad-logout-vout-script-invalid-finalizercommit",
                _ => "bad-commit-vout-script-invalid-finalizercommit",
            },
            Self::NotPayToPubkeyHash => "bad-withdraw-vout-script-invalid-p2pkh",
            Self::NoValidatorAddress { kind } => match kind {
                Deposit => "bad-deposit-cannot-extract-validator-address",
                Logout => "bad-logout-cannot-extract-validator-address",
                Withdraw => "bad-withdraw-cannot-extract-validator-address",
                _ => "bad-commit-cannot-extract-validator-address",
            },
            Self::VoteDataFormat { kind } => match kind {
                Slash => "bad-slash-data-format",
                _ => "bad-vote-data-format",
            },
            Self::VoteAddressMismatch => "bad-vote-address-mismatch",
            Self::InvalidVoteSignature => "bad-vote-signature",
            Self::InvalidAdminCommand { .. } => "bad-admin-invalid-command",
            Self::AdminDoubleDisable => "bad-admin-double-disable",
            Self::AdminCommandAfterDisable => "bad-admin-command-after-disable",
            Self::InvalidAdminWitness => "bad-admin-invalid-witness",
            Self::InvalidAdminSignature { .. } => "bad-admin-signature",
            Self::PrevTxNotFound { kind } => match kind {
                Vote => "bad-vote-no-prev-tx-found",
                Logout => "bad-logout-no-prev-tx-found",
                Withdraw => "bad-withdraw-no-prev-tx-found",
                Slash => "bad-slash-no-prev-tx-found",
                _ => "bad-commit-no-prev-tx-found",
            },
            Self::PrevTxWrongType { kind, .. } => match kind {
                Vote => "bad-vote-prev-not-deposit-or-vote",
                Logout => "bad-logout-prev-not-deposit-or-vote",
                Withdraw => "bad-withdraw-prev-not-logout-or-vote",
                _ => "bad-commit-prev-wrong-type",
            },
            Self::PrevScriptMismatch { kind } => match kind {
                Vote => "bad-vote-not-same-finalizercommit",
                Logout => "bad-logout-not-same-finalizercommit",
                Withdraw => "bad-withdraw-not-same-finalizercommit",
                Slash => "bad-slash-not-same-finalizercommit",
                _ => "bad-commit-not-same-finalizercommit",
            },
            Self::InvalidState { kind, .. } => match kind {
                Deposit => "bad-deposit-invalid-state",
                Vote => "bad-vote-invalid-state",
                Logout => "bad-logout-invalid-state",
                Withdraw => "bad-withdraw-invalid-state",
                Slash => "bad-slash-not-slashable",
                Admin => "bad-admin-not-authorized",
                Regular | Coinbase => "bad-commit-invalid-state",
            },
        }
    }

    pub fn reject_code(&self) -> RejectCode {
        match self {
            Self::Malformed { .. } | Self::VoteDataFormat { .. } | Self::NotACommit(_) => {
                RejectCode::Malformed
            }
            _ => RejectCode::Invalid,
        }
    }

    /// Misbehavior score charged to the peer that relayed the commit.
    ///
    /// Votes rejected only by state are routinely produced on competing
    /// forks and cost nothing.
    pub fn dos_score(&self) -> u32 {
        match self {
            Self::PrevTxNotFound { .. } => 10,
            Self::InvalidState { kind, .. } => match kind {
                TxType::Vote => 0,
                TxType::Admin => 100,
                _ => 10,
            },
            _ => 100,
        }
    }
}

/// Failures of the repository entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("Block index entry {handle} not found")]
    UnknownBlock { handle: u32 },

    #[error("No finalization state for the parent of block at height {height}")]
    ParentStateNotFound { height: Height },

    #[error("Parent state of block at height {height} is not yet {required:?}")]
    ParentNotReady { height: Height, required: InitStatus },

    #[error("Epoch initialization at height {height} failed: {source}")]
    EpochInitialization {
        height: Height,
        #[source]
        source: FinalizationError,
    },

    #[error("Commit {txid} rejected: {source}")]
    Commit {
        txid: String,
        #[source]
        source: CommitError,
    },

    #[error("Block at height {height} is not available for replay")]
    BlockUnavailable { height: Height },
}

/// Result type for repository entry points.
pub type ProcessorResult<T = ()> = Result<T, ProcessorError>;
