//! # Domain Layer
//!
//! Pure finalization logic: fixed-point arithmetic, validator and checkpoint
//! records, votes, admin permissioning, the transition engine and the
//! per-block state repository.

pub mod admin;
pub mod checkpoint;
pub mod payload;
pub mod repository;
pub mod slashing;
pub mod state;
pub mod ufp64;
pub mod validator;
pub mod vote;

/// Epoch number. Epoch 0 holds only the genesis block.
pub type Epoch = u32;

/// Dynasty number. Advances by one each time finalization progresses.
pub type Dynasty = u32;

pub use admin::{AdminCommand, AdminCommandType, AdminKeySet, AdminState};
pub use checkpoint::{Checkpoint, CheckpointState};
pub use repository::{StateRepository, TipOutcome};
pub use slashing::{SlashingCondition, SlashingEvidence, VoteRecorder};
pub use state::{FinalizationState, InitStatus};
pub use ufp64::Ufp64;
pub use validator::{Validator, DEFAULT_END_DYNASTY};
pub use vote::{Vote, VoteRecord};
