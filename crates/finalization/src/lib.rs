//! # ffg-finalization
//!
//! Casper FFG finality for a UTXO chain whose finalizers act through
//! special transactions ("commits"): deposit, vote, logout, withdraw, slash
//! and admin.
//!
//! ## Overview
//!
//! - **Transition engine**: epochs, dynasties, justification and
//!   finalization, rewards, slashing and withdrawals ([`FinalizationState`])
//! - **Commit validation**: structural, signature and contextual checks of
//!   finalizer commits ([`commits`])
//! - **State repository**: one state per block position, derived either
//!   from a block's commits or from the full block ([`StateRepository`])
//! - **Permissioning**: admin-controlled validator whitelist until
//!   permissioning is ended
//!
//! ## Architecture
//!
//! ```text
//! block processing ──process_new_tip──┐
//! commit relay ───process_new_commits─┼─→ FinalizationService
//! wallet ─────────recommended_vote────┘        │
//!                                              ├── ChainView (block index arena)
//!                                              ├── SignatureChecker (secp256k1)
//!                                              └── Mutex<StateRepository>
//!                                                    └── handle → FinalizationState
//! ```
//!
//! ## Finality
//!
//! ```text
//! checkpoint[e-1] ──2/3 of both dynasties vote (source s, target e-1)──→ JUSTIFIED
//!                                 └── and s == e-2 ──────────────────────→ FINALIZED
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ffg_finalization::{FinalizationApi, FinalizationParams, FinalizationService};
//!
//! let service = FinalizationService::new(
//!     FinalizationParams::regtest(),
//!     AdminParams::default(),
//!     chain,
//!     Arc::new(Secp256k1SignatureChecker::new()),
//! );
//!
//! service.process_new_tip(index.handle, &block)?;
//! let vote = service.recommended_vote(&my_address);
//! ```

pub mod adapters;
pub mod commits;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use commits::{check_finalizer_commit, contextual_check_finalizer_commit, CommitPayload};
pub use config::{AdminParams, ConfigError, FinalizationParams};
pub use domain::{
    AdminCommand, AdminCommandType, AdminKeySet, Checkpoint, CheckpointState, Dynasty, Epoch,
    FinalizationState, InitStatus, SlashingCondition, SlashingEvidence, StateRepository,
    TipOutcome, Ufp64, Validator, Vote, VoteRecord, VoteRecorder,
};
pub use error::{
    CommitError, FinalizationError, FinalizationResult, ProcessorError, ProcessorResult,
    RejectCode,
};
pub use ports::inbound::FinalizationApi;
pub use service::FinalizationService;
