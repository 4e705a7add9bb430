//! # Commit Validation
//!
//! Finalizer commits are transactions whose type is one of deposit, vote,
//! logout, withdraw, slash or admin.
//!
//! - [`extract`]: structural rules per type, decoding into a [`CommitPayload`]
//! - [`checks`]: stateless validation, structure plus vote and admin signatures
//! - [`contextual`]: validation against a finalization state and the
//!   commit's predecessor

pub mod checks;
pub mod contextual;
pub mod extract;

pub use checks::check_finalizer_commit;
pub use contextual::{contextual_check_finalizer_commit, ContextualChecker};
pub use extract::CommitPayload;
