//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory implementations of the outbound ports and the secp256k1
//! signature checker.

mod block_index;
mod coins;
mod signature_checker;

pub use block_index::MemoryChain;
pub use coins::{MemoryCoinView, MemoryMempool};
pub use signature_checker::{Secp256k1SignatureChecker, VoteSigner};
