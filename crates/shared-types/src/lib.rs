//! # Shared Types Crate
//!
//! Chain primitives used by the finalization core and its collaborators.
//!
//! ## Contents
//!
//! - **Entities**: `Transaction`, `TxIn`, `TxOut`, `OutPoint`, `Block`,
//!   `BlockHeader`, `BlockIndex`
//! - **Scripts**: the `Script` byte container, its opcode set and the
//!   standard templates finalizer commits are built from
//! - **Crypto**: `sha256` and address derivation from public keys

pub mod crypto;
pub mod entities;
pub mod errors;
pub mod script;

pub use crypto::*;
pub use entities::*;
pub use errors::*;
pub use script::Script;
