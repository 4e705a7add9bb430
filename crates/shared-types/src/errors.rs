//! # Error Types
//!
//! Errors raised while decoding chain primitives.

use thiserror::Error;

/// Errors raised while walking the instructions of a script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// A push opcode announced more bytes than the script contains.
    #[error("Truncated push at offset {offset}: need {needed} bytes, have {available}")]
    TruncatedPush {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A push-only script contained a non-push opcode.
    #[error("Unexpected opcode 0x{opcode:02x} in push-only script")]
    NotPushOnly { opcode: u8 },
}
