//! Bincode framing for payloads embedded in scripts.
//!
//! Fixed-width integers, a hard size limit and no trailing bytes, so a
//! payload has exactly one accepted encoding.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Largest payload accepted from a script push.
pub const MAX_PAYLOAD_SIZE: u64 = 10_000;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_PAYLOAD_SIZE)
        .reject_trailing_bytes()
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    options().serialize(value)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, bincode::Error> {
    options().deserialize(bytes)
}
