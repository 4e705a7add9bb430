//! # Hashing Helpers
//!
//! SHA-256 for transaction and block identifiers, Keccak-256 for address
//! derivation.

use crate::entities::{Address, Hash, PublicKey};
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

/// Derive the 160-bit address of a public key.
///
/// The address is the last 20 bytes of the Keccak-256 hash of the compressed
/// SEC1 encoding.
pub fn address_from_pubkey(pubkey: &PublicKey) -> Address {
    let hash = keccak256(pubkey.as_bytes());
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}
