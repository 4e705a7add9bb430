//! # Votes
//!
//! A vote is a finalizer's statement that it links checkpoint
//! `source_epoch` to checkpoint `target_epoch` (whose hash is
//! `target_hash`).
//!
//! ## Encoding
//!
//! Payload bincode over the serde derive, a fixed 60-byte little-endian
//! layout:
//!
//! ```text
//! validator_address (20) | target_hash (32) | source_epoch (4) | target_epoch (4)
//! ```
//!
//! The signing message is `sha256(encode(vote))`.

use super::payload;
use super::Epoch;
use serde::{Deserialize, Serialize};
use shared_types::{sha256, Address, Hash, Script};

/// A finalizer vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vote {
    pub validator_address: Address,
    pub target_hash: Hash,
    pub source_epoch: Epoch,
    pub target_epoch: Epoch,
}

impl Vote {
    pub const ENCODED_LEN: usize = 60;

    pub fn new(
        validator_address: Address,
        target_hash: Hash,
        source_epoch: Epoch,
        target_epoch: Epoch,
    ) -> Self {
        Self {
            validator_address,
            target_hash,
            source_epoch,
            target_epoch,
        }
    }

    /// Bincode payload encoding, [`Vote::ENCODED_LEN`] bytes.
    pub fn encode(&self) -> Vec<u8> {
        payload::encode(self).expect("fixed-size vote always fits the payload limit")
    }

    /// Decode a vote. Anything but exactly [`Vote::ENCODED_LEN`] bytes is
    /// rejected.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        payload::decode(bytes).ok()
    }

    /// Message the validator signs.
    pub fn signing_hash(&self) -> Hash {
        sha256(&self.encode())
    }

    /// Whether this vote's link strictly surrounds `other`'s.
    pub fn surrounds(&self, other: &Vote) -> bool {
        self.source_epoch < other.source_epoch && other.target_epoch < self.target_epoch
    }
}

/// A vote together with the signature it was published with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub vote: Vote,
    pub signature: Vec<u8>,
}

impl VoteRecord {
    pub fn new(vote: Vote, signature: Vec<u8>) -> Self {
        Self { vote, signature }
    }

    /// Signature data of a vote input: `<signature> <vote>`.
    pub fn to_script_sig(&self) -> Script {
        Script::new()
            .push_slice(&self.signature)
            .push_slice(&self.vote.encode())
    }

    /// Decode a vote input's signature data.
    pub fn from_script_sig(script: &Script) -> Option<Self> {
        match script.push_data().ok()?.as_slice() {
            [signature, vote] => Some(Self::new(Vote::decode(vote)?, signature.to_vec())),
            _ => None,
        }
    }

    /// Signature data of a slash input: `<sig1> <vote1> <sig2> <vote2>`.
    pub fn pair_to_script_sig(first: &VoteRecord, second: &VoteRecord) -> Script {
        Script::new()
            .push_slice(&first.signature)
            .push_slice(&first.vote.encode())
            .push_slice(&second.signature)
            .push_slice(&second.vote.encode())
    }

    /// Decode a slash input's signature data.
    pub fn pair_from_script_sig(script: &Script) -> Option<(Self, Self)> {
        match script.push_data().ok()?.as_slice() {
            [sig1, vote1, sig2, vote2] => Some((
                Self::new(Vote::decode(vote1)?, sig1.to_vec()),
                Self::new(Vote::decode(vote2)?, sig2.to_vec()),
            )),
            _ => None,
        }
    }
}
