//! secp256k1 vote signatures
//!
//! Votes are signed over `sha256(encode(vote))` with the key the validator
//! committed to. Signatures are 64-byte `r || s`.

use crate::domain::{Vote, VoteRecord};
use crate::ports::outbound::SignatureChecker;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::rand_core::CryptoRngCore;
use shared_types::{Hash, PublicKey};
use tracing::debug;

/// Verifies prehashed ECDSA signatures with `k256`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1SignatureChecker;

impl Secp256k1SignatureChecker {
    pub fn new() -> Self {
        Self
    }
}

impl SignatureChecker for Secp256k1SignatureChecker {
    fn verify(&self, pubkey: &PublicKey, message_hash: &Hash, signature: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(pubkey.as_bytes()) else {
            debug!(pubkey = %hex::encode(pubkey.as_bytes()), "Rejecting invalid public key");
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            debug!("Rejecting malformed signature");
            return false;
        };
        verifying_key.verify_prehash(message_hash, &signature).is_ok()
    }
}

/// A finalizer's signing key.
pub struct VoteSigner {
    signing_key: SigningKey,
}

impl VoteSigner {
    pub fn generate(rng: &mut impl CryptoRngCore) -> Self {
        Self {
            signing_key: SigningKey::random(rng),
        }
    }

    /// Key from 32 secret bytes. `None` if the bytes are not a valid scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        let signing_key = SigningKey::from_bytes(bytes.into()).ok()?;
        Some(Self { signing_key })
    }

    /// Compressed public key.
    pub fn public_key(&self) -> PublicKey {
        let sec1 = self.signing_key.verifying_key().to_sec1_bytes();
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1[..33]);
        PublicKey(bytes)
    }

    /// 64-byte signature over an already hashed message.
    pub fn sign_prehash(&self, message_hash: &Hash) -> Vec<u8> {
        let signed: Result<Signature, _> = self.signing_key.sign_prehash(message_hash);
        // A 32-byte prehash is always accepted
        signed
            .map(|signature| signature.to_bytes().to_vec())
            .unwrap_or_default()
    }

    pub fn sign_vote(&self, vote: Vote) -> VoteRecord {
        let signature = self.sign_prehash(&vote.signing_hash());
        VoteRecord::new(vote, signature)
    }
}
