//! Stateless commit validation
//!
//! Structural rules plus the signatures that only need keys the commit
//! itself carries: the vote signature and the admin multisig.

use super::extract::CommitPayload;
use crate::domain::AdminKeySet;
use crate::error::CommitError;
use crate::ports::outbound::SignatureChecker;
use shared_types::Transaction;

/// Decode `tx` and verify everything that does not depend on chain state.
pub fn check_finalizer_commit(
    tx: &Transaction,
    signatures: &dyn SignatureChecker,
) -> Result<CommitPayload, CommitError> {
    let payload = CommitPayload::extract(tx)?;
    match &payload {
        CommitPayload::Vote { record, pubkey } => {
            if !signatures.verify(pubkey, &record.vote.signing_hash(), &record.signature) {
                return Err(CommitError::InvalidVoteSignature);
            }
        }
        CommitPayload::Admin { keys, .. } => check_admin_signatures(tx, keys, signatures)?,
        _ => {}
    }
    Ok(payload)
}

/// Each admin key must sign the witness-free transaction hash, in key order.
fn check_admin_signatures(
    tx: &Transaction,
    keys: &AdminKeySet,
    signatures: &dyn SignatureChecker,
) -> Result<(), CommitError> {
    let message_hash = tx.signature_hash();
    let witness = &tx.inputs[0].witness;
    let (_script, witness_signatures) = witness
        .split_last()
        .ok_or(CommitError::InvalidAdminWitness)?;
    for (index, (key, signature)) in keys.iter().zip(witness_signatures).enumerate() {
        if !signatures.verify(key, &message_hash, signature) {
            return Err(CommitError::InvalidAdminSignature { index });
        }
    }
    Ok(())
}
