//! Decoding finalizer commits into their semantic payload.
//!
//! Everything here is stateless: shape of inputs and outputs, script
//! templates and embedded data. Signatures are checked in
//! [`super::checks`], state rules in [`super::contextual`].

use crate::domain::admin::{
    AdminCommand, AdminCommandType, AdminKeySet, ADMIN_MULTISIG_KEYS, ADMIN_MULTISIG_SIGNATURES,
};
use crate::domain::VoteRecord;
use crate::error::CommitError;
use shared_types::{Address, Amount, PublicKey, Script, Transaction, TxType};

/// Most outputs a withdraw may have.
pub const MAX_WITHDRAW_OUTPUTS: usize = 3;

/// What a finalizer commit asks of the finalization state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitPayload {
    Deposit {
        address: Address,
        pubkey: PublicKey,
        amount: Amount,
    },
    Vote {
        record: VoteRecord,
        pubkey: PublicKey,
    },
    Logout {
        address: Address,
    },
    Withdraw {
        address: Address,
        amount: Amount,
    },
    Slash {
        first: VoteRecord,
        second: VoteRecord,
    },
    /// Witness signatures over [`Transaction::signature_hash`] are checked
    /// against `keys` by [`super::check_finalizer_commit`].
    Admin {
        keys: AdminKeySet,
        commands: Vec<AdminCommand>,
    },
}

impl CommitPayload {
    /// Decode `tx`, enforcing every structural rule of its kind.
    pub fn extract(tx: &Transaction) -> Result<Self, CommitError> {
        match tx.tx_type {
            TxType::Deposit => {
                expect_shape(tx, 1.., 1..)?;
                let pubkey = commitment_key(tx)?;
                Ok(Self::Deposit {
                    address: pubkey.address(),
                    pubkey,
                    amount: tx.outputs[0].value,
                })
            }
            TxType::Vote => {
                expect_shape(tx, 1..=1, 1..=1)?;
                let pubkey = commitment_key(tx)?;
                let record = VoteRecord::from_script_sig(&tx.inputs[0].script_sig)
                    .ok_or(CommitError::VoteDataFormat { kind: TxType::Vote })?;
                if record.vote.validator_address != pubkey.address() {
                    return Err(CommitError::VoteAddressMismatch);
                }
                Ok(Self::Vote { record, pubkey })
            }
            TxType::Logout => {
                expect_shape(tx, 1..=1, 1..=1)?;
                let pubkey = commitment_key(tx)?;
                Ok(Self::Logout {
                    address: pubkey.address(),
                })
            }
            TxType::Withdraw => {
                expect_shape(tx, 1..=1, 1..=MAX_WITHDRAW_OUTPUTS)?;
                if !tx.outputs[0].script_pubkey.is_pay_to_pubkey_hash() {
                    return Err(CommitError::NotPayToPubkeyHash);
                }
                let pubkey = spending_key(&tx.inputs[0].script_sig)
                    .ok_or(CommitError::NoValidatorAddress { kind: TxType::Withdraw })?;
                Ok(Self::Withdraw {
                    address: pubkey.address(),
                    amount: tx.value_out(),
                })
            }
            TxType::Slash => {
                expect_shape(tx, 1..=1, 1..=1)?;
                let (first, second) = VoteRecord::pair_from_script_sig(&tx.inputs[0].script_sig)
                    .ok_or(CommitError::VoteDataFormat { kind: TxType::Slash })?;
                Ok(Self::Slash { first, second })
            }
            TxType::Admin => {
                expect_shape(tx, 1.., 1..)?;
                let commands = admin_commands(tx)?;
                let keys = admin_witness_keys(&tx.inputs[0].witness)
                    .ok_or(CommitError::InvalidAdminWitness)?;
                Ok(Self::Admin { keys, commands })
            }
            kind @ (TxType::Regular | TxType::Coinbase) => Err(CommitError::NotACommit(kind)),
        }
    }

    /// Validator the commit is about. Admin commits have none.
    pub fn validator_address(&self) -> Option<Address> {
        match self {
            Self::Deposit { address, .. }
            | Self::Logout { address }
            | Self::Withdraw { address, .. } => Some(*address),
            Self::Vote { record, .. } => Some(record.vote.validator_address),
            Self::Slash { first, .. } => Some(first.vote.validator_address),
            Self::Admin { .. } => None,
        }
    }
}

fn expect_shape<I, O>(tx: &Transaction, inputs: I, outputs: O) -> Result<(), CommitError>
where
    I: std::ops::RangeBounds<usize>,
    O: std::ops::RangeBounds<usize>,
{
    if inputs.contains(&tx.inputs.len()) && outputs.contains(&tx.outputs.len()) {
        Ok(())
    } else {
        Err(CommitError::Malformed {
            kind: tx.tx_type,
            inputs: tx.inputs.len(),
            outputs: tx.outputs.len(),
        })
    }
}

/// Key of the commitment script at output 0.
fn commitment_key(tx: &Transaction) -> Result<PublicKey, CommitError> {
    tx.outputs[0]
        .script_pubkey
        .extract_finalizer_pubkey()
        .ok_or(CommitError::NotCommitScript { kind: tx.tx_type })
}

/// Key from `<signature> <pubkey>` signature data.
fn spending_key(script_sig: &Script) -> Option<PublicKey> {
    match script_sig.push_data().ok()?.as_slice() {
        [_signature, pubkey] => PublicKey::from_slice(pubkey),
        _ => None,
    }
}

/// Commands carried by admin outputs, in output order.
///
/// `EndPermissioning` must be the last recognized command.
fn admin_commands(tx: &Transaction) -> Result<Vec<AdminCommand>, CommitError> {
    let mut commands = Vec::new();
    let mut ended = false;
    for (index, output) in tx.outputs.iter().enumerate() {
        let Some(bytes) = output.script_pubkey.admin_command_payload() else {
            continue;
        };
        let command =
            AdminCommand::decode(bytes).ok_or(CommitError::InvalidAdminCommand { index })?;
        let is_end = command.command_type == AdminCommandType::EndPermissioning;
        if ended {
            return Err(if is_end {
                CommitError::AdminDoubleDisable
            } else {
                CommitError::AdminCommandAfterDisable
            });
        }
        ended = is_end;
        commands.push(command);
    }
    Ok(commands)
}

/// Admin key set from a witness ending in the multisig script, preceded by
/// at least the required number of signatures.
fn admin_witness_keys(witness: &[Vec<u8>]) -> Option<AdminKeySet> {
    let (script, signatures) = witness.split_last()?;
    if signatures.len() < ADMIN_MULTISIG_SIGNATURES {
        return None;
    }
    let (required, keys) = Script::from_bytes(script.clone()).extract_multisig()?;
    if required != ADMIN_MULTISIG_SIGNATURES || keys.len() != ADMIN_MULTISIG_KEYS {
        return None;
    }
    keys.try_into().ok()
}
