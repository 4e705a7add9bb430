//! Contextual commit validation
//!
//! Checks a finalizer commit against a finalization state and against the
//! commit it spends. Vote, logout and withdraw commits must spend a commit
//! of an allowed kind that carries the same commitment key, which chains a
//! validator's commits without a separate index.
//!
//! Predecessors are looked up in the mempool first and in the coin view
//! second.

use super::checks::check_finalizer_commit;
use super::extract::CommitPayload;
use crate::domain::{FinalizationState, VoteRecord};
use crate::error::CommitError;
use crate::ports::outbound::{CoinView, MempoolView, SignatureChecker};
use shared_types::{Address, OutPoint, PublicKey, Script, Transaction, TxType};

const VOTE_PREDECESSORS: &[TxType] = &[TxType::Deposit, TxType::Vote];
const WITHDRAW_PREDECESSORS: &[TxType] = &[TxType::Logout, TxType::Vote];

/// Commit validation against one finalization state
pub struct ContextualChecker<'a> {
    state: &'a FinalizationState,
    mempool: &'a dyn MempoolView,
    coins: &'a dyn CoinView,
    signatures: &'a dyn SignatureChecker,
}

impl<'a> ContextualChecker<'a> {
    pub fn new(
        state: &'a FinalizationState,
        mempool: &'a dyn MempoolView,
        coins: &'a dyn CoinView,
        signatures: &'a dyn SignatureChecker,
    ) -> Self {
        Self {
            state,
            mempool,
            coins,
            signatures,
        }
    }

    /// Structural checks, predecessor chaining, then the state transition's
    /// own validation.
    pub fn check(&self, tx: &Transaction) -> Result<CommitPayload, CommitError> {
        let payload = check_finalizer_commit(tx, self.signatures)?;
        let kind = tx.tx_type;
        let invalid = |source| CommitError::invalid_state(kind, source);

        match &payload {
            CommitPayload::Deposit { address, amount, .. } => {
                self.state.validate_deposit(address, *amount).map_err(invalid)?;
            }
            CommitPayload::Vote { record, .. } => {
                self.check_same_commitment(tx, VOTE_PREDECESSORS)?;
                self.state.validate_vote(&record.vote).map_err(invalid)?;
            }
            CommitPayload::Logout { address } => {
                self.check_same_commitment(tx, VOTE_PREDECESSORS)?;
                self.state.validate_logout(address).map_err(invalid)?;
            }
            CommitPayload::Withdraw { address, amount } => {
                let script = self.predecessor_script(tx, WITHDRAW_PREDECESSORS)?;
                let committed = script
                    .extract_finalizer_pubkey()
                    .map(|pubkey| pubkey.address());
                if committed != Some(*address) {
                    return Err(CommitError::PrevScriptMismatch { kind });
                }
                self.state.validate_withdraw(address, *amount).map_err(invalid)?;
            }
            CommitPayload::Slash { first, second } => {
                self.state
                    .is_slashable(&first.vote, &second.vote)
                    .map_err(invalid)?;
                self.check_slash_signatures(first, second)?;
            }
            CommitPayload::Admin { keys, .. } => {
                self.state.validate_admin_keys(keys).map_err(invalid)?;
            }
        }
        Ok(payload)
    }

    /// Kind and output script spent by the single input of `tx`.
    fn predecessor(&self, tx: &Transaction) -> Result<(TxType, Script), CommitError> {
        let not_found = CommitError::PrevTxNotFound { kind: tx.tx_type };
        let prevout = tx.inputs.first().map(|input| input.prevout).ok_or(not_found.clone())?;

        if let Some(prev) = self.mempool.get_transaction(&prevout.txid) {
            let output = prev.outputs.get(prevout.index as usize).ok_or(not_found)?;
            return Ok((prev.tx_type, output.script_pubkey.clone()));
        }
        if !self.coins.have_inputs(tx) {
            return Err(not_found);
        }
        let coin = self.coins.get_coin(&prevout).ok_or(not_found)?;
        Ok((coin.tx_type, coin.output.script_pubkey))
    }

    fn predecessor_script(
        &self,
        tx: &Transaction,
        allowed: &[TxType],
    ) -> Result<Script, CommitError> {
        let (found, script) = self.predecessor(tx)?;
        if !allowed.contains(&found) {
            return Err(CommitError::PrevTxWrongType {
                kind: tx.tx_type,
                found,
            });
        }
        Ok(script)
    }

    fn check_same_commitment(&self, tx: &Transaction, allowed: &[TxType]) -> Result<(), CommitError> {
        let script = self.predecessor_script(tx, allowed)?;
        if script != tx.outputs[0].script_pubkey {
            return Err(CommitError::PrevScriptMismatch { kind: tx.tx_type });
        }
        Ok(())
    }

    /// Commitment key of the validator's latest commit.
    fn validator_key(&self, address: &Address) -> Option<PublicKey> {
        let txid = self.state.last_tx_hash(address)?;
        let script = match self.mempool.get_transaction(&txid) {
            Some(tx) => tx.outputs.first()?.script_pubkey.clone(),
            None => self.coins.get_coin(&OutPoint::new(txid, 0))?.output.script_pubkey,
        };
        script.extract_finalizer_pubkey()
    }

    fn check_slash_signatures(
        &self,
        first: &VoteRecord,
        second: &VoteRecord,
    ) -> Result<(), CommitError> {
        let address = first.vote.validator_address;
        let pubkey = self
            .validator_key(&address)
            .ok_or(CommitError::PrevTxNotFound { kind: TxType::Slash })?;
        if pubkey.address() != address {
            return Err(CommitError::PrevScriptMismatch { kind: TxType::Slash });
        }
        for record in [first, second] {
            if !self
                .signatures
                .verify(&pubkey, &record.vote.signing_hash(), &record.signature)
            {
                return Err(CommitError::InvalidVoteSignature);
            }
        }
        Ok(())
    }
}

/// Validate `tx` against `state`, its predecessor and its signatures.
pub fn contextual_check_finalizer_commit(
    tx: &Transaction,
    state: &FinalizationState,
    mempool: &dyn MempoolView,
    coins: &dyn CoinView,
    signatures: &dyn SignatureChecker,
) -> Result<CommitPayload, CommitError> {
    ContextualChecker::new(state, mempool, coins, signatures).check(tx)
}
