//! # Slashing Conditions
//!
//! The two Casper commandments:
//!
//! 1. No Double Vote: two distinct votes for the same target epoch
//! 2. No Surround Vote: one vote's link strictly contains the other's
//!
//! [`VoteRecorder`] remembers the votes seen from each validator and turns a
//! conflicting pair into [`SlashingEvidence`], from which a slash
//! transaction is built.

use super::vote::{Vote, VoteRecord};
use super::Epoch;
use shared_types::{Address, OutPoint, Transaction, TxIn, TxOut, TxType};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashingCondition {
    DoubleVote,
    SurroundVote,
}

/// Which commandment `first` and `second` break together, if any.
///
/// Symmetric in its arguments. Votes from different validators never
/// conflict, nor do votes for the same target hash.
pub fn detect_slashing_condition(first: &Vote, second: &Vote) -> Option<SlashingCondition> {
    if first.target_hash == second.target_hash
        || first.validator_address != second.validator_address
    {
        return None;
    }
    if first.target_epoch == second.target_epoch {
        return Some(SlashingCondition::DoubleVote);
    }
    if first.surrounds(second) || second.surrounds(first) {
        return Some(SlashingCondition::SurroundVote);
    }
    None
}

/// Two signed votes from the same validator that break a commandment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashingEvidence {
    pub condition: SlashingCondition,
    pub first: VoteRecord,
    pub second: VoteRecord,
}

impl SlashingEvidence {
    pub fn validator(&self) -> Address {
        self.first.vote.validator_address
    }

    /// Slash transaction spending `prevout` with this evidence.
    pub fn to_transaction(&self, prevout: OutPoint, output: TxOut) -> Transaction {
        let script_sig = VoteRecord::pair_to_script_sig(&self.first, &self.second);
        Transaction::new(
            TxType::Slash,
            vec![TxIn::new(prevout, script_sig)],
            vec![output],
        )
    }
}

/// Votes seen per validator, keyed by target epoch.
#[derive(Debug, Default)]
pub struct VoteRecorder {
    records: HashMap<Address, BTreeMap<Epoch, VoteRecord>>,
}

impl VoteRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a vote, returning evidence if it conflicts with one already
    /// seen. Only the first vote per target epoch is kept.
    pub fn record(&mut self, record: VoteRecord) -> Option<SlashingEvidence> {
        let votes = self.records.entry(record.vote.validator_address).or_default();

        let conflict = votes.values().find_map(|seen| {
            detect_slashing_condition(&seen.vote, &record.vote).map(|condition| (condition, seen))
        });
        if let Some((condition, seen)) = conflict {
            warn!(
                validator = %hex::encode(record.vote.validator_address),
                ?condition,
                first_target = seen.vote.target_epoch,
                second_target = record.vote.target_epoch,
                "Slashable vote pair detected"
            );
            return Some(SlashingEvidence {
                condition,
                first: seen.clone(),
                second: record,
            });
        }

        votes.entry(record.vote.target_epoch).or_insert(record);
        None
    }

    pub fn votes_of(&self, validator: &Address) -> Option<&BTreeMap<Epoch, VoteRecord>> {
        self.records.get(validator)
    }

    /// Prune old epochs to prevent unbounded growth.
    pub fn prune_before(&mut self, epoch: Epoch) {
        for votes in self.records.values_mut() {
            votes.retain(|&target, _| target >= epoch);
        }
        self.records.retain(|_, votes| !votes.is_empty());
    }
}
