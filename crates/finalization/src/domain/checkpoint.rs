//! Checkpoint entity
//!
//! One checkpoint per epoch. Votes are tallied per source epoch, split by
//! whether the voter is active in the current or the previous dynasty.

use super::Epoch;
use serde::{Deserialize, Serialize};
use shared_types::Address;
use std::collections::{BTreeMap, BTreeSet};

/// Checkpoint finality state
///
/// State progression: Pending → Justified → Finalized
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CheckpointState {
    /// Awaiting a supermajority link
    #[default]
    Pending,
    /// Target of a supermajority link
    Justified,
    /// Justified and directly followed by a justified child
    Finalized,
}

/// Per-epoch record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub state: CheckpointState,
    /// Deposits of the current dynasty when the epoch started
    pub cur_dynasty_deposits: u64,
    /// Deposits of the previous dynasty when the epoch started
    pub prev_dynasty_deposits: u64,
    cur_dynasty_votes: BTreeMap<Epoch, u64>,
    prev_dynasty_votes: BTreeMap<Epoch, u64>,
    vote_set: BTreeSet<Address>,
}

impl Checkpoint {
    /// Create a pending checkpoint with the dynasty deposits snapshot
    pub fn new(cur_dynasty_deposits: u64, prev_dynasty_deposits: u64) -> Self {
        Self {
            cur_dynasty_deposits,
            prev_dynasty_deposits,
            ..Self::default()
        }
    }

    pub fn is_justified(&self) -> bool {
        self.state >= CheckpointState::Justified
    }

    pub fn is_finalized(&self) -> bool {
        self.state == CheckpointState::Finalized
    }

    /// Returns true if state changed
    pub fn justify(&mut self) -> bool {
        if self.state == CheckpointState::Pending {
            self.state = CheckpointState::Justified;
            true
        } else {
            false
        }
    }

    /// Finalize this checkpoint
    ///
    /// Only a justified checkpoint can be finalized. Returns true if state
    /// changed.
    pub fn finalize(&mut self) -> bool {
        if self.state == CheckpointState::Justified {
            self.state = CheckpointState::Finalized;
            true
        } else {
            false
        }
    }

    /// Current-dynasty votes citing `source_epoch`
    pub fn cur_dynasty_votes(&self, source_epoch: Epoch) -> u64 {
        self.cur_dynasty_votes.get(&source_epoch).copied().unwrap_or(0)
    }

    /// Previous-dynasty votes citing `source_epoch`
    pub fn prev_dynasty_votes(&self, source_epoch: Epoch) -> u64 {
        self.prev_dynasty_votes.get(&source_epoch).copied().unwrap_or(0)
    }

    pub fn add_cur_dynasty_votes(&mut self, source_epoch: Epoch, amount: u64) {
        let votes = self.cur_dynasty_votes.entry(source_epoch).or_insert(0);
        *votes = votes.saturating_add(amount);
    }

    pub fn add_prev_dynasty_votes(&mut self, source_epoch: Epoch, amount: u64) {
        let votes = self.prev_dynasty_votes.entry(source_epoch).or_insert(0);
        *votes = votes.saturating_add(amount);
    }

    pub fn has_voted(&self, validator: &Address) -> bool {
        self.vote_set.contains(validator)
    }

    /// Returns false if the validator already voted
    pub fn record_voter(&mut self, validator: Address) -> bool {
        self.vote_set.insert(validator)
    }

    pub fn voter_count(&self) -> usize {
        self.vote_set.len()
    }
}
