//! Finalizer registry entries.

use super::Dynasty;
use shared_types::{Address, Amount, Hash, PublicKey};

/// End dynasty of a validator that never logged out.
pub const DEFAULT_END_DYNASTY: Dynasty = Dynasty::MAX;

/// A registered finalizer.
///
/// `deposit` is stored in scaled units: the coin value at any epoch is
/// `deposit * deposit_scale_factor[epoch]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub address: Address,
    /// Key of the deposit's commitment script. Slash evidence must be
    /// signed with it.
    pub pubkey: PublicKey,
    pub deposit: u64,
    pub start_dynasty: Dynasty,
    pub end_dynasty: Dynasty,
    pub is_slashed: bool,
    /// Deposits of the current dynasty when the validator left.
    pub deposits_at_logout: Amount,
    /// Hash of the latest commit from this validator.
    pub last_transaction_hash: Hash,
}

impl Validator {
    pub fn new(pubkey: PublicKey, deposit: u64, start_dynasty: Dynasty) -> Self {
        Self {
            address: pubkey.address(),
            pubkey,
            deposit,
            start_dynasty,
            end_dynasty: DEFAULT_END_DYNASTY,
            is_slashed: false,
            deposits_at_logout: 0,
            last_transaction_hash: [0; 32],
        }
    }

    /// Active in `dynasty`: started and not yet ended.
    pub fn is_active_in(&self, dynasty: Dynasty) -> bool {
        self.start_dynasty <= dynasty && dynasty < self.end_dynasty
    }

    pub fn has_logged_out(&self) -> bool {
        self.end_dynasty != DEFAULT_END_DYNASTY
    }
}
