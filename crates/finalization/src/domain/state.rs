//! # Finalization State
//!
//! The transition engine. Owns the validator registry, the checkpoint ledger
//! and the admin sub-state, and exposes a `validate_*`/`process_*` pair per
//! commit kind plus the epoch-boundary transition.
//!
//! Every `process_*` must be preceded by a successful `validate_*` on the
//! same state. Calling `process_*` on a state that does not satisfy its
//! preconditions is an invariant violation and panics.
//!
//! ## Epoch boundary
//!
//! ```text
//! initialize_epoch(h)
//!   ├─ snapshot dynasty deposits into checkpoint[e]
//!   ├─ rescale deposit_scale_factor[e], carry total_slashed[e]
//!   ├─ recompute reward_factor
//!   ├─ no active finalizers? ── justify e-1, finalize e-2 if justified
//!   ├─ increment_dynasty (needs checkpoint[e-2] finalized)
//!   └─ expected_source_epoch = last_justified_epoch
//! ```

use super::admin::{AdminCommand, AdminKeySet, AdminState};
use super::checkpoint::Checkpoint;
use super::slashing::detect_slashing_condition;
use super::validator::{Validator, DEFAULT_END_DYNASTY};
use super::vote::{Vote, VoteRecord};
use super::{Dynasty, Epoch, Ufp64};
use crate::commits::{check_finalizer_commit, CommitPayload};
use crate::config::{AdminParams, FinalizationParams};
use crate::error::{CommitError, FinalizationError, FinalizationResult, ProcessorError};
use crate::metrics;
use crate::ports::outbound::SignatureChecker;
use shared_types::{
    Address, Amount, BlockIndex, Hash, Height, OutPoint, PublicKey, Transaction, TxType,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// How far a state has been derived.
///
/// `New → FromCommits → Completed`, or `New → Completed`. `Completed` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InitStatus {
    /// Copied from the parent, nothing applied yet
    New,
    /// Derived from the block's commits only
    FromCommits,
    /// Derived from the fully validated block
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StateData {
    checkpoints: BTreeMap<Epoch, Checkpoint>,
    validators: HashMap<Address, Validator>,
    deposit_scale_factor: BTreeMap<Epoch, Ufp64>,
    total_slashed: BTreeMap<Epoch, Amount>,
    dynasty_deltas: BTreeMap<Dynasty, i128>,
    dynasty_start_epoch: BTreeMap<Dynasty, Epoch>,
    current_epoch: Epoch,
    current_dynasty: Dynasty,
    cur_dyn_deposits: u64,
    prev_dyn_deposits: u64,
    expected_source_epoch: Epoch,
    last_finalized_epoch: Epoch,
    last_justified_epoch: Epoch,
    recommended_target_hash: Hash,
    recommended_target_epoch: Epoch,
    last_voter_rescale: Ufp64,
    last_non_voter_rescale: Ufp64,
    reward_factor: Ufp64,
    admin: AdminState,
}

/// Finalization state at one block position.
///
/// Equality compares the finalization data only, never the status.
#[derive(Debug, Clone)]
pub struct FinalizationState {
    params: FinalizationParams,
    data: StateData,
    status: InitStatus,
}

impl PartialEq for FinalizationState {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for FinalizationState {}

fn apply_delta(value: u64, delta: i128) -> u64 {
    (value as i128 + delta).clamp(0, u64::MAX as i128) as u64
}

/// `votes >= 2/3 * deposits`
fn is_supermajority(votes: u64, deposits: u64) -> bool {
    votes as u128 * 3 >= deposits as u128 * 2
}

impl FinalizationState {
    /// Genesis state. Its status is `Completed`.
    pub fn new(params: FinalizationParams, admin_params: &AdminParams) -> Self {
        let data = StateData {
            checkpoints: BTreeMap::from([(0, Checkpoint::default())]),
            validators: HashMap::new(),
            deposit_scale_factor: BTreeMap::from([(0, Ufp64::ONE)]),
            total_slashed: BTreeMap::from([(0, 0)]),
            dynasty_deltas: BTreeMap::new(),
            dynasty_start_epoch: BTreeMap::from([(0, 0)]),
            current_epoch: 0,
            current_dynasty: 0,
            cur_dyn_deposits: 0,
            prev_dyn_deposits: 0,
            expected_source_epoch: 0,
            last_finalized_epoch: 0,
            last_justified_epoch: 0,
            recommended_target_hash: [0; 32],
            recommended_target_epoch: 0,
            last_voter_rescale: Ufp64::ONE,
            last_non_voter_rescale: Ufp64::ONE,
            reward_factor: Ufp64::ZERO,
            admin: AdminState::new(admin_params.admin_keys),
        };
        Self {
            params,
            data,
            status: InitStatus::Completed,
        }
    }

    /// Genesis state moved to the epoch of `tip`, marked `Completed`.
    ///
    /// Used when the history below the tip cannot be replayed. Validators
    /// and vote history are lost; the epoch counters line up with the chain
    /// so the next epoch boundary can be initialized.
    pub fn pinned_at(params: FinalizationParams, admin_params: &AdminParams, tip: &BlockIndex) -> Self {
        let mut state = Self::new(params, admin_params);
        let epoch = params.epoch_of(tip.height);
        for e in 1..=epoch {
            state.data.deposit_scale_factor.insert(e, Ufp64::ONE);
            state.data.total_slashed.insert(e, 0);
        }
        state.data.checkpoints = BTreeMap::from([(epoch, Checkpoint::default())]);
        state.data.current_epoch = epoch;
        state
    }

    /// Fresh `New` copy to derive a child block's state from.
    pub fn derive_child(&self) -> Self {
        Self {
            params: self.params,
            data: self.data.clone(),
            status: InitStatus::New,
        }
    }

    pub fn with_status(mut self, status: InitStatus) -> Self {
        self.status = status;
        self
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn params(&self) -> &FinalizationParams {
        &self.params
    }

    pub fn status(&self) -> InitStatus {
        self.status
    }

    pub fn current_epoch(&self) -> Epoch {
        self.data.current_epoch
    }

    pub fn current_dynasty(&self) -> Dynasty {
        self.data.current_dynasty
    }

    pub fn last_justified_epoch(&self) -> Epoch {
        self.data.last_justified_epoch
    }

    pub fn last_finalized_epoch(&self) -> Epoch {
        self.data.last_finalized_epoch
    }

    pub fn expected_source_epoch(&self) -> Epoch {
        self.data.expected_source_epoch
    }

    pub fn recommended_target_hash(&self) -> Hash {
        self.data.recommended_target_hash
    }

    pub fn recommended_target_epoch(&self) -> Epoch {
        self.data.recommended_target_epoch
    }

    pub fn reward_factor(&self) -> Ufp64 {
        self.data.reward_factor
    }

    pub fn last_voter_rescale(&self) -> Ufp64 {
        self.data.last_voter_rescale
    }

    pub fn last_non_voter_rescale(&self) -> Ufp64 {
        self.data.last_non_voter_rescale
    }

    pub fn cur_dyn_deposits(&self) -> u64 {
        self.data.cur_dyn_deposits
    }

    pub fn prev_dyn_deposits(&self) -> u64 {
        self.data.prev_dyn_deposits
    }

    pub fn deposit_scale_factor_at(&self, epoch: Epoch) -> Option<Ufp64> {
        self.data.deposit_scale_factor.get(&epoch).copied()
    }

    pub fn total_slashed_at(&self, epoch: Epoch) -> Option<Amount> {
        self.data.total_slashed.get(&epoch).copied()
    }

    pub fn dynasty_start_epoch(&self, dynasty: Dynasty) -> Option<Epoch> {
        self.data.dynasty_start_epoch.get(&dynasty).copied()
    }

    pub fn checkpoint(&self, epoch: Epoch) -> Option<&Checkpoint> {
        self.data.checkpoints.get(&epoch)
    }

    pub fn validator(&self, address: &Address) -> Option<&Validator> {
        self.data.validators.get(address)
    }

    pub fn validator_count(&self) -> usize {
        self.data.validators.len()
    }

    pub fn admin_state(&self) -> &AdminState {
        &self.data.admin
    }

    pub fn is_permissioning_active(&self) -> bool {
        self.data.admin.is_permissioning_active()
    }

    fn previous_dynasty(&self) -> Option<Dynasty> {
        self.data.current_dynasty.checked_sub(1)
    }

    fn is_in_current_dynasty(&self, validator: &Validator) -> bool {
        validator.is_active_in(self.data.current_dynasty)
    }

    fn is_in_previous_dynasty(&self, validator: &Validator) -> bool {
        self.previous_dynasty()
            .is_some_and(|dynasty| validator.is_active_in(dynasty))
    }

    /// Validators eligible to vote: active in the current or the previous
    /// dynasty. Sorted by address.
    pub fn active_finalizers(&self) -> Vec<&Validator> {
        let mut active: Vec<&Validator> = self
            .data
            .validators
            .values()
            .filter(|v| self.is_in_current_dynasty(v) || self.is_in_previous_dynasty(v))
            .collect();
        active.sort_by_key(|v| v.address);
        active
    }

    /// Coin value of a validator's deposit at the current epoch. Zero for
    /// unknown or slashed validators.
    pub fn deposit_size(&self, address: &Address) -> Amount {
        match self.data.validators.get(address) {
            Some(validator) if !validator.is_slashed => self
                .deposit_scale_factor(self.data.current_epoch)
                .mul_to_uint(validator.deposit),
            _ => 0,
        }
    }

    /// Vote the validator should cast at this state.
    pub fn recommended_vote(&self, address: &Address) -> Vote {
        Vote::new(
            *address,
            self.data.recommended_target_hash,
            self.data.expected_source_epoch,
            self.data.recommended_target_epoch,
        )
    }

    pub fn last_tx_hash(&self, address: &Address) -> Option<Hash> {
        self.data
            .validators
            .get(address)
            .map(|validator| validator.last_transaction_hash)
    }

    pub fn is_justified_checkpoint(&self, height: Height) -> bool {
        self.params.is_checkpoint(height)
            && self
                .checkpoint(self.params.epoch_of(height))
                .is_some_and(Checkpoint::is_justified)
    }

    pub fn is_finalized_checkpoint(&self, height: Height) -> bool {
        self.params.is_checkpoint(height)
            && self
                .checkpoint(self.params.epoch_of(height))
                .is_some_and(Checkpoint::is_finalized)
    }

    fn deposit_scale_factor(&self, epoch: Epoch) -> Ufp64 {
        self.deposit_scale_factor_at(epoch)
            .unwrap_or_else(|| panic!("deposit scale factor missing for epoch {epoch}"))
    }

    fn total_slashed(&self, epoch: Epoch) -> Amount {
        self.total_slashed_at(epoch)
            .unwrap_or_else(|| panic!("total slashed missing for epoch {epoch}"))
    }

    fn validator_mut(&mut self, address: &Address) -> &mut Validator {
        self.data
            .validators
            .get_mut(address)
            .unwrap_or_else(|| panic!("unknown validator {}", hex::encode(address)))
    }

    fn add_dynasty_delta(&mut self, dynasty: Dynasty, delta: i128) {
        *self.data.dynasty_deltas.entry(dynasty).or_insert(0) += delta;
    }

    // =========================================================================
    // EPOCH BOUNDARY
    // =========================================================================

    /// Enter the epoch starting at `height`.
    ///
    /// On error the state may be partially updated and must be discarded.
    pub fn initialize_epoch(&mut self, height: Height) -> FinalizationResult {
        let new_epoch = self.params.epoch_of(height);
        let expected = self.data.current_epoch + 1;
        if !self.params.is_epoch_start(height) || new_epoch != expected {
            return Err(FinalizationError::InitWrongEpoch {
                expected,
                actual: new_epoch,
            });
        }

        let checkpoint = Checkpoint::new(self.data.cur_dyn_deposits, self.data.prev_dyn_deposits);
        self.data.checkpoints.insert(new_epoch, checkpoint);
        self.data.current_epoch = new_epoch;

        self.data.last_voter_rescale = self.collective_reward().add_uint(1);
        self.data.last_non_voter_rescale = self
            .data
            .last_voter_rescale
            .div(self.data.reward_factor.add_uint(1));
        let scale = self
            .deposit_scale_factor(new_epoch - 1)
            .mul(self.data.last_non_voter_rescale);
        self.data.deposit_scale_factor.insert(new_epoch, scale);

        let slashed = self.total_slashed(new_epoch - 1);
        self.data.total_slashed.insert(new_epoch, slashed);

        if self.deposit_exists() {
            let interest = self
                .params
                .base_interest_factor
                .div(self.sqrt_of_total_deposits());
            let penalty = self
                .params
                .base_penalty_factor
                .mul_uint(self.epochs_since_finalization() as u64);
            self.data.reward_factor = interest.add(penalty);
            if self.data.reward_factor.is_zero() {
                return Err(FinalizationError::InitInvalidReward);
            }
        } else {
            self.data.reward_factor = Ufp64::ZERO;
        }

        // Checked before the dynasty moves so that validators joining at the
        // new dynasty do not suppress the bootstrap justification.
        if self.active_finalizers().is_empty() {
            self.insta_justify();
        }

        self.increment_dynasty();
        self.data.expected_source_epoch = self.data.last_justified_epoch;

        metrics::record_epoch(new_epoch);
        debug!(
            epoch = new_epoch,
            dynasty = self.data.current_dynasty,
            reward_factor = %self.data.reward_factor,
            deposit_scale_factor = %scale,
            "Epoch initialized"
        );
        Ok(())
    }

    fn deposit_exists(&self) -> bool {
        self.data.cur_dyn_deposits > 0 && self.data.prev_dyn_deposits > 0
    }

    fn epochs_since_finalization(&self) -> Epoch {
        self.data.current_epoch - self.data.last_finalized_epoch
    }

    fn sqrt_of_total_deposits(&self) -> Ufp64 {
        let total = self.data.cur_dyn_deposits.max(self.data.prev_dyn_deposits);
        let scaled = self
            .deposit_scale_factor(self.data.current_epoch - 1)
            .mul_to_uint(total);
        Ufp64::sqrt_uint(scaled.saturating_add(1))
    }

    /// Share of the reward paid to everyone for the participation in the
    /// epoch before last. Zero while finalization is stalled.
    fn collective_reward(&self) -> Ufp64 {
        let is_live = self.epochs_since_finalization() <= 2;
        if !self.deposit_exists() || !is_live {
            return Ufp64::ZERO;
        }
        let Some(voted) = self
            .data
            .current_epoch
            .checked_sub(2)
            .and_then(|epoch| self.data.checkpoints.get(&epoch))
        else {
            return Ufp64::ZERO;
        };
        let source = self.data.expected_source_epoch;
        let cur_share = Ufp64::from_ratio(voted.cur_dynasty_votes(source), self.data.cur_dyn_deposits);
        let prev_share =
            Ufp64::from_ratio(voted.prev_dynasty_votes(source), self.data.prev_dyn_deposits);
        cur_share
            .min(prev_share)
            .mul(self.data.reward_factor)
            .div_uint(2)
    }

    fn insta_justify(&mut self) {
        let current = self.data.current_epoch;
        let epoch = current - 1;
        if let Some(checkpoint) = self.data.checkpoints.get_mut(&epoch) {
            checkpoint.justify();
        }
        self.data.last_justified_epoch = epoch;
        metrics::record_justified(epoch);
        info!(epoch, "Checkpoint justified without finalizers");

        if current > 1 {
            let expected_finalized = current - 2;
            if let Some(checkpoint) = self.data.checkpoints.get_mut(&expected_finalized) {
                if checkpoint.is_justified() {
                    checkpoint.finalize();
                    self.data.last_finalized_epoch = expected_finalized;
                    metrics::record_finalized(expected_finalized);
                    info!(epoch = expected_finalized, "Checkpoint finalized without finalizers");
                }
            }
        }
    }

    fn increment_dynasty(&mut self) {
        let current = self.data.current_epoch;
        if current < 3 {
            return;
        }
        let finalized = self
            .data
            .checkpoints
            .get(&(current - 2))
            .is_some_and(Checkpoint::is_finalized);
        if !finalized {
            return;
        }

        self.data.current_dynasty += 1;
        let dynasty = self.data.current_dynasty;
        let delta = self.data.dynasty_deltas.get(&dynasty).copied().unwrap_or(0);
        self.data.prev_dyn_deposits = self.data.cur_dyn_deposits;
        self.data.cur_dyn_deposits = apply_delta(self.data.cur_dyn_deposits, delta);
        self.data.dynasty_start_epoch.insert(dynasty, current);

        let last_finalized = self.data.last_finalized_epoch;
        self.data.checkpoints.retain(|&epoch, _| epoch >= last_finalized);

        metrics::record_dynasty(dynasty);
        info!(
            dynasty,
            epoch = current,
            cur_deposits = self.data.cur_dyn_deposits,
            prev_deposits = self.data.prev_dyn_deposits,
            "Dynasty incremented"
        );
    }

    // =========================================================================
    // DEPOSIT
    // =========================================================================

    pub fn validate_deposit(&self, address: &Address, amount: Amount) -> FinalizationResult {
        if !self.data.admin.is_validator_authorized(address) {
            return Err(FinalizationError::AdminBlacklisted);
        }
        if self.data.validators.contains_key(address) {
            return Err(FinalizationError::DepositDuplicate);
        }
        if amount < self.params.min_deposit_size {
            return Err(FinalizationError::DepositInsufficient {
                amount,
                minimum: self.params.min_deposit_size,
            });
        }
        Ok(())
    }

    /// Register the validator committed to `pubkey`.
    pub fn process_deposit(&mut self, pubkey: &PublicKey, amount: Amount) {
        let address = pubkey.address();
        let scaled = Ufp64::div_to_uint(amount, self.deposit_scale_factor(self.data.current_epoch));
        let start_dynasty = self.data.current_dynasty + 2;
        self.data
            .validators
            .insert(address, Validator::new(*pubkey, scaled, start_dynasty));
        self.add_dynasty_delta(start_dynasty, scaled as i128);

        metrics::record_commit_processed("deposit");
        debug!(
            validator = %hex::encode(address),
            amount,
            scaled,
            start_dynasty,
            "Deposit processed"
        );
    }

    // =========================================================================
    // VOTE
    // =========================================================================

    pub fn is_votable(&self, validator: &Validator, vote: &Vote) -> FinalizationResult {
        let Some(target) = self.data.checkpoints.get(&vote.target_epoch) else {
            return Err(FinalizationError::VoteMalformed);
        };
        if target.has_voted(&validator.address) {
            return Err(FinalizationError::VoteAlreadyVoted {
                target_epoch: vote.target_epoch,
            });
        }
        if vote.target_hash != self.data.recommended_target_hash {
            return Err(FinalizationError::VoteWrongTargetHash);
        }
        let expected_target = self.data.current_epoch.checked_sub(1);
        if expected_target != Some(vote.target_epoch) {
            return Err(FinalizationError::VoteWrongTargetEpoch {
                expected: expected_target.unwrap_or(0),
                actual: vote.target_epoch,
            });
        }
        let Some(source) = self.data.checkpoints.get(&vote.source_epoch) else {
            return Err(FinalizationError::VoteMalformed);
        };
        if !source.is_justified() {
            return Err(FinalizationError::VoteSrcEpochNotJustified {
                source_epoch: vote.source_epoch,
            });
        }
        if !self.is_in_current_dynasty(validator) && !self.is_in_previous_dynasty(validator) {
            return Err(FinalizationError::VoteNotVotable);
        }
        Ok(())
    }

    pub fn validate_vote(&self, vote: &Vote) -> FinalizationResult {
        if !self.data.admin.is_validator_authorized(&vote.validator_address) {
            return Err(FinalizationError::AdminBlacklisted);
        }
        let Some(validator) = self.data.validators.get(&vote.validator_address) else {
            return Err(FinalizationError::VoteNotByValidator);
        };
        self.is_votable(validator, vote)
    }

    pub fn process_vote(&mut self, vote: &Vote) {
        let address = vote.validator_address;
        let (deposit, in_current, in_previous) = {
            let validator = self
                .data
                .validators
                .get(&address)
                .unwrap_or_else(|| panic!("vote from unknown validator {}", hex::encode(address)));
            (
                validator.deposit,
                self.is_in_current_dynasty(validator),
                self.is_in_previous_dynasty(validator),
            )
        };

        let target = self.checkpoint_mut(vote.target_epoch);
        target.record_voter(address);
        if in_current {
            target.add_cur_dynasty_votes(vote.source_epoch, deposit);
        }
        if in_previous {
            target.add_prev_dynasty_votes(vote.source_epoch, deposit);
        }

        if vote.source_epoch == self.data.expected_source_epoch {
            let reward = self.data.reward_factor.mul_to_uint(deposit);
            self.process_reward(&address, reward);
        }

        let cur_deposits = self.data.cur_dyn_deposits;
        let prev_deposits = self.data.prev_dyn_deposits;
        let target = self.checkpoint_mut(vote.target_epoch);
        let cur_votes = target.cur_dynasty_votes(vote.source_epoch);
        let prev_votes = target.prev_dynasty_votes(vote.source_epoch);

        if is_supermajority(cur_votes, cur_deposits)
            && is_supermajority(prev_votes, prev_deposits)
            && target.justify()
        {
            info!(
                epoch = vote.target_epoch,
                source = vote.source_epoch,
                cur_votes,
                prev_votes,
                "Checkpoint justified"
            );
            let finalized = vote.target_epoch == vote.source_epoch + 1 && target.finalize();
            self.data.last_justified_epoch = vote.target_epoch;
            metrics::record_justified(vote.target_epoch);
            if finalized {
                self.data.last_finalized_epoch = vote.target_epoch;
                metrics::record_finalized(vote.target_epoch);
                info!(epoch = vote.target_epoch, "Checkpoint finalized");
            }
        }

        metrics::record_commit_processed("vote");
        debug!(
            validator = %hex::encode(address),
            source = vote.source_epoch,
            target = vote.target_epoch,
            "Vote processed"
        );
    }

    fn checkpoint_mut(&mut self, epoch: Epoch) -> &mut Checkpoint {
        self.data
            .checkpoints
            .get_mut(&epoch)
            .unwrap_or_else(|| panic!("checkpoint missing for epoch {epoch}"))
    }

    fn process_reward(&mut self, address: &Address, reward: u64) {
        let current = self.data.current_dynasty;
        let previous = self.previous_dynasty();
        let validator = self.validator_mut(address);
        validator.deposit = validator.deposit.saturating_add(reward);
        let in_current = validator.is_active_in(current);
        let in_previous = previous.is_some_and(|dynasty| validator.is_active_in(dynasty));
        let end_dynasty = validator.end_dynasty;

        if in_current {
            self.data.cur_dyn_deposits = self.data.cur_dyn_deposits.saturating_add(reward);
        }
        if in_previous {
            self.data.prev_dyn_deposits = self.data.prev_dyn_deposits.saturating_add(reward);
        }
        if end_dynasty < DEFAULT_END_DYNASTY {
            self.add_dynasty_delta(end_dynasty, -(reward as i128));
        }
    }

    // =========================================================================
    // LOGOUT
    // =========================================================================

    pub fn validate_logout(&self, address: &Address) -> FinalizationResult {
        let Some(validator) = self.data.validators.get(address) else {
            return Err(FinalizationError::LogoutNotAValidator);
        };
        if validator.start_dynasty > self.data.current_dynasty {
            return Err(FinalizationError::LogoutNotAValidator);
        }
        let end_dynasty = self
            .data
            .current_dynasty
            .saturating_add(self.params.dynasty_logout_delay);
        if validator.end_dynasty <= end_dynasty {
            return Err(FinalizationError::LogoutAlreadyDone);
        }
        Ok(())
    }

    pub fn process_logout(&mut self, address: &Address) {
        let end_dynasty = self
            .data
            .current_dynasty
            .saturating_add(self.params.dynasty_logout_delay);
        let deposits = self.data.cur_dyn_deposits;
        let validator = self.validator_mut(address);
        validator.end_dynasty = end_dynasty;
        validator.deposits_at_logout = deposits;
        let deposit = validator.deposit;
        self.add_dynasty_delta(end_dynasty, -(deposit as i128));

        metrics::record_commit_processed("logout");
        debug!(validator = %hex::encode(address), end_dynasty, "Logout processed");
    }

    // =========================================================================
    // WITHDRAW
    // =========================================================================

    /// Epoch from which the validator may withdraw. `None` while its end
    /// dynasty has not started.
    fn withdrawal_epoch(&self, validator: &Validator) -> Option<Epoch> {
        if validator.end_dynasty == DEFAULT_END_DYNASTY {
            return None;
        }
        let end_epoch = self.dynasty_start_epoch(validator.end_dynasty + 1)?;
        Some(end_epoch + self.params.withdrawal_epoch_delay)
    }

    pub fn calculate_withdraw_amount(&self, address: &Address) -> FinalizationResult<Amount> {
        let Some(validator) = self.data.validators.get(address) else {
            return Err(FinalizationError::WithdrawNotAValidator);
        };
        let Some(withdrawal_epoch) = self.withdrawal_epoch(validator) else {
            return Err(FinalizationError::WithdrawTooEarly);
        };
        if self.data.current_epoch < withdrawal_epoch {
            return Err(FinalizationError::WithdrawTooEarly);
        }

        let delay = self.params.withdrawal_epoch_delay;
        if !validator.is_slashed {
            let end_epoch = withdrawal_epoch - delay;
            return Ok(self.deposit_scale_factor(end_epoch).mul_to_uint(validator.deposit));
        }

        let base_epoch = withdrawal_epoch.saturating_sub(2 * delay);
        let recently_slashed = self
            .total_slashed(withdrawal_epoch)
            .saturating_sub(self.total_slashed(base_epoch));
        let fraction = Ufp64::from_ratio(
            recently_slashed.saturating_mul(self.params.slash_fraction_multiplier),
            validator.deposits_at_logout,
        );
        let deposit_size = self
            .deposit_scale_factor(withdrawal_epoch)
            .mul_to_uint(validator.deposit);
        if fraction >= Ufp64::ONE {
            Ok(0)
        } else {
            Ok(Ufp64::ONE.sub(fraction).mul_to_uint(deposit_size))
        }
    }

    pub fn validate_withdraw(&self, address: &Address, requested: Amount) -> FinalizationResult {
        let available = self.calculate_withdraw_amount(address)?;
        if requested > available {
            return Err(FinalizationError::WithdrawWrongAmount {
                requested,
                available,
            });
        }
        Ok(())
    }

    pub fn process_withdraw(&mut self, address: &Address) {
        self.data.validators.remove(address);
        metrics::record_commit_processed("withdraw");
        debug!(validator = %hex::encode(address), "Withdraw processed");
    }

    // =========================================================================
    // SLASH
    // =========================================================================

    /// Symmetric in its arguments.
    pub fn is_slashable(&self, first: &Vote, second: &Vote) -> FinalizationResult {
        if first.validator_address != second.validator_address {
            return Err(FinalizationError::SlashNotSameValidator);
        }
        let Some(validator) = self.data.validators.get(&first.validator_address) else {
            return Err(FinalizationError::SlashNotValidator);
        };
        if validator.start_dynasty > self.data.current_dynasty {
            return Err(FinalizationError::SlashTooEarly);
        }
        if validator.is_slashed {
            return Err(FinalizationError::SlashAlreadySlashed);
        }
        if first.target_hash == second.target_hash {
            return Err(FinalizationError::SlashSameVote);
        }
        if detect_slashing_condition(first, second).is_none() {
            return Err(FinalizationError::SlashNotValid);
        }
        Ok(())
    }

    pub fn process_slash(&mut self, first: &Vote, second: &Vote) {
        let address = first.validator_address;
        let condition = detect_slashing_condition(first, second);
        let deposit_size = self.deposit_size(&address);
        let epoch = self.data.current_epoch;
        let slashed = self.data.total_slashed.entry(epoch).or_insert(0);
        *slashed = slashed.saturating_add(deposit_size);

        let current_dynasty = self.data.current_dynasty;
        let deposits = self.data.cur_dyn_deposits;
        let validator = self.validator_mut(&address);
        validator.is_slashed = true;
        let old_end = validator.end_dynasty;
        let deposit = validator.deposit;

        if current_dynasty < old_end {
            let new_end = current_dynasty + 1;
            validator.end_dynasty = new_end;
            if old_end == DEFAULT_END_DYNASTY {
                validator.deposits_at_logout = deposits;
            }
            self.add_dynasty_delta(new_end, -(deposit as i128));
            if old_end != DEFAULT_END_DYNASTY {
                self.add_dynasty_delta(old_end, deposit as i128);
            }
        }

        metrics::record_slash();
        warn!(
            validator = %hex::encode(address),
            deposit_size,
            ?condition,
            "Validator slashed"
        );
    }

    // =========================================================================
    // ADMIN
    // =========================================================================

    pub fn validate_admin_keys(&self, keys: &AdminKeySet) -> FinalizationResult {
        if self.data.admin.is_admin_authorized(keys) {
            Ok(())
        } else {
            Err(FinalizationError::AdminNotAuthorized)
        }
    }

    pub fn process_admin_commands(&mut self, commands: &[AdminCommand]) {
        for command in commands {
            self.data.admin.apply(command);
            info!(command = ?command.command_type, keys = command.payload.len(), "Admin command applied");
        }
    }

    // =========================================================================
    // BLOCK PROCESSING
    // =========================================================================

    /// Point the latest commit of `address` at `txid`.
    pub fn register_last_tx(&mut self, address: &Address, txid: Hash) {
        if let Some(validator) = self.data.validators.get_mut(address) {
            validator.last_transaction_hash = txid;
        }
    }

    /// A vote, logout or withdraw must spend the commitment output of the
    /// validator's latest commit. Unknown validators are left to the state
    /// rules.
    fn check_spends_last_commit(&self, tx: &Transaction, address: &Address) -> Result<(), CommitError> {
        let Some(validator) = self.data.validators.get(address) else {
            return Ok(());
        };
        let last_commit = OutPoint::new(validator.last_transaction_hash, 0);
        if tx.inputs[0].prevout != last_commit {
            return Err(CommitError::PrevTxNotFound { kind: tx.tx_type });
        }
        Ok(())
    }

    /// Both votes of a slash must be signed with the validator's committed key.
    fn check_slash_signatures(
        &self,
        first: &VoteRecord,
        second: &VoteRecord,
        signatures: &dyn SignatureChecker,
    ) -> Result<(), CommitError> {
        let Some(validator) = self.data.validators.get(&first.vote.validator_address) else {
            return Err(CommitError::PrevTxNotFound { kind: TxType::Slash });
        };
        for record in [first, second] {
            if !signatures.verify(&validator.pubkey, &record.vote.signing_hash(), &record.signature) {
                return Err(CommitError::InvalidVoteSignature);
            }
        }
        Ok(())
    }

    /// Apply one finalizer commit from a block, validating it against this
    /// state first.
    ///
    /// Runs the stateless checks, then chaining to the validator's latest
    /// commit and the slash evidence signatures, then the state rules.
    pub fn process_new_commit(
        &mut self,
        tx: &Transaction,
        signatures: &dyn SignatureChecker,
    ) -> Result<(), CommitError> {
        let kind = tx.tx_type;
        let invalid = |source: FinalizationError| CommitError::invalid_state(kind, source);
        let txid = tx.hash();

        match check_finalizer_commit(tx, signatures)? {
            CommitPayload::Deposit { address, pubkey, amount } => {
                self.validate_deposit(&address, amount).map_err(invalid)?;
                self.process_deposit(&pubkey, amount);
                self.register_last_tx(&address, txid);
            }
            CommitPayload::Vote { record, .. } => {
                let address = record.vote.validator_address;
                self.check_spends_last_commit(tx, &address)?;
                self.validate_vote(&record.vote).map_err(invalid)?;
                self.process_vote(&record.vote);
                self.register_last_tx(&address, txid);
            }
            CommitPayload::Logout { address } => {
                self.check_spends_last_commit(tx, &address)?;
                self.validate_logout(&address).map_err(invalid)?;
                self.process_logout(&address);
                self.register_last_tx(&address, txid);
            }
            CommitPayload::Withdraw { address, amount } => {
                self.check_spends_last_commit(tx, &address)?;
                self.validate_withdraw(&address, amount).map_err(invalid)?;
                self.process_withdraw(&address);
            }
            CommitPayload::Slash { first, second } => {
                self.is_slashable(&first.vote, &second.vote).map_err(invalid)?;
                self.check_slash_signatures(&first, &second, signatures)?;
                self.process_slash(&first.vote, &second.vote);
            }
            CommitPayload::Admin { keys, commands } => {
                self.validate_admin_keys(&keys).map_err(invalid)?;
                self.process_admin_commands(&commands);
            }
        }
        Ok(())
    }

    /// Derive this state from the finalizer commits of the block at `index`.
    ///
    /// The state must be `New`. Marks it `FromCommits` on success.
    pub fn process_new_commits(
        &mut self,
        index: &BlockIndex,
        transactions: &[Transaction],
        signatures: &dyn SignatureChecker,
    ) -> Result<(), ProcessorError> {
        assert_eq!(
            self.status,
            InitStatus::New,
            "commits applied to a state that was already derived"
        );
        let height = index.height;
        if self.params.is_epoch_start(height) {
            self.initialize_epoch(height)
                .map_err(|source| ProcessorError::EpochInitialization { height, source })?;
        }

        for tx in transactions.iter().filter(|tx| tx.is_finalizer_commit()) {
            self.process_new_commit(tx, signatures).map_err(|source| {
                metrics::record_commit_rejected(source.reject_reason());
                ProcessorError::Commit {
                    txid: hex::encode(tx.hash()),
                    source,
                }
            })?;
        }

        if self.params.is_checkpoint(height) {
            self.data.recommended_target_hash = index.hash;
            self.data.recommended_target_epoch = self.params.epoch_of(height);
        }
        self.status = InitStatus::FromCommits;
        Ok(())
    }

    /// Derive this state from the fully validated block at `index`.
    ///
    /// The state must be `New`. Marks it `Completed` on success.
    pub fn process_new_tip(
        &mut self,
        index: &BlockIndex,
        transactions: &[Transaction],
        signatures: &dyn SignatureChecker,
    ) -> Result<(), ProcessorError> {
        self.process_new_commits(index, transactions, signatures)?;
        self.status = InitStatus::Completed;
        Ok(())
    }
}
