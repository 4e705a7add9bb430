//! # State Repository
//!
//! Maps block positions to finalization state snapshots.
//!
//! ```text
//! genesis (height 0, fixed, Completed)
//!    │ derive_child
//!    ▼
//! handle → (height, state)   New ──commits──▶ FromCommits ──full block──▶ Completed
//!                             └──────────────full block─────────────────────┘
//! ```
//!
//! Each entry is a copy of its parent's state with the block applied; fork
//! branches share nothing.

use super::state::{FinalizationState, InitStatus};
use crate::config::{AdminParams, FinalizationParams};
use crate::error::{ProcessorError, ProcessorResult};
use crate::ports::outbound::SignatureChecker;
use shared_types::{BlockHandle, BlockIndex, Height, Transaction};
use std::collections::HashMap;
use tracing::{debug, warn};

/// How a full block was applied to its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipOutcome {
    /// Derived directly from the parent
    Derived,
    /// Re-derived and equal to the state derived from commits
    Confirmed,
    /// Re-derived and different from the state derived from commits.
    /// The fresh derivation replaced it.
    Mismatch,
    /// Position already `Completed`
    AlreadyProcessed,
}

#[derive(Debug, Clone)]
struct Entry {
    height: Height,
    state: FinalizationState,
}

/// Block position to finalization state map
#[derive(Debug)]
pub struct StateRepository {
    params: FinalizationParams,
    admin_params: AdminParams,
    genesis: FinalizationState,
    states: HashMap<BlockHandle, Entry>,
}

impl StateRepository {
    pub fn new(params: FinalizationParams, admin_params: AdminParams) -> Self {
        let genesis = FinalizationState::new(params, &admin_params);
        Self {
            params,
            admin_params,
            genesis,
            states: HashMap::new(),
        }
    }

    pub fn params(&self) -> &FinalizationParams {
        &self.params
    }

    pub fn genesis(&self) -> &FinalizationState {
        &self.genesis
    }

    /// Number of tracked positions, genesis excluded.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn find(&self, index: &BlockIndex) -> Option<&FinalizationState> {
        if index.is_genesis() {
            return Some(&self.genesis);
        }
        self.states.get(&index.handle).map(|entry| &entry.state)
    }

    fn parent_state(&self, index: &BlockIndex) -> Option<&FinalizationState> {
        if index.height == 1 {
            return Some(&self.genesis);
        }
        index
            .parent
            .and_then(|parent| self.states.get(&parent))
            .map(|entry| &entry.state)
    }

    /// Fresh `New` copy of the parent's state.
    fn derive_from_parent(
        &self,
        index: &BlockIndex,
        required_parent_status: InitStatus,
    ) -> ProcessorResult<FinalizationState> {
        let height = index.height;
        let parent = self
            .parent_state(index)
            .ok_or(ProcessorError::ParentStateNotFound { height })?;
        if parent.status() < required_parent_status {
            return Err(ProcessorError::ParentNotReady {
                height,
                required: required_parent_status,
            });
        }
        Ok(parent.derive_child())
    }

    /// Insert a `New` state for `index` copied from its parent. Returns the
    /// existing entry if there is one.
    pub fn create(
        &mut self,
        index: &BlockIndex,
        required_parent_status: InitStatus,
    ) -> ProcessorResult<&FinalizationState> {
        if index.is_genesis() {
            return Ok(&self.genesis);
        }
        if !self.states.contains_key(&index.handle) {
            let state = self.derive_from_parent(index, required_parent_status)?;
            self.states.insert(
                index.handle,
                Entry {
                    height: index.height,
                    state,
                },
            );
            debug!(height = index.height, handle = index.handle.0, "Finalization state created");
        }
        self.states
            .get(&index.handle)
            .map(|entry| &entry.state)
            .ok_or(ProcessorError::UnknownBlock {
                handle: index.handle.0,
            })
    }

    /// Lookup, then [`Self::create`] if absent.
    pub fn find_or_create(
        &mut self,
        index: &BlockIndex,
        required_parent_status: InitStatus,
    ) -> ProcessorResult<&FinalizationState> {
        self.create(index, required_parent_status)
    }

    fn store(&mut self, index: &BlockIndex, state: FinalizationState) {
        self.states.insert(
            index.handle,
            Entry {
                height: index.height,
                state,
            },
        );
    }

    /// Replace the entry for `index` with `new_state`. Returns whether the
    /// replaced state was equal, `None` if there was no entry.
    pub fn confirm(&mut self, index: &BlockIndex, new_state: FinalizationState) -> Option<bool> {
        let entry = self.states.get_mut(&index.handle)?;
        let consistent = entry.state == new_state;
        entry.state = new_state;
        Some(consistent)
    }

    /// Drop the `New` entry of a position whose derivation failed, so a
    /// rejected block has no state.
    fn discard_new(&mut self, index: &BlockIndex) {
        let is_new = self
            .states
            .get(&index.handle)
            .is_some_and(|entry| entry.state.status() == InitStatus::New);
        if is_new {
            self.states.remove(&index.handle);
            debug!(height = index.height, handle = index.handle.0, "Rejected position dropped");
        }
    }

    /// Derive the state of `index` from the finalizer commits of its block.
    ///
    /// No-op if the position has already been derived. On failure the
    /// position is left without a state.
    pub fn process_new_commits(
        &mut self,
        index: &BlockIndex,
        transactions: &[Transaction],
        signatures: &dyn SignatureChecker,
    ) -> ProcessorResult {
        let state = self.find_or_create(index, InitStatus::FromCommits)?;
        if state.status() != InitStatus::New {
            return Ok(());
        }
        let mut derived = state.clone();
        if let Err(err) = derived.process_new_commits(index, transactions, signatures) {
            self.discard_new(index);
            return Err(err);
        }
        self.store(index, derived);
        Ok(())
    }

    /// Derive the state of `index` from its fully validated block.
    ///
    /// A failed direct derivation leaves the position without a state. A
    /// failed re-derivation keeps the `FromCommits` entry.
    pub fn process_new_tip(
        &mut self,
        index: &BlockIndex,
        transactions: &[Transaction],
        signatures: &dyn SignatureChecker,
    ) -> ProcessorResult<TipOutcome> {
        let state = self.find_or_create(index, InitStatus::Completed)?;
        match state.status() {
            InitStatus::Completed => Ok(TipOutcome::AlreadyProcessed),
            InitStatus::New => {
                let mut derived = state.clone();
                if let Err(err) = derived.process_new_tip(index, transactions, signatures) {
                    self.discard_new(index);
                    return Err(err);
                }
                self.store(index, derived);
                Ok(TipOutcome::Derived)
            }
            InitStatus::FromCommits => {
                let mut fresh = self.derive_from_parent(index, InitStatus::Completed)?;
                fresh.process_new_tip(index, transactions, signatures)?;
                match self.confirm(index, fresh) {
                    Some(true) => Ok(TipOutcome::Confirmed),
                    _ => {
                        warn!(
                            height = index.height,
                            handle = index.handle.0,
                            "State derived from commits differs from the full block"
                        );
                        Ok(TipOutcome::Mismatch)
                    }
                }
            }
        }
    }

    /// Drop every entry strictly below `height`.
    pub fn clear_until_height(&mut self, height: Height) {
        let before = self.states.len();
        self.states.retain(|_, entry| entry.height >= height);
        debug!(height, removed = before - self.states.len(), "Repository trimmed");
    }

    /// Forget all positions and rebuild genesis from the parameters.
    pub fn reset(&mut self, params: FinalizationParams, admin_params: AdminParams) {
        self.params = params;
        self.genesis = FinalizationState::new(params, &admin_params);
        self.admin_params = admin_params;
        self.states.clear();
    }

    /// Forget all positions and track only `tip`, with a state pinned at
    /// its epoch.
    pub fn reset_to_tip(&mut self, tip: &BlockIndex) {
        self.states.clear();
        if tip.is_genesis() {
            return;
        }
        let state = FinalizationState::pinned_at(self.params, &self.admin_params, tip);
        warn!(height = tip.height, epoch = state.current_epoch(), "Finalization state pinned at tip");
        self.store(tip, state);
    }
}
