//! Finalization Service
//!
//! Wires the state repository to the chain and the signature checker behind
//! one coarse repository lock.
//!
//! Lock order: block index lookups always happen before the repository lock
//! is taken, never while it is held.
//!
//! Block commits are verified while the state is derived, against the keys
//! the state has recorded. Relayed commits additionally go through
//! predecessor lookups in the mempool and coin view.

use crate::commits::{contextual_check_finalizer_commit, CommitPayload};
use crate::config::{AdminParams, FinalizationParams};
use crate::domain::{FinalizationState, InitStatus, StateRepository, TipOutcome, Vote};
use crate::error::{CommitError, ProcessorError, ProcessorResult};
use crate::metrics;
use crate::ports::inbound::FinalizationApi;
use crate::ports::outbound::{BlockSource, ChainView, CoinView, MempoolView, SignatureChecker};
use parking_lot::Mutex;
use shared_types::{Address, Block, BlockHandle, BlockIndex, Transaction};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Finalization service implementation
pub struct FinalizationService<C, S>
where
    C: ChainView,
    S: SignatureChecker,
{
    params: FinalizationParams,
    admin_params: AdminParams,
    repository: Mutex<StateRepository>,
    chain: Arc<C>,
    checker: Arc<S>,
}

fn rejected(tx: &Transaction, source: CommitError) -> ProcessorError {
    let txid = hex::encode(tx.hash());
    warn!(
        txid = %txid,
        reason = source.reject_reason(),
        dos_score = source.dos_score(),
        "Finalizer commit rejected"
    );
    metrics::record_commit_rejected(source.reject_reason());
    ProcessorError::Commit { txid, source }
}

impl<C, S> FinalizationService<C, S>
where
    C: ChainView,
    S: SignatureChecker,
{
    pub fn new(
        params: FinalizationParams,
        admin_params: AdminParams,
        chain: Arc<C>,
        checker: Arc<S>,
    ) -> Self {
        let repository = StateRepository::new(params, admin_params.clone());
        Self {
            params,
            admin_params,
            repository: Mutex::new(repository),
            chain,
            checker,
        }
    }

    pub fn params(&self) -> &FinalizationParams {
        &self.params
    }

    /// Number of tracked positions.
    pub fn repository_len(&self) -> usize {
        self.repository.lock().len()
    }

    /// Run `f` on the state of `handle` without copying it.
    pub fn with_state<R>(
        &self,
        handle: BlockHandle,
        f: impl FnOnce(&FinalizationState) -> R,
    ) -> Option<R> {
        let index = self.chain.block_index(handle)?;
        let repository = self.repository.lock();
        repository.find(&index).map(f)
    }

    fn resolve(&self, handle: BlockHandle) -> ProcessorResult<BlockIndex> {
        self.chain
            .block_index(handle)
            .ok_or(ProcessorError::UnknownBlock { handle: handle.0 })
    }

    fn log_block_rejection(index: &BlockIndex, err: ProcessorError) -> ProcessorError {
        if let ProcessorError::Commit { txid, source } = &err {
            warn!(
                height = index.height,
                txid = %txid,
                reason = source.reject_reason(),
                dos_score = source.dos_score(),
                "Block carries an invalid finalizer commit"
            );
        }
        err
    }

    fn apply_tip(
        &self,
        handle: BlockHandle,
        block: &Block,
        trim: bool,
    ) -> ProcessorResult<TipOutcome> {
        let index = self.resolve(handle)?;

        let mut repository = self.repository.lock();
        let outcome = repository
            .process_new_tip(&index, &block.transactions, self.checker.as_ref())
            .map_err(|err| Self::log_block_rejection(&index, err))?;
        if outcome == TipOutcome::Mismatch {
            metrics::record_state_mismatch();
        }

        if trim {
            let last_finalized = repository
                .find(&index)
                .map_or(0, FinalizationState::last_finalized_epoch);
            if last_finalized > 0 {
                repository.clear_until_height(self.params.epoch_checkpoint_height(last_finalized));
            }
        }
        metrics::set_repository_size(repository.len());
        debug!(height = index.height, ?outcome, trim, "Tip processed");
        Ok(outcome)
    }

    /// Active chain from the first block after genesis up to the tip.
    fn active_chain(&self) -> Vec<BlockIndex> {
        let mut path = Vec::new();
        let mut cursor = self.chain.tip();
        while let Some(index) = cursor {
            if index.is_genesis() {
                break;
            }
            path.push(index);
            cursor = index.parent.and_then(|parent| self.chain.block_index(parent));
        }
        path.reverse();
        path
    }
}

impl<C, S> FinalizationApi for FinalizationService<C, S>
where
    C: ChainView,
    S: SignatureChecker,
{
    fn process_new_commits(
        &self,
        handle: BlockHandle,
        transactions: &[Transaction],
    ) -> ProcessorResult {
        let index = self.resolve(handle)?;

        let mut repository = self.repository.lock();
        repository
            .process_new_commits(&index, transactions, self.checker.as_ref())
            .map_err(|err| Self::log_block_rejection(&index, err))?;
        metrics::set_repository_size(repository.len());
        Ok(())
    }

    fn process_new_tip(&self, handle: BlockHandle, block: &Block) -> ProcessorResult<TipOutcome> {
        self.apply_tip(handle, block, true)
    }

    fn process_new_tip_candidate(
        &self,
        handle: BlockHandle,
        block: &Block,
    ) -> ProcessorResult<TipOutcome> {
        self.apply_tip(handle, block, false)
    }

    fn check_commit(
        &self,
        tx: &Transaction,
        mempool: &dyn MempoolView,
        coins: &dyn CoinView,
    ) -> ProcessorResult<CommitPayload> {
        let tip = self.chain.tip().ok_or(ProcessorError::UnknownBlock { handle: 0 })?;
        let repository = self.repository.lock();
        let state = repository
            .find(&tip)
            .ok_or(ProcessorError::ParentStateNotFound { height: tip.height })?;
        contextual_check_finalizer_commit(tx, state, mempool, coins, self.checker.as_ref())
            .map_err(|e| rejected(tx, e))
    }

    fn restore_from_disk(&self, blocks: &dyn BlockSource) -> ProcessorResult<usize> {
        let path = self.active_chain();
        let start = {
            let repository = self.repository.lock();
            path.iter()
                .rposition(|index| {
                    repository
                        .find(index)
                        .is_some_and(|state| state.status() == InitStatus::Completed)
                })
                .map_or(0, |position| position + 1)
        };

        let pending = &path[start..];
        info!(
            from = pending.first().map(|index| index.height),
            blocks = pending.len(),
            "Restoring finalization state"
        );
        for index in pending {
            let block = blocks
                .read_block(index.handle)
                .ok_or(ProcessorError::BlockUnavailable {
                    height: index.height,
                })?;
            self.apply_tip(index.handle, &block, true)?;
        }
        Ok(pending.len())
    }

    fn reset(&self) {
        let mut repository = self.repository.lock();
        repository.reset(self.params, self.admin_params.clone());
        metrics::set_repository_size(0);
        info!("Finalization state reset to genesis");
    }

    fn reset_to_tip(&self) -> ProcessorResult {
        let tip = self.chain.tip().ok_or(ProcessorError::UnknownBlock { handle: 0 })?;
        let mut repository = self.repository.lock();
        repository.reset_to_tip(&tip);
        metrics::set_repository_size(repository.len());
        Ok(())
    }

    fn state(&self, handle: BlockHandle) -> Option<FinalizationState> {
        self.with_state(handle, FinalizationState::clone)
    }

    fn tip_state(&self) -> Option<FinalizationState> {
        let tip = self.chain.tip()?;
        self.state(tip.handle)
    }

    fn recommended_vote(&self, address: &Address) -> Option<Vote> {
        let tip = self.chain.tip()?;
        self.with_state(tip.handle, |state| state.recommended_vote(address))
    }
}
