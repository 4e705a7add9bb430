//! Driving Ports (API - Inbound)
//!
//! What block processing, commit relay and the finalizer's wallet call.
//! Positions are block index handles; the implementation resolves them
//! through its [`ChainView`](super::outbound::ChainView).

use super::outbound::{BlockSource, CoinView, MempoolView};
use crate::commits::CommitPayload;
use crate::domain::repository::TipOutcome;
use crate::domain::{FinalizationState, Vote};
use crate::error::ProcessorResult;
use shared_types::{Address, Block, BlockHandle, Transaction};

/// Primary Finalization API
pub trait FinalizationApi: Send + Sync {
    /// Derive the state of `handle` from the finalizer commits of its block,
    /// before the block itself is validated.
    ///
    /// Idempotent: a position already derived is left unchanged.
    fn process_new_commits(&self, handle: BlockHandle, transactions: &[Transaction])
        -> ProcessorResult;

    /// Derive the state of `handle` from its fully validated block, then
    /// trim positions below the last finalized checkpoint.
    fn process_new_tip(&self, handle: BlockHandle, block: &Block) -> ProcessorResult<TipOutcome>;

    /// As [`Self::process_new_tip`] for a block that is not yet the active
    /// tip. Does not trim.
    fn process_new_tip_candidate(
        &self,
        handle: BlockHandle,
        block: &Block,
    ) -> ProcessorResult<TipOutcome>;

    /// Validate a relayed commit against the state at the active tip.
    fn check_commit(
        &self,
        tx: &Transaction,
        mempool: &dyn MempoolView,
        coins: &dyn CoinView,
    ) -> ProcessorResult<CommitPayload>;

    /// Replay active chain blocks whose state is not yet `Completed`.
    ///
    /// Returns the number of blocks replayed. Fails with
    /// `BlockUnavailable` if a needed block has been pruned, in which case
    /// the caller should [`Self::reset_to_tip`].
    fn restore_from_disk(&self, blocks: &dyn BlockSource) -> ProcessorResult<usize>;

    /// Forget every position and start again from genesis.
    fn reset(&self);

    /// Forget every position and pin a single state at the active tip.
    fn reset_to_tip(&self) -> ProcessorResult;

    fn state(&self, handle: BlockHandle) -> Option<FinalizationState>;

    fn tip_state(&self) -> Option<FinalizationState>;

    /// Vote `address` should cast at the active tip.
    fn recommended_vote(&self, address: &Address) -> Option<Vote>;
}
