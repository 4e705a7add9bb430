//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Collaborators the finalization core reads from. All are read-only views;
//! the core never mutates chain, coin or mempool data.

use shared_types::{
    Block, BlockHandle, BlockIndex, Hash, Height, OutPoint, PublicKey, Transaction, TxOut, TxType,
};

/// Block index lookups
///
/// Implementations must hold their own lock only for the duration of a call.
/// The core always resolves block index entries before taking the
/// repository lock.
pub trait ChainView: Send + Sync {
    /// Entry for a handle
    fn block_index(&self, handle: BlockHandle) -> Option<BlockIndex>;

    /// Tip of the active chain
    fn tip(&self) -> Option<BlockIndex>;

    /// Ancestor of `handle` at `height`, the entry itself included
    fn ancestor(&self, handle: BlockHandle, height: Height) -> Option<BlockIndex>;
}

/// Block bodies by index position
pub trait BlockSource: Send + Sync {
    fn read_block(&self, handle: BlockHandle) -> Option<Block>;
}

/// An unspent output together with the kind of transaction that made it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub output: TxOut,
    pub height: Height,
    pub tx_type: TxType,
}

/// Unspent output lookups
pub trait CoinView: Send + Sync {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin>;

    /// Every input of `tx` is unspent
    fn have_inputs(&self, tx: &Transaction) -> bool {
        tx.inputs
            .iter()
            .all(|input| self.get_coin(&input.prevout).is_some())
    }
}

/// Transactions waiting in the mempool
pub trait MempoolView: Send + Sync {
    fn get_transaction(&self, txid: &Hash) -> Option<Transaction>;
}

/// ECDSA verification of vote signatures
///
/// `message_hash` is already hashed; implementations must not hash again.
pub trait SignatureChecker: Send + Sync {
    fn verify(&self, pubkey: &PublicKey, message_hash: &Hash, signature: &[u8]) -> bool;
}
