//! In-memory coin view and mempool

use crate::ports::outbound::{Coin, CoinView, MempoolView};
use parking_lot::RwLock;
use shared_types::{Hash, Height, OutPoint, Transaction};
use std::collections::HashMap;

/// Unspent outputs held in memory.
#[derive(Debug, Default)]
pub struct MemoryCoinView {
    coins: RwLock<HashMap<OutPoint, Coin>>,
}

impl MemoryCoinView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_coin(&self, outpoint: OutPoint, coin: Coin) {
        self.coins.write().insert(outpoint, coin);
    }

    /// Add every output of `tx` as confirmed at `height`.
    pub fn add_transaction(&self, tx: &Transaction, height: Height) {
        let txid = tx.hash();
        let mut coins = self.coins.write();
        for (index, output) in tx.outputs.iter().enumerate() {
            coins.insert(
                OutPoint::new(txid, index as u32),
                Coin {
                    output: output.clone(),
                    height,
                    tx_type: tx.tx_type,
                },
            );
        }
    }

    /// Remove and return a coin.
    pub fn spend(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.coins.write().remove(outpoint)
    }

    pub fn len(&self) -> usize {
        self.coins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.read().is_empty()
    }
}

impl CoinView for MemoryCoinView {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.coins.read().get(outpoint).cloned()
    }
}

/// Pending transactions by id.
#[derive(Debug, Default)]
pub struct MemoryMempool {
    transactions: RwLock<HashMap<Hash, Transaction>>,
}

impl MemoryMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tx: Transaction) -> Hash {
        let txid = tx.hash();
        self.transactions.write().insert(txid, tx);
        txid
    }

    pub fn remove(&self, txid: &Hash) -> Option<Transaction> {
        self.transactions.write().remove(txid)
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }
}

impl MempoolView for MemoryMempool {
    fn get_transaction(&self, txid: &Hash) -> Option<Transaction> {
        self.transactions.read().get(txid).cloned()
    }
}
