//! # Core Domain Entities
//!
//! UTXO chain entities consumed by the finalization core.
//!
//! ## Clusters
//!
//! - **Keys & Identifiers**: `Hash`, `Address`, `PublicKey`
//! - **Transactions**: `OutPoint`, `TxIn`, `TxOut`, `TxType`, `Transaction`
//! - **Blocks**: `BlockHeader`, `Block`, `BlockHandle`, `BlockIndex`

use crate::crypto::{address_from_pubkey, sha256};
use crate::script::Script;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};

// =============================================================================
// CLUSTER A: KEYS & IDENTIFIERS
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 20-byte address derived from a public key.
pub type Address = [u8; 20];

/// Currency amount in base units.
pub type Amount = u64;

/// Block height.
pub type Height = u32;

/// Base units per coin.
pub const UNIT: Amount = 100_000_000;

/// A compressed SEC1 secp256k1 public key.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(#[serde_as(as = "Bytes")] pub [u8; 33]);

impl PublicKey {
    /// Encoded length in bytes.
    pub const LEN: usize = 33;

    /// Parse a public key from a byte slice of exactly [`PublicKey::LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; 33] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Address of this key.
    pub fn address(&self) -> Address {
        address_from_pubkey(self)
    }
}

// =============================================================================
// CLUSTER B: TRANSACTIONS
// =============================================================================

/// Transaction kind.
///
/// Every kind other than `Regular` and `Coinbase` is a finalizer commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TxType {
    #[default]
    Regular,
    Coinbase,
    Deposit,
    Vote,
    Logout,
    Slash,
    Withdraw,
    Admin,
}

impl TxType {
    /// Whether this kind is relevant to finalization.
    pub fn is_finalizer_commit(self) -> bool {
        !matches!(self, TxType::Regular | TxType::Coinbase)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxType::Regular => "regular",
            TxType::Coinbase => "coinbase",
            TxType::Deposit => "deposit",
            TxType::Vote => "vote",
            TxType::Logout => "logout",
            TxType::Slash => "slash",
            TxType::Withdraw => "withdraw",
            TxType::Admin => "admin",
        }
    }

    fn tag(self) -> u8 {
        match self {
            TxType::Regular => 0,
            TxType::Coinbase => 1,
            TxType::Deposit => 2,
            TxType::Vote => 3,
            TxType::Logout => 4,
            TxType::Slash => 5,
            TxType::Withdraw => 6,
            TxType::Admin => 7,
        }
    }
}

/// Reference to an output of a previous transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the transaction holding the output.
    pub txid: Hash,
    /// Index of the output.
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, index: u32) -> Self {
        Self { txid, index }
    }
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxIn {
    /// Output being spent.
    pub prevout: OutPoint,
    /// Signature script.
    pub script_sig: Script,
    /// Witness stack.
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    pub fn new(prevout: OutPoint, script_sig: Script) -> Self {
        Self {
            prevout,
            script_sig,
            witness: Vec::new(),
        }
    }

    pub fn with_witness(mut self, witness: Vec<Vec<u8>>) -> Self {
        self.witness = witness;
        self
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxOut {
    /// Value in base units.
    pub value: Amount,
    /// Locking script.
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Script) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

/// A UTXO transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Serialization version.
    pub version: u16,
    /// Transaction kind.
    pub tx_type: TxType,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(tx_type: TxType, inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self {
            version: 1,
            tx_type,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Compute the transaction hash.
    ///
    /// Witness data is committed to, so two transactions differing only in
    /// witness have different hashes.
    pub fn hash(&self) -> Hash {
        self.digest(true)
    }

    /// Message signed by witness signatures: the hash without any witness.
    pub fn signature_hash(&self) -> Hash {
        self.digest(false)
    }

    fn digest(&self, with_witness: bool) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update([self.tx_type.tag()]);
        hasher.update((self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            hasher.update(input.prevout.txid);
            hasher.update(input.prevout.index.to_le_bytes());
            update_with_bytes(&mut hasher, input.script_sig.as_bytes());
            if with_witness {
                hasher.update((input.witness.len() as u32).to_le_bytes());
                for item in &input.witness {
                    update_with_bytes(&mut hasher, item);
                }
            }
        }
        hasher.update((self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            hasher.update(output.value.to_le_bytes());
            update_with_bytes(&mut hasher, output.script_pubkey.as_bytes());
        }
        hasher.update(self.lock_time.to_le_bytes());
        hasher.finalize().into()
    }

    /// Sum of all output values, saturating on overflow.
    pub fn value_out(&self) -> Amount {
        self.outputs
            .iter()
            .fold(0, |acc: Amount, out| acc.saturating_add(out.value))
    }

    pub fn is_finalizer_commit(&self) -> bool {
        self.tx_type.is_finalizer_commit()
    }
}

fn update_with_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u32).to_le_bytes());
    hasher.update(bytes);
}

// =============================================================================
// CLUSTER C: BLOCKS
// =============================================================================

/// The header of a block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u16,
    /// Hash of the parent block.
    pub parent_hash: Hash,
    /// Commitment to the block's transactions.
    pub merkle_root: Hash,
    /// Unix timestamp when the block was proposed.
    pub timestamp: u64,
    pub nonce: u64,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.parent_hash);
        hasher.update(self.merkle_root);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }
}

/// A full block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build a block on top of `parent_hash`, committing to `transactions`.
    pub fn new(parent_hash: Hash, transactions: Vec<Transaction>, timestamp: u64) -> Self {
        let merkle_root = Self::compute_merkle_root(&transactions);
        Self {
            header: BlockHeader {
                version: 1,
                parent_hash,
                merkle_root,
                timestamp,
                nonce: 0,
            },
            transactions,
        }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Binary merkle root over transaction hashes, duplicating the last node
    /// of odd levels.
    pub fn compute_merkle_root(transactions: &[Transaction]) -> Hash {
        let mut level: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();
        if level.is_empty() {
            return [0u8; 32];
        }
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| {
                    let mut data = [0u8; 64];
                    data[..32].copy_from_slice(&pair[0]);
                    data[32..].copy_from_slice(pair.get(1).unwrap_or(&pair[0]));
                    sha256(&data)
                })
                .collect();
        }
        level[0]
    }

    /// Transactions relevant to finalization, in block order.
    pub fn finalizer_commits(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| tx.is_finalizer_commit())
    }
}

/// Stable handle of a position in the block index arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockHandle(pub u32);

/// A resolved block index entry: position, parent, height and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndex {
    pub handle: BlockHandle,
    /// `None` only for the genesis block.
    pub parent: Option<BlockHandle>,
    pub height: Height,
    pub hash: Hash,
}

impl BlockIndex {
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}
