//! In-memory block index arena
//!
//! Block positions are stable integer handles into a vector. Parents are
//! looked up by handle, never by pointer.

use crate::ports::outbound::{BlockSource, ChainView};
use parking_lot::RwLock;
use shared_types::{Block, BlockHandle, BlockIndex, Height};

#[derive(Debug, Clone)]
struct Node {
    index: BlockIndex,
    /// `None` once pruned
    block: Option<Block>,
}

#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<Node>,
    tip: Option<BlockHandle>,
}

impl Arena {
    fn get(&self, handle: BlockHandle) -> Option<&Node> {
        self.nodes.get(handle.0 as usize)
    }

    fn push(&mut self, parent: Option<BlockHandle>, height: Height, block: Block) -> BlockIndex {
        let index = BlockIndex {
            handle: BlockHandle(self.nodes.len() as u32),
            parent,
            height,
            hash: block.hash(),
        };
        self.nodes.push(Node {
            index,
            block: Some(block),
        });
        index
    }
}

/// Block tree held in memory, with an active tip.
#[derive(Debug, Default)]
pub struct MemoryChain {
    arena: RwLock<Arena>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the genesis block and make it the tip. Returns the existing
    /// genesis entry if there is one.
    pub fn add_genesis(&self, block: Block) -> BlockIndex {
        let mut arena = self.arena.write();
        if let Some(genesis) = arena.nodes.first() {
            return genesis.index;
        }
        let index = arena.push(None, 0, block);
        arena.tip = Some(index.handle);
        index
    }

    /// Insert a block on top of `parent`. The tip does not move.
    pub fn add_block(&self, parent: BlockHandle, block: Block) -> Option<BlockIndex> {
        let mut arena = self.arena.write();
        let height = arena.get(parent)?.index.height + 1;
        Some(arena.push(Some(parent), height, block))
    }

    /// Insert a block on top of the tip and make it the new tip.
    pub fn extend_tip(&self, block: Block) -> Option<BlockIndex> {
        let parent = self.arena.read().tip?;
        let index = self.add_block(parent, block)?;
        self.set_tip(index.handle);
        Some(index)
    }

    pub fn set_tip(&self, handle: BlockHandle) -> bool {
        let mut arena = self.arena.write();
        if arena.get(handle).is_none() {
            return false;
        }
        arena.tip = Some(handle);
        true
    }

    /// Drop the body of a block, keeping its index entry.
    pub fn prune_block(&self, handle: BlockHandle) -> bool {
        let mut arena = self.arena.write();
        match arena.nodes.get_mut(handle.0 as usize) {
            Some(node) => node.block.take().is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.arena.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.read().nodes.is_empty()
    }
}

impl ChainView for MemoryChain {
    fn block_index(&self, handle: BlockHandle) -> Option<BlockIndex> {
        self.arena.read().get(handle).map(|node| node.index)
    }

    fn tip(&self) -> Option<BlockIndex> {
        let arena = self.arena.read();
        arena.tip.and_then(|tip| arena.get(tip)).map(|node| node.index)
    }

    fn ancestor(&self, handle: BlockHandle, height: Height) -> Option<BlockIndex> {
        let arena = self.arena.read();
        let mut index = arena.get(handle)?.index;
        while index.height > height {
            index = arena.get(index.parent?)?.index;
        }
        (index.height == height).then_some(index)
    }
}

impl BlockSource for MemoryChain {
    fn read_block(&self, handle: BlockHandle) -> Option<Block> {
        self.arena.read().get(handle)?.block.clone()
    }
}
