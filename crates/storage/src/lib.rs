//! Block persistence for the trellis ordering engine.
//!
//! The engine treats block storage as an external collaborator: it only
//! needs to stage blocks by hash and replay them all. [`MemBlockDb`] is the
//! in-memory implementation with optional JSON file persistence; a
//! production deployment would back [`BlockDatabase`] with a real store.

mod mem;

pub use mem::MemBlockDb;

use trellis_types::{Block, Hash};

/// Error type for block database operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// `put` of a hash that is already stored.
    #[error("block already exists")]
    BlockExists,

    /// Lookup or `update` of a hash that is not stored.
    #[error("block does not exist")]
    BlockDoesNotExist,

    /// Sentinel returned by [`BlockIteration::next_block`] at the end.
    #[error("iteration finished")]
    IterationFinished,

    /// Persistence I/O or encoding failure.
    #[error("database error: {0}")]
    Database(String),
}

/// Block database interface.
pub trait BlockDatabase: Send + Sync {
    /// Whether `hash` is stored.
    fn has_block(&self, hash: Hash) -> bool;

    /// Fetch a block by hash.
    fn get_by_hash(&self, hash: Hash) -> Result<Block, StorageError>;

    /// Store a new block. Fails with [`StorageError::BlockExists`] if the
    /// hash is already present.
    fn put(&self, block: &Block) -> Result<(), StorageError>;

    /// Replace a stored block (e.g. after finalization metadata changed).
    fn update(&self, block: &Block) -> Result<(), StorageError>;

    /// Iterate over a snapshot of every stored block.
    fn get_all(&self) -> Result<BlockIteration, StorageError>;
}

/// Snapshot iteration over stored blocks, in insertion order.
pub struct BlockIteration {
    blocks: std::vec::IntoIter<Block>,
}

impl BlockIteration {
    pub(crate) fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks: blocks.into_iter(),
        }
    }

    /// Next block, or [`StorageError::IterationFinished`] once exhausted.
    pub fn next_block(&mut self) -> Result<Block, StorageError> {
        self.blocks.next().ok_or(StorageError::IterationFinished)
    }
}

impl Iterator for BlockIteration {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        self.blocks.next()
    }
}
