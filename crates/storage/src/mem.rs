//! In-memory block database.

use crate::{BlockDatabase, BlockIteration, StorageError};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::debug;
use trellis_types::{Block, Hash};

/// In-memory block database with optional JSON file persistence.
///
/// Iteration order is insertion order, which keeps test replays
/// deterministic.
pub struct MemBlockDb {
    inner: RwLock<MemInner>,
    persist_path: Option<PathBuf>,
}

#[derive(Default)]
struct MemInner {
    by_hash: HashMap<Hash, Block>,
    order: Vec<Hash>,
}

impl MemBlockDb {
    /// Create an empty, purely in-memory database.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemInner::default()),
            persist_path: None,
        }
    }

    /// Create a database persisted to `path`.
    ///
    /// Loads existing content if the file is present; [`MemBlockDb::close`]
    /// writes the current content back.
    pub fn with_persistence(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut inner = MemInner::default();
        if path.exists() {
            let file = File::open(&path).map_err(|e| StorageError::Database(e.to_string()))?;
            let blocks: Vec<Block> = serde_json::from_reader(BufReader::new(file))
                .map_err(|e| StorageError::Database(e.to_string()))?;
            debug!(count = blocks.len(), path = %path.display(), "loaded block database");
            for block in blocks {
                inner.order.push(block.hash);
                inner.by_hash.insert(block.hash, block);
            }
        }
        Ok(Self {
            inner: RwLock::new(inner),
            persist_path: Some(path),
        })
    }

    /// Flush to the persistence file, if one was configured.
    pub fn close(&self) -> Result<(), StorageError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let inner = self.inner.read().expect("RwLock poisoned");
        let blocks: Vec<&Block> = inner
            .order
            .iter()
            .map(|h| &inner.by_hash[h])
            .collect();
        let file = File::create(path).map_err(|e| StorageError::Database(e.to_string()))?;
        serde_json::to_writer(BufWriter::new(file), &blocks)
            .map_err(|e| StorageError::Database(e.to_string()))?;
        debug!(count = blocks.len(), path = %path.display(), "persisted block database");
        Ok(())
    }
}

impl Default for MemBlockDb {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDatabase for MemBlockDb {
    fn has_block(&self, hash: Hash) -> bool {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner.by_hash.contains_key(&hash)
    }

    fn get_by_hash(&self, hash: Hash) -> Result<Block, StorageError> {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner
            .by_hash
            .get(&hash)
            .cloned()
            .ok_or(StorageError::BlockDoesNotExist)
    }

    fn put(&self, block: &Block) -> Result<(), StorageError> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        if inner.by_hash.contains_key(&block.hash) {
            return Err(StorageError::BlockExists);
        }
        inner.order.push(block.hash);
        inner.by_hash.insert(block.hash, block.clone());
        Ok(())
    }

    fn update(&self, block: &Block) -> Result<(), StorageError> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        match inner.by_hash.get_mut(&block.hash) {
            Some(stored) => {
                *stored = block.clone();
                Ok(())
            }
            None => Err(StorageError::BlockDoesNotExist),
        }
    }

    fn get_all(&self) -> Result<BlockIteration, StorageError> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let blocks = inner
            .order
            .iter()
            .map(|h| inner.by_hash[h].clone())
            .collect();
        Ok(BlockIteration::new(blocks))
    }
}
