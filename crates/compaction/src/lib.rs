//! Compaction chain for the trellis ordering engine.
//!
//! The compaction chain linearizes blocks delivered by the lattice: it
//! stamps a monotonically increasing finalization height onto each one,
//! pairs blocks with their randomness proofs, and releases them in
//! finalization-height order once the proof is present (round 0 predates the
//! DKG and is exempt).
//!
//! # Concurrency
//!
//! Unlike the lattice, the compaction chain is shared between two roles: the
//! ordering driver ([`CompactionChain::process_block`],
//! [`CompactionChain::extract_blocks`]) and the randomness-ingestion path
//! ([`CompactionChain::process_randomness_result`],
//! [`CompactionChain::process_finalized_block`]). Two reader/writer locks
//! discipline the shared state; see the field docs for the lock order.
//! Critical sections never call out to governance or do I/O.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument};
use trellis_governance::{DkgGroupPublicKey, Governance};
use trellis_types::{Block, BlockRandomnessResult, Hash};

/// Error type for compaction-chain operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CompactionError {
    /// A randomness result referenced a hash that was never registered.
    /// Byzantine peers send such noise; callers drop it and move on.
    #[error("block not registered")]
    BlockNotRegistered,
}

/// The compaction chain.
pub struct CompactionChain {
    gov: Arc<dyn Governance>,

    /// Most recent block to receive a finalization height.
    ///
    /// Lock order: acquire this before `inner`, never the other way around.
    /// Kept separate so `last_block` readers do not serialize against the
    /// main mutation lock.
    prev_block: RwLock<Option<Block>>,

    /// Registered blocks, the finalization-ordered pending queue, and the
    /// deferred finalized blocks.
    inner: RwLock<Inner>,

    /// Randomness proofs dropped by verification (DKG construction failures
    /// included). Drops are silent otherwise.
    rejected_proofs: AtomicU64,
}

#[derive(Default)]
struct Inner {
    /// Blocks awaiting extraction, keyed by hash. Single owner of the block
    /// data; the pending queue references into this map.
    blocks: HashMap<Hash, Block>,
    /// Hashes in finalization-height order, waiting for randomness.
    pending_blocks: VecDeque<Hash>,
    /// Externally finalized blocks whose round's DKG is not yet final.
    pending_finalized_blocks: Vec<Block>,
}

impl CompactionChain {
    /// Create a compaction chain backed by the given governance oracle.
    pub fn new(gov: Arc<dyn Governance>) -> Self {
        Self {
            gov,
            prev_block: RwLock::new(None),
            inner: RwLock::new(Inner::default()),
            rejected_proofs: AtomicU64::new(0),
        }
    }

    /// Register a block so a later randomness result can find it.
    /// Idempotent.
    pub fn register_block(&self, block: &Block) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner
            .blocks
            .entry(block.hash)
            .or_insert_with(|| block.clone());
    }

    /// Whether `hash` is registered and not yet extracted.
    pub fn block_registered(&self, hash: Hash) -> bool {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner.blocks.contains_key(&hash)
    }

    /// Stamp the next finalization height onto `block` and queue it for
    /// extraction.
    ///
    /// Every block delivered by the lattice passes through here exactly
    /// once, in delivery order.
    #[instrument(skip(self, block), fields(position = %block.position))]
    pub fn process_block(&self, mut block: Block) {
        let mut prev = self.prev_block.write().expect("RwLock poisoned");
        let height = prev.as_ref().map_or(1, |p| p.finalization.height + 1);
        block.finalization.height = height;
        *prev = Some(block.clone());

        let mut inner = self.inner.write().expect("RwLock poisoned");
        let hash = block.hash;
        match inner.blocks.entry(hash) {
            // Keep any randomness that arrived before the block was
            // processed.
            Entry::Occupied(mut entry) => entry.get_mut().finalization.height = height,
            Entry::Vacant(entry) => {
                entry.insert(block);
            }
        }
        inner.pending_blocks.push_back(hash);
        debug!(height, "finalization height assigned");
    }

    /// Attach a randomness proof to a registered block.
    pub fn process_randomness_result(
        &self,
        result: &BlockRandomnessResult,
    ) -> Result<(), CompactionError> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let block = inner
            .blocks
            .get_mut(&result.block_hash)
            .ok_or(CompactionError::BlockNotRegistered)?;
        block.finalization.randomness = result.randomness.clone();
        Ok(())
    }

    /// Verify externally finalized blocks against their round's DKG group
    /// key, batching in anything deferred earlier.
    ///
    /// Blocks whose round's DKG is not yet final are deferred until a later
    /// call. Verification failures drop the block silently apart from
    /// [`CompactionChain::rejected_proofs`]; governance is consulted outside
    /// any lock.
    pub fn process_finalized_block(&self, block: Block) -> Vec<Block> {
        let mut batch = {
            let mut inner = self.inner.write().expect("RwLock poisoned");
            std::mem::take(&mut inner.pending_finalized_blocks)
        };
        batch.push(block);

        let mut group_keys: HashMap<u64, Option<DkgGroupPublicKey>> = HashMap::new();
        let mut deferred = Vec::new();
        let mut confirmed = Vec::new();
        for b in batch {
            let round = b.position.round;
            if !self.gov.is_dkg_final(round) {
                deferred.push(b);
                continue;
            }
            let key = group_keys.entry(round).or_insert_with(|| {
                let threshold = self.gov.configuration(round).dkg_set_size as usize / 3 + 1;
                DkgGroupPublicKey::new(
                    round,
                    &self.gov.dkg_master_public_keys(round),
                    &self.gov.dkg_complaints(round),
                    threshold,
                )
                .map_err(|err| debug!(round, %err, "DKG group key construction failed"))
                .ok()
            });
            let Some(key) = key else {
                self.rejected_proofs.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            if key.verify_signature(b.hash, &b.finalization.randomness) {
                confirmed.push(b);
            } else {
                self.rejected_proofs.fetch_add(1, Ordering::Relaxed);
                debug!(hash = ?b.hash, round, "randomness proof rejected");
            }
        }

        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.pending_finalized_blocks.extend(deferred);
        confirmed
    }

    /// Release pending blocks from the front of the queue while the head
    /// either carries its randomness proof or belongs to round 0.
    ///
    /// Extracted blocks leave the registered set; ownership passes to the
    /// caller.
    pub fn extract_blocks(&self) -> Vec<Block> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let mut released = Vec::new();
        while let Some(hash) = inner.pending_blocks.front().copied() {
            let ready = inner
                .blocks
                .get(&hash)
                .is_some_and(|b| !b.finalization.randomness.is_empty() || b.position.round == 0);
            if !ready {
                break;
            }
            inner.pending_blocks.pop_front();
            if let Some(block) = inner.blocks.remove(&hash) {
                released.push(block);
            }
        }
        released
    }

    /// Most recent block to receive a finalization height.
    pub fn last_block(&self) -> Option<Block> {
        self.prev_block.read().expect("RwLock poisoned").clone()
    }

    /// Number of randomness proofs dropped by verification so far.
    pub fn rejected_proofs(&self) -> u64 {
        self.rejected_proofs.load(Ordering::Relaxed)
    }
}
