//! The block lattice: admission, ordering, pruning.

use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, trace};
use trellis_types::{Block, Hash, Position};

use crate::chain::ChainStatus;

/// Rejection reasons from [`BlockLattice::sanity_check`].
///
/// All of these are recoverable: the offending block is discarded and the
/// caller carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SanityError {
    /// The block names a chain outside the lattice.
    #[error("chain id {0} out of range")]
    InvalidChainId(u32),

    /// The block's height does not extend its chain.
    #[error("block height does not extend its chain")]
    InvalidBlockHeight,

    /// A different block already occupies this position.
    #[error("fork: position already occupied by a different block")]
    ForkBlock,

    /// A non-genesis block does not ack its own parent.
    #[error("non-genesis block does not ack its parent")]
    NotAckParent,

    /// The named parent lives on a different chain.
    #[error("parent block lives on a different chain")]
    InvalidParentChain,

    /// An ack repeats a hash, or re-acks a block this chain already acked.
    #[error("duplicate or already-covered ack")]
    DoubleAck,

    /// Two acks resolve to blocks on the same chain.
    #[error("two acks point into the same chain")]
    DuplicatedAckOnOneChain,

    /// An ack does not resolve to any block in the lattice.
    #[error("acked block does not exist in the lattice")]
    AckingBlockNotExists,
}

/// Snapshot of one chain's bookkeeping, for introspection and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    /// Height of the oldest retained block.
    pub min_height: u64,
    /// Height of the next block eligible for delivery.
    pub next_output: u64,
    /// Per-peer ack frontier over this chain.
    pub next_ack: Vec<u64>,
    /// Number of retained blocks.
    pub retained: usize,
    /// Hash of the newest retained block.
    pub tip_hash: Option<Hash>,
}

/// The block lattice.
///
/// Owns one [`ChainStatus`] per author chain plus a hash index over every
/// retained block. Driven by a single caller; no operation suspends or
/// blocks. Given the same set of admitted blocks, two lattices converge to
/// identical state no matter the admission order.
pub struct BlockLattice {
    /// Round this instance serves; stamped into prepared blocks.
    round: u64,
    /// One status per author chain.
    chains: Vec<ChainStatus>,
    /// Position of every retained block, keyed by hash. The chains own the
    /// blocks; this is only a lookup index and the two are kept in sync by
    /// `add_block` and the purge pass.
    block_by_hash: HashMap<Hash, Position>,
}

impl BlockLattice {
    /// Create a lattice for `round` with `chain_count` author chains.
    pub fn new(round: u64, chain_count: u32) -> Self {
        Self {
            round,
            chains: (0..chain_count)
                .map(|_| ChainStatus::new(chain_count as usize))
                .collect(),
            block_by_hash: HashMap::new(),
        }
    }

    /// Round this lattice was created for.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Number of author chains.
    pub fn chain_count(&self) -> u32 {
        self.chains.len() as u32
    }

    /// Number of blocks currently retained (and indexed).
    pub fn retained_block_count(&self) -> usize {
        self.block_by_hash.len()
    }

    /// Look up a retained block by hash.
    pub fn block(&self, hash: Hash) -> Option<&Block> {
        let position = self.block_by_hash.get(&hash)?;
        self.chains[position.chain_id as usize].block_at(position.height)
    }

    /// Look up a retained block by position.
    pub fn block_at(&self, chain_id: u32, height: u64) -> Option<&Block> {
        self.chains.get(chain_id as usize)?.block_at(height)
    }

    /// Snapshot one chain's bookkeeping.
    ///
    /// # Panics
    ///
    /// Panics if `chain_id` is out of range.
    pub fn chain_summary(&self, chain_id: u32) -> ChainSummary {
        let chain = &self.chains[chain_id as usize];
        ChainSummary {
            min_height: chain.min_height(),
            next_output: chain.next_output(),
            next_ack: chain.next_ack_vector().to_vec(),
            retained: chain.len(),
            tip_hash: chain.tip().map(|b| b.hash),
        }
    }

    /// Whether every ack of `block` resolves in the lattice.
    pub fn are_all_acks_in_lattice(&self, block: &Block) -> bool {
        block
            .acks
            .iter()
            .all(|ack| self.block_by_hash.contains_key(ack))
    }

    /// Validate a block announcement against the lattice.
    ///
    /// Checks run in the order that makes each error kind unambiguous: a
    /// fork is reported as a fork even though its height also fails to
    /// extend the chain, and a missing parent ack is reported before the
    /// height is considered at all.
    pub fn sanity_check(&self, block: &Block) -> Result<(), SanityError> {
        let chain_id = block.position.chain_id;
        let Some(chain) = self.chains.get(chain_id as usize) else {
            return Err(SanityError::InvalidChainId(chain_id));
        };
        let height = block.position.height;

        // Non-genesis blocks must ack their parent; this also forces a
        // non-empty ack set for every height above 0.
        if height > 0 && !block.acks.contains(&block.parent_hash) {
            return Err(SanityError::NotAckParent);
        }

        if let Some(existing) = chain.block_at(height) {
            if existing.hash != block.hash {
                return Err(SanityError::ForkBlock);
            }
        }

        if height != chain.next_height() {
            return Err(SanityError::InvalidBlockHeight);
        }

        if height > 0 {
            if let Some(parent) = self.block(block.parent_hash) {
                if parent.position.chain_id != chain_id {
                    return Err(SanityError::InvalidParentChain);
                }
            }
        }

        let mut seen = HashSet::with_capacity(block.acks.len());
        let mut acked_chains = vec![false; self.chains.len()];
        for ack in &block.acks {
            if !seen.insert(*ack) {
                return Err(SanityError::DoubleAck);
            }
            match self.block(*ack) {
                Some(acked) => {
                    let acked_chain = acked.position.chain_id as usize;
                    // Re-acking a block this chain has already covered.
                    if acked.position.height < self.chains[acked_chain].next_ack(chain_id) {
                        return Err(SanityError::DoubleAck);
                    }
                    if acked_chains[acked_chain] {
                        return Err(SanityError::DuplicatedAckOnOneChain);
                    }
                    acked_chains[acked_chain] = true;
                }
                None => {
                    // The parent may be gone once every chain acked past it
                    // and the purge emptied the chain; anything else that
                    // fails to resolve is invalid.
                    let parent_purged =
                        *ack == block.parent_hash && height == chain.min_height();
                    if !parent_purged {
                        return Err(SanityError::AckingBlockNotExists);
                    }
                }
            }
        }
        Ok(())
    }

    /// Admit a block and return the blocks this admission delivered, in
    /// per-pass ascending chain order.
    ///
    /// Runs [`BlockLattice::sanity_check`] first; a rejected block leaves
    /// the lattice untouched. After delivery, blocks that every chain has
    /// acked past are purged.
    #[instrument(skip(self, block), fields(position = %block.position))]
    pub fn add_block(&mut self, block: Block) -> Result<Vec<Block>, SanityError> {
        self.sanity_check(&block)?;
        let position = block.position;

        // Record ack coverage for every chain the new block references.
        // Acks that no longer resolve passed the sanity check because their
        // target was purged, which already implies full coverage.
        for ack in &block.acks {
            if let Some(acked) = self.block_by_hash.get(ack).copied() {
                self.chains[acked.chain_id as usize]
                    .record_ack(position.chain_id, acked.height);
            }
        }

        self.block_by_hash.insert(block.hash, position);
        self.chains[position.chain_id as usize].append(block);

        let delivered = self.extract_deliverable();
        self.purge_chains();
        debug!(
            delivered = delivered.len(),
            retained = self.block_by_hash.len(),
            "block admitted"
        );
        Ok(delivered)
    }

    /// Fill the proposer's side of a fresh block: parent hash, height,
    /// round, and one ack per chain that has progressed since this chain
    /// last acked it. Does not mutate the lattice; hashing and signing
    /// happen outside.
    ///
    /// # Panics
    ///
    /// Panics if `block.position.chain_id` is out of range.
    pub fn prepare_block(&self, block: &mut Block) {
        let chain_id = block.position.chain_id;
        let own = &self.chains[chain_id as usize];

        let mut acks = Vec::new();
        for status in &self.chains {
            if let Some(tip) = status.tip() {
                if tip.position.height >= status.next_ack(chain_id) {
                    acks.push(tip.hash);
                }
            }
        }
        acks.sort_unstable();

        block.position.round = self.round;
        block.position.height = own.next_height();
        block.parent_hash = own.tip().map_or(Hash::ZERO, |tip| tip.hash);
        block.acks = acks;
    }

    /// Greedily deliver chain tips whose acked blocks have all been
    /// delivered, sweeping the chains in order until a full pass makes no
    /// progress.
    fn extract_deliverable(&mut self) -> Vec<Block> {
        let mut delivered = Vec::new();
        let mut progressed = true;
        while progressed {
            progressed = false;
            for chain_id in 0..self.chains.len() {
                let deliverable = {
                    let chain = &self.chains[chain_id];
                    chain.block_at(chain.next_output()).and_then(|tip| {
                        // An ack that no longer resolves was purged, which
                        // means it was delivered long ago.
                        let ready = tip.acks.iter().all(|ack| {
                            match self.block_by_hash.get(ack) {
                                Some(pos) => {
                                    self.chains[pos.chain_id as usize].next_output()
                                        > pos.height
                                }
                                None => true,
                            }
                        });
                        ready.then(|| tip.clone())
                    })
                };
                if let Some(block) = deliverable {
                    self.chains[chain_id].advance_output();
                    trace!(position = %block.position, "delivered");
                    delivered.push(block);
                    progressed = true;
                }
            }
        }
        delivered
    }

    /// Purge fully-covered heads and evict them from the hash index.
    fn purge_chains(&mut self) {
        for chain in &mut self.chains {
            for hash in chain.purge() {
                self.block_by_hash.remove(&hash);
            }
        }
    }
}
