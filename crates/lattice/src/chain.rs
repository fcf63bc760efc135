//! Per-chain bookkeeping for the block lattice.

use std::collections::VecDeque;
use trellis_types::{Block, Hash};

/// Status of a single author chain: its retained blocks plus delivery and
/// ack bookkeeping.
#[derive(Debug)]
pub(crate) struct ChainStatus {
    /// Retained blocks with contiguous heights starting at `min_height`.
    blocks: VecDeque<Block>,
    /// Height of `blocks[0]`; rises as the head is purged.
    min_height: u64,
    /// Height of the next block on this chain eligible for delivery.
    next_output: u64,
    /// `next_ack[j]` is the smallest height on *this* chain that chain `j`
    /// has not yet acked. Always `chain_count` entries, monotonically
    /// non-decreasing.
    next_ack: Vec<u64>,
}

impl ChainStatus {
    pub(crate) fn new(chain_count: usize) -> Self {
        Self {
            blocks: VecDeque::new(),
            min_height: 0,
            next_output: 0,
            next_ack: vec![0; chain_count],
        }
    }

    /// Height the next appended block must have.
    pub(crate) fn next_height(&self) -> u64 {
        self.min_height + self.blocks.len() as u64
    }

    /// Block at `height`, if still retained.
    pub(crate) fn block_at(&self, height: u64) -> Option<&Block> {
        let index = height.checked_sub(self.min_height)?;
        self.blocks.get(index as usize)
    }

    /// Most recent retained block.
    pub(crate) fn tip(&self) -> Option<&Block> {
        self.blocks.back()
    }

    /// Append a block whose height extends the chain.
    ///
    /// Callers must have run the sanity check; a gap here is a programming
    /// bug.
    pub(crate) fn append(&mut self, block: Block) {
        debug_assert_eq!(block.position.height, self.next_height());
        self.blocks.push_back(block);
    }

    /// Record that `from_chain` acked this chain at `acked_height`.
    pub(crate) fn record_ack(&mut self, from_chain: u32, acked_height: u64) {
        let slot = &mut self.next_ack[from_chain as usize];
        *slot = (*slot).max(acked_height + 1);
    }

    /// Smallest height on this chain not yet acked by `from_chain`.
    pub(crate) fn next_ack(&self, from_chain: u32) -> u64 {
        self.next_ack[from_chain as usize]
    }

    pub(crate) fn min_height(&self) -> u64 {
        self.min_height
    }

    pub(crate) fn next_output(&self) -> u64 {
        self.next_output
    }

    /// Mark the block at `next_output` as delivered.
    pub(crate) fn advance_output(&mut self) {
        self.next_output += 1;
    }

    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn next_ack_vector(&self) -> &[u64] {
        &self.next_ack
    }

    /// Highest height that is safe to purge, if any.
    ///
    /// A height is safe once it is delivered and every chain has acked past
    /// it. Nothing is safe before the first delivery.
    pub(crate) fn calc_purge_height(&self) -> Option<u64> {
        let floor = self
            .next_ack
            .iter()
            .copied()
            .fold(self.next_output, u64::min);
        let safe = floor.checked_sub(1)?;
        if safe < self.min_height {
            return None;
        }
        Some(safe)
    }

    /// Drop every block up to the safe height, returning their hashes so
    /// the caller can evict its index.
    pub(crate) fn purge(&mut self) -> Vec<Hash> {
        let Some(safe) = self.calc_purge_height() else {
            return Vec::new();
        };
        let count = (safe - self.min_height + 1) as usize;
        let purged = self.blocks.drain(..count).map(|b| b.hash).collect();
        self.min_height = safe + 1;
        purged
    }

    #[cfg(test)]
    pub(crate) fn set_for_test(&mut self, next_output: u64, next_ack: Vec<u64>) {
        self.next_output = next_output;
        self.next_ack = next_ack;
    }

    #[cfg(test)]
    pub(crate) fn set_min_height_for_test(&mut self, min_height: u64) {
        self.min_height = min_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_types::test_utils::{genesis_block, lattice_block};

    fn chain_with_blocks(count: u64) -> ChainStatus {
        let mut chain = ChainStatus::new(4);
        let genesis = genesis_block(0, 0);
        let mut parent = genesis.hash;
        chain.append(genesis);
        for height in 1..count {
            let block = lattice_block(0, height, parent, vec![parent], height);
            parent = block.hash;
            chain.append(block);
        }
        chain
    }

    #[test]
    fn test_calc_purge_height() {
        let mut chain = ChainStatus::new(4);

        // Nothing delivered yet: the safe height underflows.
        chain.set_for_test(0, vec![1, 1, 1, 1]);
        assert_eq!(chain.calc_purge_height(), None);

        // Height 0 delivered and acked by everyone.
        chain.set_for_test(1, vec![1, 1, 1, 1]);
        assert_eq!(chain.calc_purge_height(), Some(0));

        // Ack progress caps the safe height below delivery progress.
        chain.set_for_test(2, vec![1, 1, 1, 1]);
        assert_eq!(chain.calc_purge_height(), Some(0));

        // Already purged past the safe height.
        chain.set_min_height_for_test(1);
        chain.set_for_test(1, vec![1, 1, 1, 1]);
        assert_eq!(chain.calc_purge_height(), None);
    }

    #[test]
    fn test_purge_drops_head_and_advances_min_height() {
        let mut chain = chain_with_blocks(3);
        let head_hash = chain.block_at(0).unwrap().hash;
        let second_hash = chain.block_at(1).unwrap().hash;
        chain.set_for_test(1, vec![1, 1, 1, 1]);

        let purged = chain.purge();
        assert_eq!(purged, vec![head_hash]);
        assert_eq!(chain.min_height(), 1);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.block_at(1).unwrap().hash, second_hash);
        assert!(chain.block_at(0).is_none());
    }

    #[test]
    fn test_purge_noop_when_unsafe() {
        let mut chain = chain_with_blocks(3);
        chain.set_for_test(0, vec![1, 1, 1, 1]);
        assert!(chain.purge().is_empty());
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.min_height(), 0);
    }

    #[test]
    fn test_record_ack_is_monotone() {
        let mut chain = ChainStatus::new(4);
        chain.record_ack(2, 5);
        assert_eq!(chain.next_ack(2), 6);
        // A lower ack never rewinds the mark.
        chain.record_ack(2, 1);
        assert_eq!(chain.next_ack(2), 6);
    }

    #[test]
    fn test_next_height_tracks_min_height() {
        let mut chain = chain_with_blocks(3);
        assert_eq!(chain.next_height(), 3);
        chain.set_for_test(3, vec![3, 3, 3, 3]);
        chain.purge();
        assert_eq!(chain.min_height(), 3);
        assert_eq!(chain.len(), 0);
        assert_eq!(chain.next_height(), 3);
    }
}
