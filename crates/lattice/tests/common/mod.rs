//! Shared harness for lattice integration tests: a seeded DAG generator and
//! a revealer that replays a generated DAG in random but hole-free orders.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use trellis_lattice::BlockLattice;
use trellis_storage::{BlockDatabase, MemBlockDb};
use trellis_types::test_utils::genesis_block;
use trellis_types::{Block, Hash, Position};

/// Generate a valid lattice of `block_count` non-genesis blocks across
/// `chain_count` chains into `db`, using the proposer path itself so every
/// block is well-formed by construction.
pub fn generate_lattice(
    db: &MemBlockDb,
    chain_count: u32,
    block_count: usize,
    seed: u64,
) -> usize {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut scratch = BlockLattice::new(0, chain_count);
    let mut generated = 0;

    for chain_id in 0..chain_count {
        let block = genesis_block(chain_id, u64::from(chain_id));
        db.put(&block).expect("fresh database");
        scratch.add_block(block).expect("genesis is valid");
        generated += 1;
    }

    for i in 0..block_count {
        let mut block = Block {
            position: Position {
                chain_id: rng.gen_range(0..chain_count),
                ..Position::default()
            },
            timestamp: 1_000 + i as u64,
            ..Block::default()
        };
        scratch.prepare_block(&mut block);
        block.seal();
        db.put(&block).expect("fresh hash");
        scratch.add_block(block).expect("prepared block is valid");
        generated += 1;
    }
    generated
}

/// Replays a stored DAG in a random order that never reveals a block before
/// the blocks it acks.
pub struct RandomDagRevealer {
    blocks: Vec<Block>,
    revealed: HashSet<Hash>,
    rng: ChaCha8Rng,
}

impl RandomDagRevealer {
    pub fn new(db: &MemBlockDb, seed: u64) -> Self {
        let blocks = db.get_all().expect("database readable").collect();
        Self {
            blocks,
            revealed: HashSet::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Next block, or `None` once the whole DAG has been revealed.
    pub fn next_block(&mut self) -> Option<Block> {
        let candidates: Vec<usize> = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| {
                !self.revealed.contains(&b.hash)
                    && b.acks.iter().all(|ack| self.revealed.contains(ack))
            })
            .map(|(i, _)| i)
            .collect();
        let index = *candidates.choose(&mut self.rng)?;
        let block = self.blocks[index].clone();
        self.revealed.insert(block.hash);
        Some(block)
    }
}
