//! End-to-end pipeline test: lattice delivery feeding the compaction chain.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use trellis_compaction::CompactionChain;
use trellis_governance::{RoundConfig, StaticGovernance};
use trellis_lattice::BlockLattice;
use trellis_types::test_utils::genesis_block;
use trellis_types::{Block, BlockRandomnessResult, Hash, Position};

const CHAIN_COUNT: u32 = 4;

fn governance() -> Arc<StaticGovernance> {
    Arc::new(StaticGovernance::new(RoundConfig {
        chain_count: CHAIN_COUNT,
        dkg_set_size: 4,
    }))
}

/// Drive a round-0 lattice into the compaction chain and check that blocks
/// come out finalized in delivery order with gapless heights.
#[test]
fn test_round_zero_pipeline() {
    let mut lattice = BlockLattice::new(0, CHAIN_COUNT);
    let compaction = CompactionChain::new(governance());
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut delivery_order: Vec<Hash> = Vec::new();

    let feed = |lattice: &mut BlockLattice, block: Block, order: &mut Vec<Hash>| {
        for delivered in lattice.add_block(block).expect("valid block") {
            order.push(delivered.hash);
            compaction.register_block(&delivered);
            compaction.process_block(delivered);
        }
    };

    for chain_id in 0..CHAIN_COUNT {
        feed(
            &mut lattice,
            genesis_block(chain_id, u64::from(chain_id)),
            &mut delivery_order,
        );
    }
    for i in 0..200u64 {
        let mut block = Block {
            position: Position {
                chain_id: rng.gen_range(0..CHAIN_COUNT),
                ..Position::default()
            },
            timestamp: 1_000 + i,
            ..Block::default()
        };
        lattice.prepare_block(&mut block);
        block.seal();
        feed(&mut lattice, block, &mut delivery_order);
    }

    // Round 0 bypasses randomness, so everything is extractable at once.
    let released = compaction.extract_blocks();
    assert_eq!(released.len(), delivery_order.len());

    let released_hashes: Vec<Hash> = released.iter().map(|b| b.hash).collect();
    assert_eq!(released_hashes, delivery_order);

    let heights: Vec<u64> = released.iter().map(|b| b.finalization.height).collect();
    let expected: Vec<u64> = (1..=delivery_order.len() as u64).collect();
    assert_eq!(heights, expected);
}

/// Later-round blocks stay queued until their randomness arrives, and the
/// queue preserves finalization order across partial unlocks.
#[test]
fn test_randomness_gated_pipeline() {
    let mut lattice = BlockLattice::new(1, CHAIN_COUNT);
    let compaction = CompactionChain::new(governance());

    let mut delivered: Vec<Block> = Vec::new();
    for chain_id in 0..CHAIN_COUNT {
        let mut genesis = genesis_block(chain_id, u64::from(chain_id));
        genesis.position.round = 1;
        genesis.seal();
        delivered.extend(lattice.add_block(genesis).expect("valid genesis"));
    }
    for block in &delivered {
        compaction.register_block(block);
        compaction.process_block(block.clone());
    }
    assert!(compaction.extract_blocks().is_empty());

    // Unlock out of order; extraction still respects finalization order.
    for block in delivered.iter().rev() {
        compaction
            .process_randomness_result(&BlockRandomnessResult {
                block_hash: block.hash,
                randomness: vec![0x5A; 96],
            })
            .unwrap();
    }
    let released = compaction.extract_blocks();
    let heights: Vec<u64> = released.iter().map(|b| b.finalization.height).collect();
    assert_eq!(heights, vec![1, 2, 3, 4]);
}
