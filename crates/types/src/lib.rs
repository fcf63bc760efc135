//! Core types for the trellis ordering engine.
//!
//! This crate provides the foundational types used throughout the engine:
//!
//! - **Primitives**: [`Hash`], [`ValidatorId`]
//! - **Lattice types**: [`Block`], [`Position`], [`Finalization`]
//! - **Randomness**: [`BlockRandomnessResult`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer. Block
//! hashing uses a fixed canonical byte encoding (see
//! [`Block::canonical_bytes`]) so that hashes are stable across
//! implementations and serde versions.

mod block;
mod hash;
mod identifiers;
mod randomness;

pub use block::{Block, Finalization, Position};
pub use hash::{Hash, HexError};
pub use identifiers::ValidatorId;
pub use randomness::BlockRandomnessResult;

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;
    use rand::RngCore;

    /// Create a hash from raw random bytes drawn from `rng`.
    ///
    /// Useful for tests that need hashes with no preimage (unknown acks,
    /// fork bodies). Deterministic when `rng` is seeded.
    pub fn random_hash(rng: &mut impl RngCore) -> Hash {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Hash(bytes)
    }

    /// Build and seal a genesis block for `chain_id`.
    pub fn genesis_block(chain_id: u32, timestamp: u64) -> Block {
        let mut block = Block {
            parent_hash: Hash::ZERO,
            position: Position {
                chain_id,
                round: 0,
                height: 0,
            },
            timestamp,
            ..Block::default()
        };
        block.seal();
        block
    }

    /// Build and seal a block at an explicit position.
    ///
    /// The ack list is sorted into canonical order; callers pass it in any
    /// order.
    pub fn lattice_block(
        chain_id: u32,
        height: u64,
        parent_hash: Hash,
        mut acks: Vec<Hash>,
        timestamp: u64,
    ) -> Block {
        acks.sort_unstable();
        let mut block = Block {
            parent_hash,
            position: Position {
                chain_id,
                round: 0,
                height,
            },
            acks,
            timestamp,
            ..Block::default()
        };
        block.seal();
        block
    }
}
