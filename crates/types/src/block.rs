//! Block and position types for the lattice.

use crate::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinates of a block within the lattice.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    /// Author chain this block extends.
    pub chain_id: u32,
    /// Consensus round the block was proposed in.
    pub round: u64,
    /// Height on the author chain (0 for genesis).
    pub height: u64,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}:h{}:r{}", self.chain_id, self.height, self.round)
    }
}

/// Finalization metadata stamped by the compaction chain.
///
/// Not part of the block's content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalization {
    /// Monotonic finalization height; 0 until assigned.
    pub height: u64,
    /// Block-randomness proof (BLS signature bytes); empty until received.
    pub randomness: Vec<u8>,
}

/// A block in the lattice.
///
/// Immutable once admitted. `hash` is a pure function of every other field
/// except `finalization`; recompute it with [`Block::compute_hash`] or set it
/// with [`Block::seal`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Content hash, see [`Block::compute_hash`].
    pub hash: Hash,
    /// Hash of the previous block on the same chain; zero for genesis.
    pub parent_hash: Hash,
    /// Lattice coordinates.
    pub position: Position,
    /// Acked block hashes in ascending order. Non-genesis blocks always ack
    /// their parent.
    pub acks: Vec<Hash>,
    /// Proposal time, nanoseconds since the Unix epoch (UTC).
    pub timestamp: u64,
    /// Finalization metadata, assigned after delivery.
    pub finalization: Finalization,
}

impl Block {
    /// Canonical byte encoding used for hashing and persistence.
    ///
    /// Field order is fixed: parent hash, (chain id, round, height), ack
    /// count and acks in sorted order, timestamp. Integers are
    /// little-endian. `hash` and `finalization` are excluded.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(68 + self.acks.len() * 32);
        out.extend_from_slice(self.parent_hash.as_bytes());
        out.extend_from_slice(&self.position.chain_id.to_le_bytes());
        out.extend_from_slice(&self.position.round.to_le_bytes());
        out.extend_from_slice(&self.position.height.to_le_bytes());
        out.extend_from_slice(&(self.acks.len() as u64).to_le_bytes());
        for ack in &self.acks {
            out.extend_from_slice(ack.as_bytes());
        }
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out
    }

    /// Compute the content hash over the canonical encoding.
    pub fn compute_hash(&self) -> Hash {
        Hash::digest(&self.canonical_bytes())
    }

    /// Recompute and store the content hash, returning it.
    pub fn seal(&mut self) -> Hash {
        self.hash = self.compute_hash();
        self.hash
    }

    /// Whether this is a genesis block (height 0 on its chain).
    pub fn is_genesis(&self) -> bool {
        self.position.height == 0
    }
}
