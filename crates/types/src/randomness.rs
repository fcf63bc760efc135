//! Block-randomness results from the agreement layer.

use crate::Hash;
use serde::{Deserialize, Serialize};

/// Randomness proof produced for a block by the round's DKG group.
///
/// Ingested by the compaction chain to unlock delivery of the referenced
/// block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRandomnessResult {
    /// Hash of the block the proof is for.
    pub block_hash: Hash,
    /// BLS signature bytes over the block hash.
    pub randomness: Vec<u8>,
}
