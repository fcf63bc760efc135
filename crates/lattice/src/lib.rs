//! Block lattice for the trellis ordering engine.
//!
//! The lattice is a collection of per-author chains whose blocks
//! cross-reference each other via acks. It is driven synchronously by a
//! single caller:
//!
//! - [`BlockLattice::sanity_check`] → accept or reject an announcement
//! - [`BlockLattice::add_block`] → admit a block, emit delivered blocks
//! - [`BlockLattice::prepare_block`] → fill the proposer's side of a block
//!
//! # Determinism
//!
//! Two nodes that admit the same *set* of blocks end up with identical
//! lattice state and identical delivered sets, regardless of arrival order.
//! Admission order only affects the interleaving in which delivered blocks
//! are emitted, never which blocks are delivered or their per-chain order.
//!
//! # Memory
//!
//! After every admission the lattice prunes blocks that are both delivered
//! and acked past by every chain, so retention is bounded by how far the
//! slowest chain lags.

mod chain;
mod lattice;

pub use lattice::{BlockLattice, ChainSummary, SanityError};
