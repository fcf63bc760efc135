//! BLS12-381 primitives for the trellis ordering engine.
//!
//! Randomness proofs are BLS signatures on block hashes, verified against a
//! per-round group public key aggregated from the qualified DKG dealers'
//! master keys. This crate wraps `blst` with the small surface the engine
//! needs: key generation, sign/verify, and aggregation.

mod bls;

pub use bls::{BlsKeyPair, BlsPublicKey, BlsSignature};

/// Error type for cryptographic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Bytes did not decode to a valid public key.
    #[error("invalid public key encoding")]
    InvalidPublicKey,

    /// Bytes did not decode to a valid signature.
    #[error("invalid signature encoding")]
    InvalidSignature,

    /// Bytes did not decode to a valid secret key.
    #[error("invalid secret key")]
    InvalidSecretKey,

    /// Aggregation was attempted over an empty set.
    #[error("cannot aggregate an empty set")]
    EmptyAggregation,

    /// The underlying aggregation operation failed.
    #[error("aggregation failed")]
    AggregationFailed,
}
