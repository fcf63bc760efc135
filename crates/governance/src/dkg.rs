//! DKG group public keys.
//!
//! A round's group public key is derived from the master public keys the
//! dealers registered with governance, minus any dealer named by a
//! complaint. Randomness proofs are BLS signatures on the block hash and
//! verify against the group key.

use std::collections::HashSet;
use tracing::debug;
use trellis_crypto::{BlsPublicKey, BlsSignature, CryptoError};
use trellis_types::{Hash, ValidatorId};

/// A dealer's master public key for a DKG round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DkgMasterPublicKey {
    /// Round the key was registered for.
    pub round: u64,
    /// Dealer that registered the key.
    pub proposer: ValidatorId,
    /// The key itself.
    pub public_key: BlsPublicKey,
}

/// A complaint accusing a dealer of misbehaving during the DKG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DkgComplaint {
    /// Round the complaint applies to.
    pub round: u64,
    /// The accused dealer.
    pub proposer: ValidatorId,
}

/// Error constructing a group public key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DkgError {
    /// Too few dealers survived complaint filtering.
    #[error("{qualified} qualified dealers, need at least {threshold}")]
    NotEnoughQualified { qualified: usize, threshold: usize },

    /// Key aggregation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Group public key for a round, aggregated from qualified dealers.
#[derive(Debug, Clone)]
pub struct DkgGroupPublicKey {
    round: u64,
    threshold: usize,
    group_key: BlsPublicKey,
}

impl DkgGroupPublicKey {
    /// Build the group key for `round`.
    ///
    /// Dealers named by any complaint for the round are disqualified; at
    /// least `threshold` qualified dealers must remain.
    pub fn new(
        round: u64,
        master_keys: &[DkgMasterPublicKey],
        complaints: &[DkgComplaint],
        threshold: usize,
    ) -> Result<Self, DkgError> {
        let accused: HashSet<ValidatorId> = complaints
            .iter()
            .filter(|c| c.round == round)
            .map(|c| c.proposer)
            .collect();
        let qualified: Vec<BlsPublicKey> = master_keys
            .iter()
            .filter(|k| k.round == round && !accused.contains(&k.proposer))
            .map(|k| k.public_key.clone())
            .collect();
        if qualified.len() < threshold {
            return Err(DkgError::NotEnoughQualified {
                qualified: qualified.len(),
                threshold,
            });
        }
        debug!(round, qualified = qualified.len(), threshold, "DKG group key built");
        let group_key = BlsPublicKey::aggregate(&qualified)?;
        Ok(Self {
            round,
            threshold,
            group_key,
        })
    }

    /// Round this key verifies for.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Qualification threshold the key was built with.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Verify a randomness proof over `hash`.
    ///
    /// Malformed signature bytes simply fail verification.
    pub fn verify_signature(&self, hash: Hash, randomness: &[u8]) -> bool {
        let Ok(signature) = BlsSignature::from_slice(randomness) else {
            return false;
        };
        self.group_key.verify(hash.as_bytes(), &signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_crypto::BlsKeyPair;

    fn dkg_set(round: u64, count: u64) -> (Vec<BlsKeyPair>, Vec<DkgMasterPublicKey>) {
        let pairs: Vec<BlsKeyPair> = (0..count)
            .map(|i| BlsKeyPair::from_ikm(&[i as u8 + 1; 32]))
            .collect();
        let keys = pairs
            .iter()
            .enumerate()
            .map(|(i, p)| DkgMasterPublicKey {
                round,
                proposer: ValidatorId(i as u64),
                public_key: p.public_key(),
            })
            .collect();
        (pairs, keys)
    }

    fn group_sign(pairs: &[BlsKeyPair], message: &[u8]) -> Vec<u8> {
        let sigs: Vec<_> = pairs.iter().map(|p| p.sign(message)).collect();
        BlsSignature::aggregate(&sigs).unwrap().to_bytes().to_vec()
    }

    #[test]
    fn test_group_key_verifies_group_signature() {
        let (pairs, keys) = dkg_set(1, 4);
        let group = DkgGroupPublicKey::new(1, &keys, &[], 2).unwrap();

        let hash = Hash::digest(b"finalized block");
        let randomness = group_sign(&pairs, hash.as_bytes());
        assert!(group.verify_signature(hash, &randomness));
        assert!(!group.verify_signature(Hash::digest(b"other"), &randomness));
        assert!(!group.verify_signature(hash, b"garbage"));
    }

    #[test]
    fn test_complaint_disqualifies_dealer() {
        let (pairs, keys) = dkg_set(1, 4);
        let complaints = [DkgComplaint {
            round: 1,
            proposer: ValidatorId(3),
        }];
        let group = DkgGroupPublicKey::new(1, &keys, &complaints, 2).unwrap();

        let hash = Hash::digest(b"block");
        // Proof from all four dealers no longer matches the filtered key.
        assert!(!group.verify_signature(hash, &group_sign(&pairs, hash.as_bytes())));
        // Proof from the three qualified dealers does.
        assert!(group.verify_signature(hash, &group_sign(&pairs[..3], hash.as_bytes())));
    }

    #[test]
    fn test_threshold_enforced() {
        let (_, keys) = dkg_set(1, 4);
        let complaints: Vec<DkgComplaint> = (0..3)
            .map(|i| DkgComplaint {
                round: 1,
                proposer: ValidatorId(i),
            })
            .collect();
        let err = DkgGroupPublicKey::new(1, &keys, &complaints, 2).unwrap_err();
        assert_eq!(
            err,
            DkgError::NotEnoughQualified {
                qualified: 1,
                threshold: 2
            }
        );
    }

    #[test]
    fn test_other_round_artifacts_ignored() {
        let (_, mut keys) = dkg_set(1, 3);
        let (_, other) = dkg_set(2, 2);
        keys.extend(other);
        let group = DkgGroupPublicKey::new(1, &keys, &[], 3).unwrap();
        assert_eq!(group.round(), 1);
        assert_eq!(group.threshold(), 3);
    }
}
