//! Governance oracle for the trellis ordering engine.
//!
//! Governance decides per-round protocol parameters and publishes the DKG
//! artifacts (master public keys and complaints) from which a round's group
//! public key is derived. The engine only ever *reads* governance state, so
//! the whole surface is the [`Governance`] trait; production plugs in the
//! on-chain oracle, tests use [`StaticGovernance`].

mod dkg;

pub use dkg::{DkgComplaint, DkgError, DkgGroupPublicKey, DkgMasterPublicKey};

use std::collections::HashMap;
use std::sync::RwLock;

/// Per-round protocol configuration reported by governance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundConfig {
    /// Number of author chains in the lattice for this round.
    pub chain_count: u32,
    /// Size of the DKG set. The randomness verification threshold is
    /// `dkg_set_size / 3 + 1`.
    pub dkg_set_size: u32,
}

/// Read-only oracle over governance decisions.
///
/// Round boundaries are whatever governance says they are; the engine never
/// derives them itself.
pub trait Governance: Send + Sync {
    /// Protocol configuration for `round`.
    fn configuration(&self, round: u64) -> RoundConfig;

    /// Whether the DKG for `round` has completed.
    fn is_dkg_final(&self, round: u64) -> bool;

    /// Master public keys registered by dealers for `round`.
    fn dkg_master_public_keys(&self, round: u64) -> Vec<DkgMasterPublicKey>;

    /// Complaints filed against dealers for `round`.
    fn dkg_complaints(&self, round: u64) -> Vec<DkgComplaint>;
}

/// Fixed-configuration governance for tests and local deployments.
///
/// Uses interior mutability so a shared handle can flip DKG finality or
/// register keys while the engine holds the same `Arc`.
pub struct StaticGovernance {
    config: RoundConfig,
    inner: RwLock<StaticGovernanceInner>,
}

#[derive(Default)]
struct StaticGovernanceInner {
    finalized_rounds: HashMap<u64, bool>,
    master_public_keys: HashMap<u64, Vec<DkgMasterPublicKey>>,
    complaints: HashMap<u64, Vec<DkgComplaint>>,
}

impl StaticGovernance {
    /// Create with a single configuration used for every round.
    pub fn new(config: RoundConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(StaticGovernanceInner::default()),
        }
    }

    /// Mark the DKG for `round` as final.
    pub fn set_dkg_final(&self, round: u64) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.finalized_rounds.insert(round, true);
    }

    /// Register a dealer's master public key for its round.
    pub fn add_master_public_key(&self, key: DkgMasterPublicKey) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.master_public_keys.entry(key.round).or_default().push(key);
    }

    /// File a complaint against a dealer for its round.
    pub fn add_complaint(&self, complaint: DkgComplaint) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.complaints.entry(complaint.round).or_default().push(complaint);
    }
}

impl Governance for StaticGovernance {
    fn configuration(&self, _round: u64) -> RoundConfig {
        self.config
    }

    fn is_dkg_final(&self, round: u64) -> bool {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner.finalized_rounds.get(&round).copied().unwrap_or(false)
    }

    fn dkg_master_public_keys(&self, round: u64) -> Vec<DkgMasterPublicKey> {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner
            .master_public_keys
            .get(&round)
            .cloned()
            .unwrap_or_default()
    }

    fn dkg_complaints(&self, round: u64) -> Vec<DkgComplaint> {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner.complaints.get(&round).cloned().unwrap_or_default()
    }
}
