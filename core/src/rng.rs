//! Deterministic random number generation.
//!
//! RULE: No clustering code may call a platform RNG.
//! Every seeded algorithm draws from an AlgorithmRng derived from
//! the single master seed in PipelineConfig.
//!
//! Each algorithm gets its own stream, seeded from
//! (master_seed XOR slot_index * golden ratio). This means:
//!   - Two runs with the same inputs produce identical labels.
//!   - Adding a new slot never changes existing algorithms' streams.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Master seed used when the configuration does not override it.
pub const DEFAULT_SEED: u64 = 42;

/// A named, deterministic RNG for a single algorithm.
#[derive(Clone)]
pub struct AlgorithmRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl AlgorithmRng {
    /// Create an RNG from the master seed and a stable slot index.
    /// The index must never change once assigned.
    pub fn new(master_seed: u64, slot_index: u64) -> Self {
        let derived_seed = master_seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Sample from a simplified Pareto distribution.
    pub fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u = self.next_f64().max(1e-10);
        x_min * u.powf(-1.0 / alpha)
    }

    /// Standard normal draw (Box-Muller).
    pub fn standard_normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Hand out the underlying generator for libraries that take `Rng + Clone`.
    pub fn into_inner(self) -> Pcg64Mcg {
        self.inner
    }
}

/// All algorithm RNGs for one pipeline invocation, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_slot(&self, slot: RngSlot) -> AlgorithmRng {
        AlgorithmRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable slot assignments.
/// NEVER reorder or remove entries; only append.
/// Reordering changes every algorithm's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngSlot {
    KMeans = 0,
    Gmm = 1,
    Spectral = 2,
    AffinityPropagation = 3,
    DemoData = 4,
}

impl RngSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::KMeans => "kmeans",
            Self::Gmm => "gmm",
            Self::Spectral => "spectral",
            Self::AffinityPropagation => "affinity_propagation",
            Self::DemoData => "demo_data",
        }
    }
}
