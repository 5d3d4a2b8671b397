//! Seeded random streams keyed by purpose and index.
//!
//! Rarefaction replicates and permutation shuffles both start from a
//! user-supplied base seed. Each purpose gets its own domain, and the
//! `(seed, domain, index)` triple is mixed before seeding `StdRng`, so a
//! subsampling stream never coincides with a permutation stream even when
//! both configs carry the same seed.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// What a random stream is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Read subsampling for one rarefaction replicate.
    Rarefaction,
    /// Label shuffles for one PERMANOVA permutation.
    Permutation,
}

impl StreamKind {
    fn domain(self) -> u64 {
        match self {
            StreamKind::Rarefaction => 0x7261_7265_6679_0001,
            StreamKind::Permutation => 0x7065_726d_7574_0002,
        }
    }
}

/// SplitMix64 finalizer.
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for stream `index` of `kind` under base `seed`.
pub fn stream_seed(seed: u64, kind: StreamKind, index: u64) -> u64 {
    mix(mix(seed ^ kind.domain()).wrapping_add(index))
}

/// Random stream `index` of `kind` under base `seed`.
pub fn stream_rng(seed: u64, kind: StreamKind, index: u64) -> StdRng {
    StdRng::seed_from_u64(stream_seed(seed, kind, index))
}
