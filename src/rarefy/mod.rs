//! Rarefaction: subsampling every sample to a common read depth.

mod replicate;
mod stream;
mod subsample;

pub use replicate::{rarefy_replicates, RarefactionConfig, ReplicateSet};
pub use stream::{stream_rng, stream_seed, StreamKind};
pub use subsample::{
    partition_by_depth, rarefy, rarefy_sample, screen_depth, ExcludedSample, LowDepthPolicy,
    Rarefied,
};
