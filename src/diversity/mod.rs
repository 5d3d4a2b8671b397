//! Alpha-diversity indices and beta-diversity distances.

pub mod alpha;
pub mod distance;

pub use alpha::{alpha_diversity, AlphaIndex};
pub use distance::{distance_matrix, DistanceMatrix, DistanceMetric};
