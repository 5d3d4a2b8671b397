//! Statistical tests applied to each rarefied replicate.


pub(crate) use permanova::permanova_from_stream;
pub use permanova::{permanova, PermanovaConfig, PermanovaResult};
pub use rank::{group_test, kruskal_wallis, rank_sum_test, GroupTest, GroupTestMethod};
