//! Repeated rarefaction for microbiome count tables.
//!
//! A single rarefaction throws away reads at random, so any statistic
//! computed on it carries subsampling noise. This library rarefies a table
//! many times, runs the same test on every replicate and reports the
//! spread of the statistic alongside an ACAT-combined p-value.
//!
//! # Overview
//!
//! - **data**: Count matrix, sample metadata, formulas and the joined dataset
//! - **taxonomy**: Cleaning lineage strings into readable feature labels
//! - **rarefy**: Subsampling without replacement, one seeded stream per replicate
//! - **diversity**: Alpha indices and beta-diversity distance matrices
//! - **test**: Rank-sum, Kruskal-Wallis and PERMANOVA
//! - **aggregate**: Median, IQR and ACAT across replicates
//! - **analysis**: Configured analyses that tie the above together
//! - **daa**: Typed configuration and result tables for external DA engines
//!
//! # Example
//!
//! ```no_run
//! use microbiome_rarefy::prelude::*;
//!
//! let dataset = Dataset::from_tsv("counts.tsv", "metadata.tsv").unwrap();
//! let rarefaction = RarefactionConfig::new(1000, 100).with_seed(42);
//! let config = AlphaConfig::new(AlphaIndex::Shannon, "group");
//!
//! let report = run_alpha(&dataset, &rarefaction, &config).unwrap();
//! println!("{}", report.aggregated);
//! ```

pub mod aggregate;
pub mod analysis;
pub mod daa;
pub mod data;
pub mod diversity;
pub mod error;
pub mod rarefy;
pub mod taxonomy;
pub mod test;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::aggregate::{
        acat, aggregate, iqr, median, AcatStatistic, AggregatedResult, ReplicateResult,
    };
    pub use crate::analysis::{
        alpha_replicate, run_alpha, run_analysis, run_permanova, AlphaConfig, AlphaReport,
        AnalysisConfig, AnalysisReport, PermanovaReport,
    };
    pub use crate::daa::{
        AnalysisKind, Aldex2Config, AncomBc2Config, CommandEngine, Correction, DaEngine, DaOutput,
        DaOutputs, DaRequest, DaRow, DaTable, Maaslin2Config,
    };
    pub use crate::data::{CountMatrix, Dataset, DesignMatrix, Formula, Metadata, Variable};
    pub use crate::diversity::{
        alpha_diversity, distance_matrix, AlphaIndex, DistanceMatrix, DistanceMetric,
    };
    pub use crate::error::{RarefyError, Result};
    pub use crate::rarefy::{
        rarefy, rarefy_replicates, rarefy_sample, ExcludedSample, LowDepthPolicy,
        RarefactionConfig, ReplicateSet,
    };
    pub use crate::taxonomy::{clean_feature_ids, clean_label, Lineage, Rank};
    pub use crate::test::{
        group_test, kruskal_wallis, permanova, rank_sum_test, GroupTest, PermanovaConfig,
        PermanovaResult,
    };
}
