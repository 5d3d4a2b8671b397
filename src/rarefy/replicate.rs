//! Repeated rarefaction with one random stream per replicate.

use super::stream::{stream_rng, StreamKind};
use super::subsample::{rarefy_columns, screen_depth, ExcludedSample, LowDepthPolicy};
use crate::aggregate::AcatStatistic;
use crate::data::CountMatrix;
use crate::error::{RarefyError, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for repeated rarefaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarefactionConfig {
    /// Reads kept per sample.
    pub depth: u64,
    /// Number of independent subsampled tables.
    pub n_replicates: usize,
    /// Base seed; replicate `i` draws from rarefaction stream `i`.
    pub seed: u64,
    /// Handling of samples below `depth`.
    #[serde(default)]
    pub policy: LowDepthPolicy,
    /// How replicate p-values are combined by ACAT.
    #[serde(default)]
    pub acat: AcatStatistic,
}

impl Default for RarefactionConfig {
    fn default() -> Self {
        Self {
            depth: 1000,
            n_replicates: 100,
            seed: 42,
            policy: LowDepthPolicy::Exclude,
            acat: AcatStatistic::Sum,
        }
    }
}

impl RarefactionConfig {
    pub fn new(depth: u64, n_replicates: usize) -> Self {
        Self {
            depth,
            n_replicates,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_policy(mut self, policy: LowDepthPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_acat(mut self, acat: AcatStatistic) -> Self {
        self.acat = acat;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.depth == 0 {
            return Err(RarefyError::InvalidParameter(
                "Rarefaction depth must be at least 1".to_string(),
            ));
        }
        if self.n_replicates == 0 {
            return Err(RarefyError::InvalidParameter(
                "At least one rarefaction replicate is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Random stream for replicate `index`.
    pub fn replicate_rng(&self, index: usize) -> StdRng {
        stream_rng(self.seed, StreamKind::Rarefaction, index as u64)
    }
}

/// An ordered set of rarefied tables sharing features and samples.
#[derive(Debug, Clone)]
pub struct ReplicateSet {
    replicates: Vec<CountMatrix>,
    excluded: Vec<ExcludedSample>,
    config: RarefactionConfig,
}

impl ReplicateSet {
    pub fn len(&self) -> usize {
        self.replicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CountMatrix> {
        self.replicates.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CountMatrix> {
        self.replicates.iter()
    }

    pub fn replicates(&self) -> &[CountMatrix] {
        &self.replicates
    }

    /// Samples below depth, excluded from every replicate.
    pub fn excluded(&self) -> &[ExcludedSample] {
        &self.excluded
    }

    /// Sample IDs present in every replicate.
    pub fn retained_samples(&self) -> &[String] {
        self.replicates
            .first()
            .map(|r| r.sample_ids())
            .unwrap_or(&[])
    }

    pub fn config(&self) -> &RarefactionConfig {
        &self.config
    }
}

/// Produce `config.n_replicates` independently rarefied tables.
///
/// The depth screen runs once, so every replicate holds the same samples.
/// Replicates are drawn in parallel, each from its own seeded stream, so the
/// output does not depend on the number of worker threads.
pub fn rarefy_replicates(counts: &CountMatrix, config: &RarefactionConfig) -> Result<ReplicateSet> {
    config.validate()?;
    let (keep, excluded) = screen_depth(counts, config.depth, config.policy)?;

    info!(
        "Rarefying {} samples to depth {} ({} replicates, {} excluded)",
        keep.len(),
        config.depth,
        config.n_replicates,
        excluded.len()
    );

    let replicates = (0..config.n_replicates)
        .into_par_iter()
        .map(|i| {
            let mut rng = config.replicate_rng(i);
            debug!("Drawing replicate {}", i);
            rarefy_columns(counts, &keep, config.depth, &mut rng).map_err(|e| e.in_replicate(i))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ReplicateSet {
        replicates,
        excluded,
        config: config.clone(),
    })
}
