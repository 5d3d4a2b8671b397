//! Subsampling reads without replacement.

use crate::data::CountMatrix;
use crate::error::{RarefyError, Result};
use log::warn;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// What to do with samples whose library size is below the target depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowDepthPolicy {
    /// Drop the sample from every replicate and report it.
    #[default]
    Exclude,
    /// Abort the analysis.
    Fail,
}

/// A sample left out of rarefaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedSample {
    pub sample_id: String,
    pub depth: u64,
}

/// Draw exactly `depth` reads without replacement from one count vector.
///
/// Reads are indexed `0..total`; a uniform index sample is mapped back to
/// features through the cumulative counts, so every feature receives at
/// most its original count.
pub fn rarefy_sample<R: Rng + ?Sized>(counts: &[u64], depth: u64, rng: &mut R) -> Result<Vec<u64>> {
    let total: u64 = counts.iter().sum();
    if total < depth {
        return Err(RarefyError::InsufficientDepth {
            sample: String::new(),
            depth: total,
            target: depth,
        });
    }
    if total == depth {
        return Ok(counts.to_vec());
    }

    let total = usize::try_from(total)
        .map_err(|_| RarefyError::InvalidParameter(format!("Library size {} too large", total)))?;
    let depth = depth as usize;

    let mut picks = index::sample(rng, total, depth).into_vec();
    picks.sort_unstable();

    let mut out = vec![0u64; counts.len()];
    let mut feature = 0usize;
    let mut upper = counts.first().copied().unwrap_or(0) as usize;
    for read in picks {
        while read >= upper {
            feature += 1;
            upper += counts[feature] as usize;
        }
        out[feature] += 1;
    }
    Ok(out)
}

/// Result of rarefying one table.
#[derive(Debug, Clone)]
pub struct Rarefied {
    pub counts: CountMatrix,
    pub excluded: Vec<ExcludedSample>,
}

/// Samples at or above `depth`, and those below it.
pub fn partition_by_depth(counts: &CountMatrix, depth: u64) -> (Vec<usize>, Vec<ExcludedSample>) {
    let mut keep = Vec::new();
    let mut excluded = Vec::new();
    for (idx, &size) in counts.col_sums().iter().enumerate() {
        if size >= depth {
            keep.push(idx);
        } else {
            excluded.push(ExcludedSample {
                sample_id: counts.sample_ids()[idx].clone(),
                depth: size,
            });
        }
    }
    (keep, excluded)
}

/// Check samples against `depth` and apply the low-depth policy.
///
/// Returns indices of the samples to rarefy plus the excluded ones. Fails
/// when the policy is [`LowDepthPolicy::Fail`] and any sample is short, or
/// when no sample reaches the depth.
pub fn screen_depth(
    counts: &CountMatrix,
    depth: u64,
    policy: LowDepthPolicy,
) -> Result<(Vec<usize>, Vec<ExcludedSample>)> {
    if depth == 0 {
        return Err(RarefyError::InvalidParameter(
            "Rarefaction depth must be at least 1".to_string(),
        ));
    }
    let (keep, excluded) = partition_by_depth(counts, depth);

    if let (LowDepthPolicy::Fail, Some(first)) = (policy, excluded.first()) {
        return Err(RarefyError::InsufficientDepth {
            sample: first.sample_id.clone(),
            depth: first.depth,
            target: depth,
        });
    }
    for s in &excluded {
        warn!(
            "Excluding sample '{}' (depth {} < {})",
            s.sample_id, s.depth, depth
        );
    }
    if keep.is_empty() {
        return Err(RarefyError::EmptyData(format!(
            "No samples reach rarefaction depth {}",
            depth
        )));
    }
    Ok((keep, excluded))
}

/// Rarefy every retained sample of a table to `depth`.
pub fn rarefy<R: Rng + ?Sized>(
    counts: &CountMatrix,
    depth: u64,
    policy: LowDepthPolicy,
    rng: &mut R,
) -> Result<Rarefied> {
    let (keep, excluded) = screen_depth(counts, depth, policy)?;
    let rarefied = rarefy_columns(counts, &keep, depth, rng)?;
    Ok(Rarefied {
        counts: rarefied,
        excluded,
    })
}

/// Rarefy the given sample columns, assuming they already pass the depth check.
pub(crate) fn rarefy_columns<R: Rng + ?Sized>(
    counts: &CountMatrix,
    keep: &[usize],
    depth: u64,
    rng: &mut R,
) -> Result<CountMatrix> {
    let dense = counts.columns_dense();
    let mut columns = Vec::with_capacity(keep.len());
    let mut ids = Vec::with_capacity(keep.len());
    for &col in keep {
        let sample_id = &counts.sample_ids()[col];
        let drawn = rarefy_sample(&dense[col], depth, rng).map_err(|e| match e {
            RarefyError::InsufficientDepth { depth: d, target, .. } => {
                RarefyError::InsufficientDepth {
                    sample: sample_id.clone(),
                    depth: d,
                    target,
                }
            }
            other => other,
        })?;
        columns.push(drawn);
        ids.push(sample_id.clone());
    }
    CountMatrix::from_columns(&columns, counts.feature_ids().to_vec(), ids)
}
