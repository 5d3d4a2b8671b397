//! Cross-replicate aggregation of statistics and p-values.

pub mod acat;
pub mod summary;

pub use acat::{acat, AcatStatistic};
pub use summary::{iqr, median, quantile};

use crate::error::{RarefyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Test outcome of one rarefied replicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicateResult {
    pub replicate: usize,
    pub statistic: f64,
    pub p_value: f64,
}

/// Summary over all replicates of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub n_replicates: usize,
    pub statistic_median: f64,
    pub statistic_iqr: f64,
    pub p_value_median: f64,
    /// ACAT combination of every replicate p-value.
    pub p_value_acat: f64,
}

impl fmt::Display for AggregatedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Replicates:           {}", self.n_replicates)?;
        writeln!(f, "Statistic median:     {:.4}", self.statistic_median)?;
        writeln!(f, "Statistic IQR:        {:.4}", self.statistic_iqr)?;
        writeln!(f, "P-value median:       {:.4e}", self.p_value_median)?;
        writeln!(f, "P-value ACAT:         {:.4e}", self.p_value_acat)?;
        Ok(())
    }
}

/// Median and IQR of the statistics, median and ACAT of the p-values.
///
/// `statistic` picks the ACAT form; see [`AcatStatistic`].
///
/// Results are ordered by replicate index first, so the output does not
/// depend on the order replicates finished in.
pub fn aggregate(results: &[ReplicateResult], statistic: AcatStatistic) -> Result<AggregatedResult> {
    if results.is_empty() {
        return Err(RarefyError::EmptyReplicates);
    }
    let mut ordered = results.to_vec();
    ordered.sort_by_key(|r| r.replicate);

    if let Some(bad) = ordered
        .iter()
        .find(|r| !(0.0..=1.0).contains(&r.p_value))
    {
        return Err(RarefyError::InvalidPValue {
            replicate: bad.replicate,
            value: bad.p_value,
        });
    }

    let statistics: Vec<f64> = ordered.iter().map(|r| r.statistic).collect();
    let p_values: Vec<f64> = ordered.iter().map(|r| r.p_value).collect();

    // Non-empty input, so the order statistics exist.
    let (Some(statistic_median), Some(statistic_iqr), Some(p_value_median)) =
        (median(&statistics), iqr(&statistics), median(&p_values))
    else {
        return Err(RarefyError::EmptyReplicates);
    };

    Ok(AggregatedResult {
        n_replicates: ordered.len(),
        statistic_median,
        statistic_iqr,
        p_value_median,
        p_value_acat: acat(&p_values, None, statistic)?,
    })
}
