//! Per-analysis reports and their TSV/JSON output.

use crate::aggregate::{AggregatedResult, ReplicateResult};
use crate::analysis::AlphaConfig;
use crate::data::DroppedSample;
use crate::error::Result;
use crate::rarefy::{ExcludedSample, RarefactionConfig};
use crate::test::{GroupTest, PermanovaConfig, PermanovaResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Alpha diversity of one rarefied table and its group comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaReplicate {
    /// `(sample_id, index value)` in table order.
    pub values: Vec<(String, f64)>,
    pub test: GroupTest,
}

pub(super) fn alpha_results(replicates: &[AlphaReplicate]) -> Vec<ReplicateResult> {
    replicates
        .iter()
        .enumerate()
        .map(|(replicate, r)| ReplicateResult {
            replicate,
            statistic: r.test.statistic,
            p_value: r.test.p_value,
        })
        .collect()
}

pub(super) fn permanova_results(replicates: &[PermanovaResult]) -> Vec<ReplicateResult> {
    replicates
        .iter()
        .enumerate()
        .map(|(replicate, r)| ReplicateResult {
            replicate,
            statistic: r.f_statistic,
            p_value: r.p_value,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaReport {
    pub config: AlphaConfig,
    pub rarefaction: RarefactionConfig,
    pub replicates: Vec<AlphaReplicate>,
    /// Median index value per sample across replicates.
    pub per_sample_median: Vec<(String, f64)>,
    pub aggregated: AggregatedResult,
    /// Samples below the rarefaction depth.
    pub excluded: Vec<ExcludedSample>,
    /// Samples lost when joining or for missing metadata.
    pub dropped: Vec<DroppedSample>,
}

impl AlphaReport {
    pub fn replicate_results(&self) -> Vec<ReplicateResult> {
        alpha_results(&self.replicates)
    }

    /// Write one row per sample: `sample_id`, then the median index value.
    pub fn write_sample_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "sample_id\t{}_median", self.config.index)?;
        for (sample, value) in &self.per_sample_median {
            writeln!(writer, "{}\t{:.6}", sample, value)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanovaReport {
    pub config: PermanovaConfig,
    pub rarefaction: RarefactionConfig,
    pub replicates: Vec<PermanovaResult>,
    pub r_squared_median: f64,
    pub aggregated: AggregatedResult,
    pub excluded: Vec<ExcludedSample>,
    pub dropped: Vec<DroppedSample>,
}

impl PermanovaReport {
    pub fn replicate_results(&self) -> Vec<ReplicateResult> {
        permanova_results(&self.replicates)
    }
}

/// Result of [`run_analysis`](crate::analysis::run_analysis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum AnalysisReport {
    Alpha(AlphaReport),
    Permanova(PermanovaReport),
}

impl AnalysisReport {
    pub fn aggregated(&self) -> &AggregatedResult {
        match self {
            AnalysisReport::Alpha(r) => &r.aggregated,
            AnalysisReport::Permanova(r) => &r.aggregated,
        }
    }

    pub fn excluded(&self) -> &[ExcludedSample] {
        match self {
            AnalysisReport::Alpha(r) => &r.excluded,
            AnalysisReport::Permanova(r) => &r.excluded,
        }
    }

    pub fn replicate_results(&self) -> Vec<ReplicateResult> {
        match self {
            AnalysisReport::Alpha(r) => r.replicate_results(),
            AnalysisReport::Permanova(r) => r.replicate_results(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the per-replicate statistic and p-value table.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "replicate\tstatistic\tp_value")?;
        for r in self.replicate_results() {
            writeln!(writer, "{}\t{:.6}\t{:.6e}", r.replicate, r.statistic, r.p_value)?;
        }
        writer.flush()?;
        Ok(())
    }
}
