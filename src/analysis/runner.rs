//! Rarefy, analyse every replicate, aggregate.
//!
//! All configuration and every metadata column an analysis reads are
//! checked before any subsampling starts. Replicates run in parallel; a
//! failing replicate aborts the whole analysis with its index attached.

use super::config::{AlphaConfig, AnalysisConfig};
use super::report::{
    alpha_results, permanova_results, AlphaReplicate, AlphaReport, AnalysisReport, PermanovaReport,
};
use crate::aggregate::{aggregate, median};
use crate::data::{CountMatrix, Dataset, Metadata};
use crate::diversity::{alpha_diversity, distance_matrix};
use crate::error::{RarefyError, Result};
use crate::rarefy::{rarefy_replicates, RarefactionConfig};
use crate::test::{group_test, permanova_from_stream, PermanovaConfig, PermanovaResult};
use log::info;
use rayon::prelude::*;

/// Alpha diversity of one table and the test of its groups.
pub fn alpha_replicate(
    counts: &CountMatrix,
    metadata: &Metadata,
    config: &AlphaConfig,
) -> Result<AlphaReplicate> {
    if !metadata.has_column(&config.group_column) {
        return Err(RarefyError::MissingColumn(config.group_column.clone()));
    }
    let values = alpha_diversity(counts, config.index);
    let groups: Vec<Option<String>> = values
        .iter()
        .map(|(sid, _)| {
            metadata
                .get(sid, &config.group_column)
                .and_then(|v| v.label())
        })
        .collect();
    let scores: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
    let test = group_test(&scores, &groups)?;
    Ok(AlphaReplicate { values, test })
}

/// Median of each sample's value across replicates.
fn per_sample_median(replicates: &[AlphaReplicate]) -> Vec<(String, f64)> {
    let Some(first) = replicates.first() else {
        return Vec::new();
    };
    first
        .values
        .iter()
        .enumerate()
        .filter_map(|(j, (sid, _))| {
            let column: Vec<f64> = replicates.iter().map(|r| r.values[j].1).collect();
            median(&column).map(|m| (sid.clone(), m))
        })
        .collect()
}

fn prepare(
    dataset: &Dataset,
    rarefaction: &RarefactionConfig,
    columns: &[String],
) -> Result<Dataset> {
    rarefaction.validate()?;
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
    dataset.require_columns(&columns)?;
    dataset.clone().drop_missing(&columns)
}

/// Alpha diversity over `rarefaction.n_replicates` rarefied tables.
pub fn run_alpha(
    dataset: &Dataset,
    rarefaction: &RarefactionConfig,
    config: &AlphaConfig,
) -> Result<AlphaReport> {
    config.validate()?;
    let dataset = prepare(dataset, rarefaction, &[config.group_column.clone()])?;
    let set = rarefy_replicates(dataset.counts(), rarefaction)?;

    info!(
        "Computing {} diversity for {} replicates",
        config.index,
        set.len()
    );
    let replicates = set
        .replicates()
        .par_iter()
        .enumerate()
        .map(|(i, counts)| {
            alpha_replicate(counts, dataset.metadata(), config).map_err(|e| e.in_replicate(i))
        })
        .collect::<Result<Vec<_>>>()?;

    let aggregated = aggregate(&alpha_results(&replicates), rarefaction.acat)?;
    Ok(AlphaReport {
        config: config.clone(),
        rarefaction: rarefaction.clone(),
        per_sample_median: per_sample_median(&replicates),
        replicates,
        aggregated,
        excluded: set.excluded().to_vec(),
        dropped: dataset.dropped().to_vec(),
    })
}

/// PERMANOVA over `rarefaction.n_replicates` rarefied tables.
///
/// Replicate `i` draws its permutations from permutation streams
/// `i * n_permutations ..`, so no two replicates share a stream.
pub fn run_permanova(
    dataset: &Dataset,
    rarefaction: &RarefactionConfig,
    config: &PermanovaConfig,
) -> Result<PermanovaReport> {
    config.validate()?;
    let dataset = prepare(dataset, rarefaction, &config.required_columns()?)?;
    let set = rarefy_replicates(dataset.counts(), rarefaction)?;

    info!(
        "Running PERMANOVA ({}, {} permutations) on {} replicates",
        config.metric,
        config.n_permutations,
        set.len()
    );
    let replicates: Vec<PermanovaResult> = set
        .replicates()
        .par_iter()
        .enumerate()
        .map(|(i, counts)| {
            let first_stream = (i as u64).wrapping_mul(config.n_permutations as u64);
            distance_matrix(counts, config.metric)
                .and_then(|dist| {
                    permanova_from_stream(&dist, dataset.metadata(), config, first_stream)
                })
                .map_err(|e| e.in_replicate(i))
        })
        .collect::<Result<Vec<_>>>()?;

    let aggregated = aggregate(&permanova_results(&replicates), rarefaction.acat)?;
    let r_squared: Vec<f64> = replicates.iter().map(|r| r.r_squared).collect();
    Ok(PermanovaReport {
        config: config.clone(),
        rarefaction: rarefaction.clone(),
        r_squared_median: median(&r_squared).ok_or(RarefyError::EmptyReplicates)?,
        replicates,
        aggregated,
        excluded: set.excluded().to_vec(),
        dropped: dataset.dropped().to_vec(),
    })
}

/// Run whichever analysis `config` describes.
pub fn run_analysis(dataset: &Dataset, config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;
    match config {
        AnalysisConfig::Alpha { rarefaction, alpha } => {
            run_alpha(dataset, rarefaction, alpha).map(AnalysisReport::Alpha)
        }
        AnalysisConfig::Permanova {
            rarefaction,
            permanova,
        } => run_permanova(dataset, rarefaction, permanova).map(AnalysisReport::Permanova),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diversity::AlphaIndex;

    fn dataset(groups: &[&str]) -> Dataset {
        let columns: Vec<Vec<u64>> = (0..groups.len() as u64)
            .map(|i| vec![300 + 40 * i, 200, 150 + 10 * i, 100, 50 + i])
            .collect();
        let sample_ids: Vec<String> = (0..groups.len()).map(|i| format!("S{}", i)).collect();
        let counts = CountMatrix::from_columns(
            &columns,
            (1..=5).map(|f| format!("f{}", f)).collect(),
            sample_ids.clone(),
        )
        .unwrap();
        let rows = sample_ids
            .into_iter()
            .zip(groups)
            .map(|(s, g)| (s, vec![g.to_string()]))
            .collect();
        let metadata = Metadata::from_rows(vec!["group".into()], rows).unwrap();
        Dataset::new(counts, metadata).unwrap()
    }

    #[test]
    fn test_alpha_replicate_values_and_test() {
        let ds = dataset(&["a", "a", "a", "b", "b", "b"]);
        let config = AlphaConfig::new(AlphaIndex::Observed, "group");
        let rep = alpha_replicate(ds.counts(), ds.metadata(), &config).unwrap();
        assert_eq!(rep.values.len(), 6);
        assert!(rep.values.iter().all(|(_, v)| *v == 5.0));
        assert_eq!(rep.test.groups, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_column_fails_before_rarefaction() {
        let ds = dataset(&["a", "b", "a", "b"]);
        let err = run_alpha(
            &ds,
            &RarefactionConfig::new(500, 3),
            &AlphaConfig::new(AlphaIndex::Shannon, "diet"),
        )
        .unwrap_err();
        assert!(matches!(err, RarefyError::MissingColumn(ref c) if c == "diet"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_replicate_failure_carries_index() {
        // Only one group survives, so every replicate's test fails.
        let ds = dataset(&["a", "a", "a", "a"]);
        let err = run_alpha(
            &ds,
            &RarefactionConfig::new(500, 2),
            &AlphaConfig::new(AlphaIndex::Shannon, "group"),
        )
        .unwrap_err();
        assert!(matches!(err, RarefyError::Replicate { .. }));
    }

    #[test]
    fn test_run_alpha_summary() {
        let ds = dataset(&["a", "a", "a", "b", "b", "b"]);
        let report = run_alpha(
            &ds,
            &RarefactionConfig::new(700, 4),
            &AlphaConfig::new(AlphaIndex::Shannon, "group"),
        )
        .unwrap();
        assert_eq!(report.replicates.len(), 4);
        assert_eq!(report.aggregated.n_replicates, 4);
        assert_eq!(report.per_sample_median.len(), 6);
        assert!(report.excluded.is_empty());
    }
}
