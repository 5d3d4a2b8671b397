//! Integration tests for repeated rarefaction, per-replicate analysis and
//! aggregation.

use approx::assert_relative_eq;
use microbiome_rarefy::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Twelve samples: six `low` samples dominated by two taxa, six `high`
/// samples spread evenly over six taxa.
fn diversity_counts() -> CountMatrix {
    let mut columns = Vec::new();
    for i in 0..12u64 {
        if i < 6 {
            columns.push(vec![450 + 10 * i, 430, 10, 10, 5, 5]);
        } else {
            columns.push(vec![150, 150 + 5 * i, 150, 150, 150, 150]);
        }
    }
    CountMatrix::from_columns(
        &columns,
        (0..6).map(|f| format!("taxon_{}", f)).collect(),
        (0..12).map(|s| format!("S{}", s)).collect(),
    )
    .unwrap()
}

fn write_counts_tsv(counts: &CountMatrix) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    counts.to_tsv(file.path()).unwrap();
    file
}

fn write_metadata_tsv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "sample_id\tgroup\tsite").unwrap();
    for i in 0..12 {
        let group = if i < 6 { "low" } else { "high" };
        let site = if i % 2 == 0 { "north" } else { "south" };
        writeln!(file, "S{}\t{}\t{}", i, group, site).unwrap();
    }
    // A sample without counts; dropped when joining.
    writeln!(file, "S99\tlow\tnorth").unwrap();
    file.flush().unwrap();
    file
}

fn load_dataset() -> Dataset {
    let counts = write_counts_tsv(&diversity_counts());
    let metadata = write_metadata_tsv();
    Dataset::from_tsv(counts.path(), metadata.path()).unwrap()
}

#[test]
fn test_low_depth_sample_excluded_from_every_replicate() {
    // Library sizes 500, 1200 and 3000 rarefied to 1000, five times.
    let counts = CountMatrix::from_columns(
        &[vec![300, 200, 0], vec![600, 500, 100], vec![1000, 1500, 500]],
        vec!["f1".into(), "f2".into(), "f3".into()],
        vec!["A".into(), "B".into(), "C".into()],
    )
    .unwrap();

    let config = RarefactionConfig::new(1000, 5).with_seed(2024);
    let set = rarefy_replicates(&counts, &config).unwrap();

    assert_eq!(set.len(), 5);
    assert_eq!(set.excluded().len(), 1);
    assert_eq!(set.excluded()[0].sample_id, "A");
    assert_eq!(set.excluded()[0].depth, 500);
    assert_eq!(set.retained_samples(), &["B".to_string(), "C".to_string()]);

    let original = counts.columns_dense();
    for replicate in set.iter() {
        assert_eq!(replicate.sample_ids(), &["B".to_string(), "C".to_string()]);
        assert_eq!(replicate.col_sums(), vec![1000, 1000]);
        for (col, drawn) in replicate.columns_dense().iter().enumerate() {
            for (feature, &c) in drawn.iter().enumerate() {
                assert!(c <= original[col + 1][feature]);
            }
        }
    }
}

#[test]
fn test_low_depth_fail_policy() {
    let counts = CountMatrix::from_columns(
        &[vec![300, 200], vec![600, 500]],
        vec!["f1".into(), "f2".into()],
        vec!["A".into(), "B".into()],
    )
    .unwrap();
    let config = RarefactionConfig::new(1000, 3).with_policy(LowDepthPolicy::Fail);
    let err = rarefy_replicates(&counts, &config).unwrap_err();
    assert!(matches!(err, RarefyError::InsufficientDepth { ref sample, .. } if sample == "A"));
    assert!(err.is_data());
}

#[test]
fn test_neighbouring_seeds_do_not_shift_replicates() {
    let counts = diversity_counts();
    let a = rarefy_replicates(&counts, &RarefactionConfig::new(500, 3).with_seed(10)).unwrap();
    let again = rarefy_replicates(&counts, &RarefactionConfig::new(500, 3).with_seed(10)).unwrap();
    let b = rarefy_replicates(&counts, &RarefactionConfig::new(500, 3).with_seed(11)).unwrap();

    for i in 0..3 {
        assert_eq!(
            a.get(i).unwrap().columns_dense(),
            again.get(i).unwrap().columns_dense()
        );
    }
    // Seeds are mixed, so replicate i of seed s is not replicate i - 1 of
    // seed s + 1.
    assert_ne!(
        a.get(1).unwrap().columns_dense(),
        b.get(0).unwrap().columns_dense()
    );
    assert_ne!(
        a.get(2).unwrap().columns_dense(),
        b.get(1).unwrap().columns_dense()
    );
}

#[test]
fn test_same_seed_gives_identical_output_for_any_thread_count() {
    let dataset = load_dataset();
    let rarefaction = RarefactionConfig::new(500, 8).with_seed(99);
    let config = AlphaConfig::new(AlphaIndex::Shannon, "group");

    let parallel = run_alpha(&dataset, &rarefaction, &config).unwrap();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap();
    let serial = pool.install(|| run_alpha(&dataset, &rarefaction, &config).unwrap());

    assert_eq!(parallel.aggregated, serial.aggregated);
    assert_eq!(parallel.replicates, serial.replicates);
    assert_eq!(
        AnalysisReport::Alpha(parallel).to_json().unwrap(),
        AnalysisReport::Alpha(serial).to_json().unwrap()
    );
}

#[test]
fn test_alpha_end_to_end_from_files() {
    let dataset = load_dataset();
    assert_eq!(dataset.n_samples(), 12);
    assert_eq!(dataset.dropped().len(), 1);
    assert_eq!(dataset.dropped()[0].sample_id, "S99");

    let rarefaction = RarefactionConfig::new(500, 10).with_seed(1);
    let report = run_alpha(
        &dataset,
        &rarefaction,
        &AlphaConfig::new(AlphaIndex::Shannon, "group"),
    )
    .unwrap();

    assert_eq!(report.replicates.len(), 10);
    assert_eq!(report.aggregated.n_replicates, 10);
    assert!(report.excluded.is_empty());
    // Every replicate separates the groups completely.
    assert!(report.aggregated.p_value_median < 0.05);
    assert!(report.aggregated.p_value_acat < 0.05);
    assert_relative_eq!(report.aggregated.statistic_iqr, 0.0);

    let medians: Vec<f64> = report.per_sample_median.iter().map(|(_, v)| *v).collect();
    assert_eq!(medians.len(), 12);
    assert!(medians[..6].iter().all(|&low| medians[6..].iter().all(|&high| high > low)));

    let out = NamedTempFile::new().unwrap();
    let report = AnalysisReport::Alpha(report);
    report.to_tsv(out.path()).unwrap();
    let text = std::fs::read_to_string(out.path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "replicate\tstatistic\tp_value");
    assert_eq!(lines.len(), 11);
}

#[test]
fn test_permanova_from_yaml_config() {
    let dataset = load_dataset();
    let config = AnalysisConfig::Permanova {
        rarefaction: RarefactionConfig::new(500, 4).with_seed(5),
        permanova: PermanovaConfig::new("~ group")
            .with_metric(DistanceMetric::BrayCurtis)
            .with_permutations(199)
            .with_seed(5),
    };
    let parsed = AnalysisConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
    assert_eq!(parsed, config);

    let report = run_analysis(&dataset, &parsed).unwrap();
    let AnalysisReport::Permanova(permanova) = &report else {
        panic!("expected a PERMANOVA report");
    };
    assert_eq!(permanova.replicates.len(), 4);
    assert!(permanova.r_squared_median > 0.5);
    for replicate in &permanova.replicates {
        assert_eq!(replicate.n_samples, 12);
        assert_eq!(replicate.df_model, 1);
        assert_eq!(replicate.df_residual, 10);
    }
    assert!(report.aggregated().p_value_acat < 0.05);
}

#[test]
fn test_missing_column_fails_before_rarefaction() {
    let dataset = load_dataset();
    // Depth far above any library: a rarefaction error would surface if
    // the column check ran second.
    let rarefaction = RarefactionConfig::new(1_000_000, 5);
    let err = run_permanova(
        &dataset,
        &rarefaction,
        &PermanovaConfig::new("~ group").with_strata("subject"),
    )
    .unwrap_err();
    assert!(matches!(err, RarefyError::MissingColumn(ref c) if c == "subject"));
    assert!(err.is_configuration());
}

#[test]
fn test_unknown_analysis_name() {
    let err = AnalysisConfig::example("beta").unwrap_err();
    assert!(matches!(err, RarefyError::UnknownAnalysis(_)));
    assert!(err.is_configuration());
}

#[test]
fn test_acat_properties() {
    let p = [0.01, 0.02, 0.5, 0.8, 0.99];
    let combined = acat(&p, None, AcatStatistic::Sum).unwrap();
    assert!(combined > 0.0 && combined < 1.0);
    assert!(combined < 0.05);
    assert!((combined - median(&p).unwrap()).abs() > 0.1);

    let reversed: Vec<f64> = p.iter().rev().copied().collect();
    assert_relative_eq!(
        acat(&reversed, None, AcatStatistic::Sum).unwrap(),
        combined,
        epsilon = 1e-12
    );

    for p0 in [1e-6, 0.03, 0.4, 0.9] {
        assert_relative_eq!(
            acat(&[p0; 7], None, AcatStatistic::Mean).unwrap(),
            p0,
            max_relative = 1e-9
        );
    }
}

#[test]
fn test_aggregate_order_independent() {
    let results: Vec<ReplicateResult> = [(0, 2.0, 0.04), (1, 3.5, 0.01), (2, 1.0, 0.2)]
        .iter()
        .map(|&(replicate, statistic, p_value)| ReplicateResult {
            replicate,
            statistic,
            p_value,
        })
        .collect();
    let mut shuffled = results.clone();
    shuffled.rotate_left(1);

    let a = aggregate(&results, AcatStatistic::Sum).unwrap();
    let b = aggregate(&shuffled, AcatStatistic::Sum).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.n_replicates, 3);
    assert_relative_eq!(a.statistic_median, 2.0);
    assert_relative_eq!(a.p_value_median, 0.04);
}

#[test]
fn test_empty_replicates_is_an_error() {
    assert!(matches!(aggregate(&[], AcatStatistic::Sum), Err(RarefyError::EmptyReplicates)));
    assert!(matches!(acat(&[], None, AcatStatistic::Mean), Err(RarefyError::EmptyReplicates)));
}

#[test]
fn test_invalid_p_value_names_replicate() {
    let results = vec![
        ReplicateResult {
            replicate: 0,
            statistic: 1.0,
            p_value: 0.5,
        },
        ReplicateResult {
            replicate: 1,
            statistic: 1.0,
            p_value: f64::NAN,
        },
    ];
    let err = aggregate(&results, AcatStatistic::Sum).unwrap_err();
    assert!(matches!(err, RarefyError::InvalidPValue { replicate: 1, .. }));
}
