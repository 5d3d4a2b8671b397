//! Within-sample (alpha) diversity indices.

use crate::data::CountMatrix;
use crate::error::{RarefyError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported alpha-diversity indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaIndex {
    /// Number of features with a non-zero count.
    Observed,
    /// Shannon entropy with natural log.
    Shannon,
    /// Gini-Simpson, 1 - Σ p².
    Simpson,
    /// 1 / Σ p².
    InverseSimpson,
    /// Bias-corrected Chao1 richness.
    Chao1,
    /// Pielou evenness, H / ln(S).
    Pielou,
}

impl AlphaIndex {
    pub const ALL: [AlphaIndex; 6] = [
        AlphaIndex::Observed,
        AlphaIndex::Shannon,
        AlphaIndex::Simpson,
        AlphaIndex::InverseSimpson,
        AlphaIndex::Chao1,
        AlphaIndex::Pielou,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AlphaIndex::Observed => "observed",
            AlphaIndex::Shannon => "shannon",
            AlphaIndex::Simpson => "simpson",
            AlphaIndex::InverseSimpson => "inverse_simpson",
            AlphaIndex::Chao1 => "chao1",
            AlphaIndex::Pielou => "pielou",
        }
    }

    /// Index value for one sample's counts.
    pub fn compute(&self, counts: &[u64]) -> f64 {
        match self {
            AlphaIndex::Observed => observed(counts),
            AlphaIndex::Shannon => shannon(counts),
            AlphaIndex::Simpson => simpson(counts),
            AlphaIndex::InverseSimpson => inverse_simpson(counts),
            AlphaIndex::Chao1 => chao1(counts),
            AlphaIndex::Pielou => pielou(counts),
        }
    }
}

impl fmt::Display for AlphaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlphaIndex {
    type Err = RarefyError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "observed" | "observed_features" | "richness" => Ok(AlphaIndex::Observed),
            "shannon" => Ok(AlphaIndex::Shannon),
            "simpson" | "gini_simpson" => Ok(AlphaIndex::Simpson),
            "inverse_simpson" | "invsimpson" => Ok(AlphaIndex::InverseSimpson),
            "chao1" => Ok(AlphaIndex::Chao1),
            "pielou" | "evenness" => Ok(AlphaIndex::Pielou),
            _ => Err(RarefyError::UnknownAnalysis(s.to_string())),
        }
    }
}

fn proportions(counts: &[u64]) -> impl Iterator<Item = f64> + '_ {
    let total: u64 = counts.iter().sum();
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(move |&c| c as f64 / total as f64)
}

pub fn observed(counts: &[u64]) -> f64 {
    counts.iter().filter(|&&c| c > 0).count() as f64
}

pub fn shannon(counts: &[u64]) -> f64 {
    -proportions(counts).map(|p| p * p.ln()).sum::<f64>()
}

pub fn simpson(counts: &[u64]) -> f64 {
    if counts.iter().all(|&c| c == 0) {
        return 0.0;
    }
    1.0 - proportions(counts).map(|p| p * p).sum::<f64>()
}

pub fn inverse_simpson(counts: &[u64]) -> f64 {
    let d: f64 = proportions(counts).map(|p| p * p).sum();
    if d > 0.0 {
        1.0 / d
    } else {
        0.0
    }
}

/// Bias-corrected Chao1: S + F1(F1 - 1) / (2(F2 + 1)).
pub fn chao1(counts: &[u64]) -> f64 {
    let f1 = counts.iter().filter(|&&c| c == 1).count() as f64;
    let f2 = counts.iter().filter(|&&c| c == 2).count() as f64;
    observed(counts) + f1 * (f1 - 1.0) / (2.0 * (f2 + 1.0))
}

/// Pielou's evenness; zero when fewer than two features are present.
pub fn pielou(counts: &[u64]) -> f64 {
    let s = observed(counts);
    if s < 2.0 {
        0.0
    } else {
        shannon(counts) / s.ln()
    }
}

/// One index value per sample, in sample order.
pub fn alpha_diversity(counts: &CountMatrix, index: AlphaIndex) -> Vec<(String, f64)> {
    let columns = counts.columns_dense();
    let values: Vec<f64> = columns.par_iter().map(|c| index.compute(c)).collect();
    counts.sample_ids().iter().cloned().zip(values).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shannon_uniform() {
        assert_relative_eq!(shannon(&[25, 25, 25, 25]), 4f64.ln(), epsilon = 1e-12);
        assert_eq!(shannon(&[100, 0, 0]), 0.0);
    }

    #[test]
    fn test_simpson_family() {
        assert_relative_eq!(simpson(&[25, 25, 25, 25]), 0.75, epsilon = 1e-12);
        assert_relative_eq!(inverse_simpson(&[25, 25, 25, 25]), 4.0, epsilon = 1e-12);
        assert_eq!(simpson(&[0, 0]), 0.0);
        assert_eq!(inverse_simpson(&[0, 0]), 0.0);
    }

    #[test]
    fn test_chao1() {
        // S = 4, F1 = 2, F2 = 1 → 4 + 2 / 4
        assert_relative_eq!(chao1(&[1, 1, 2, 10, 0]), 4.5, epsilon = 1e-12);
        assert_eq!(chao1(&[10, 20, 30]), 3.0);
    }

    #[test]
    fn test_pielou() {
        assert_relative_eq!(pielou(&[5, 5, 5]), 1.0, epsilon = 1e-12);
        assert_eq!(pielou(&[5, 0]), 0.0);
    }

    #[test]
    fn test_parse_index() {
        assert_eq!("Shannon".parse::<AlphaIndex>().unwrap(), AlphaIndex::Shannon);
        assert_eq!("inverse-simpson".parse::<AlphaIndex>().unwrap(), AlphaIndex::InverseSimpson);
        assert_eq!("observed_features".parse::<AlphaIndex>().unwrap(), AlphaIndex::Observed);
        assert!(matches!(
            "faith_pd".parse::<AlphaIndex>(),
            Err(RarefyError::UnknownAnalysis(_))
        ));
    }

    #[test]
    fn test_alpha_diversity_per_sample() {
        let counts = CountMatrix::from_columns(
            &[vec![10, 0, 0], vec![5, 5, 5]],
            vec!["a".into(), "b".into(), "c".into()],
            vec!["S1".into(), "S2".into()],
        )
        .unwrap();
        let values = alpha_diversity(&counts, AlphaIndex::Observed);
        assert_eq!(values, vec![("S1".to_string(), 1.0), ("S2".to_string(), 3.0)]);
    }
}
