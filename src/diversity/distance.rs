//! Between-sample distances.

use crate::data::CountMatrix;
use crate::error::{RarefyError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pseudocount added before the CLR step of the Aitchison distance.
pub const DEFAULT_AITCHISON_PSEUDOCOUNT: f64 = 1.0;

/// Distance metric between two samples' count vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    BrayCurtis,
    /// Binary Jaccard on presence/absence.
    Jaccard,
    Manhattan,
    /// Euclidean distance between CLR-transformed samples after adding
    /// `pseudocount` to every count.
    Aitchison { pseudocount: f64 },
}

impl DistanceMetric {
    pub fn aitchison() -> Self {
        DistanceMetric::Aitchison {
            pseudocount: DEFAULT_AITCHISON_PSEUDOCOUNT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::BrayCurtis => "bray",
            DistanceMetric::Jaccard => "jaccard",
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Aitchison { .. } => "aitchison",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            DistanceMetric::Aitchison { pseudocount } if !(*pseudocount > 0.0) => {
                Err(RarefyError::InvalidParameter(format!(
                    "Aitchison pseudocount must be positive, got {}",
                    pseudocount
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = RarefyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "bray" | "bray_curtis" | "bray-curtis" | "braycurtis" => Ok(DistanceMetric::BrayCurtis),
            "jaccard" => Ok(DistanceMetric::Jaccard),
            "manhattan" | "cityblock" => Ok(DistanceMetric::Manhattan),
            "aitchison" | "robust.aitchison" => Ok(DistanceMetric::aitchison()),
            _ => Err(RarefyError::InvalidMetric(s.to_string())),
        }
    }
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

pub fn manhattan(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Σ|a - b| / Σ(a + b); zero for two empty samples.
pub fn bray_curtis(a: &[f64], b: &[f64]) -> f64 {
    let (num, den) = a
        .iter()
        .zip(b)
        .fold((0.0, 0.0), |(n, d), (x, y)| (n + (x - y).abs(), d + x + y));
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// 1 - |A ∩ B| / |A ∪ B| over present features.
pub fn jaccard(a: &[f64], b: &[f64]) -> f64 {
    let (both, either) = a.iter().zip(b).fold((0usize, 0usize), |(i, u), (x, y)| {
        let (px, py) = (*x > 0.0, *y > 0.0);
        (i + (px && py) as usize, u + (px || py) as usize)
    });
    if either == 0 {
        0.0
    } else {
        1.0 - both as f64 / either as f64
    }
}

/// Centered log-ratio of one sample after adding a pseudocount.
pub fn clr(counts: &[f64], pseudocount: f64) -> Vec<f64> {
    let logs: Vec<f64> = counts.iter().map(|c| (c + pseudocount).ln()).collect();
    let mean = logs.iter().sum::<f64>() / logs.len().max(1) as f64;
    logs.into_iter().map(|l| l - mean).collect()
}

/// Symmetric sample-by-sample distance matrix.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    data: DMatrix<f64>,
    sample_ids: Vec<String>,
    metric: DistanceMetric,
}

impl DistanceMatrix {
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[(i, j)]
    }
}

/// Compute pairwise distances between all samples.
pub fn distance_matrix(counts: &CountMatrix, metric: DistanceMetric) -> Result<DistanceMatrix> {
    metric.validate()?;
    let n = counts.n_samples();
    if n < 2 {
        return Err(RarefyError::EmptyData(
            "Distances need at least two samples".to_string(),
        ));
    }

    let profiles: Vec<Vec<f64>> = counts
        .columns_dense()
        .into_iter()
        .map(|col| {
            let col: Vec<f64> = col.into_iter().map(|c| c as f64).collect();
            match metric {
                DistanceMetric::Aitchison { pseudocount } => clr(&col, pseudocount),
                _ => col,
            }
        })
        .collect();

    let dist = |a: &[f64], b: &[f64]| match metric {
        DistanceMetric::Euclidean | DistanceMetric::Aitchison { .. } => euclidean(a, b),
        DistanceMetric::BrayCurtis => bray_curtis(a, b),
        DistanceMetric::Jaccard => jaccard(a, b),
        DistanceMetric::Manhattan => manhattan(a, b),
    };

    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| (0..i).map(|j| dist(&profiles[i], &profiles[j])).collect())
        .collect();

    let mut data = DMatrix::zeros(n, n);
    for (i, row) in rows.iter().enumerate() {
        for (j, &d) in row.iter().enumerate() {
            data[(i, j)] = d;
            data[(j, i)] = d;
        }
    }

    Ok(DistanceMatrix {
        data,
        sample_ids: counts.sample_ids().to_vec(),
        metric,
    })
}
