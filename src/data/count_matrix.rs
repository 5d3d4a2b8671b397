//! Sparse feature-by-sample count table.

use crate::error::{RarefyError, Result};
use sprs::{CsMat, TriMat};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Abundance counts stored as a CSR matrix.
///
/// Rows are features (taxa / ASVs), columns are samples. Column sums are the
/// per-sample library sizes.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    data: CsMat<u64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Wrap a sparse matrix, checking identifier lengths and uniqueness.
    pub fn new(data: CsMat<u64>, feature_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(RarefyError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(RarefyError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        if let Some(dup) = first_duplicate(&sample_ids) {
            return Err(RarefyError::DuplicateSample(dup.to_string()));
        }
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Build from dense per-sample count vectors (one `Vec` per sample, each
    /// of length `feature_ids.len()`).
    pub fn from_columns(
        columns: &[Vec<u64>],
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        if columns.len() != sample_ids.len() {
            return Err(RarefyError::DimensionMismatch {
                expected: sample_ids.len(),
                actual: columns.len(),
            });
        }
        let n_features = feature_ids.len();
        let mut tri = TriMat::new((n_features, columns.len()));
        for (col, values) in columns.iter().enumerate() {
            if values.len() != n_features {
                return Err(RarefyError::DimensionMismatch {
                    expected: n_features,
                    actual: values.len(),
                });
            }
            for (row, &v) in values.iter().enumerate() {
                if v > 0 {
                    tri.add_triplet(row, col, v);
                }
            }
        }
        Self::new(tri.to_csr(), feature_ids, sample_ids)
    }

    /// Load a count table from TSV.
    ///
    /// The header holds sample IDs after a feature-ID column. Lines starting
    /// with `#` before the header are skipped (BIOM exports prepend one), but
    /// a `#OTU ID` style header is accepted.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header_line = loop {
            let line = lines
                .next()
                .ok_or_else(|| RarefyError::EmptyData("Empty count table".to_string()))??;
            if line.starts_with("# ") || line.trim().is_empty() {
                continue;
            }
            break line;
        };
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(RarefyError::EmptyData(
                "Count table must have at least one sample column".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, u64)> = Vec::new();
        let mut feature_ids = Vec::new();

        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row = feature_ids.len();
            let mut fields = line.split('\t');
            let feature = fields.next().unwrap_or_default().trim().to_string();
            let cells: Vec<&str> = fields.collect();
            if cells.len() != n_samples {
                return Err(RarefyError::RowLength {
                    feature,
                    row,
                    expected: n_samples,
                    actual: cells.len(),
                });
            }
            feature_ids.push(feature);
            for (col, raw) in cells.into_iter().enumerate() {
                let raw = raw.trim();
                // Integer-valued floats ("12.0") show up in exported tables.
                let value = raw
                    .parse::<u64>()
                    .ok()
                    .or_else(|| {
                        raw.parse::<f64>()
                            .ok()
                            .filter(|v| *v >= 0.0 && v.fract() == 0.0)
                            .map(|v| v as u64)
                    })
                    .ok_or_else(|| RarefyError::InvalidCount {
                        value: raw.to_string(),
                        row,
                        col,
                    })?;
                if value > 0 {
                    triplets.push((row, col, value));
                }
            }
        }

        if feature_ids.is_empty() {
            return Err(RarefyError::EmptyData("No features in count table".to_string()));
        }

        let mut tri = TriMat::with_capacity((feature_ids.len(), n_samples), triplets.len());
        for (r, c, v) in triplets {
            tri.add_triplet(r, c, v);
        }
        Self::new(tri.to_csr(), feature_ids, sample_ids)
    }

    /// Write as TSV with a `feature_id` header column.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        write!(writer, "feature_id")?;
        for id in &self.sample_ids {
            write!(writer, "\t{}", id)?;
        }
        writeln!(writer)?;
        for (row, id) in self.feature_ids.iter().enumerate() {
            write!(writer, "{}", id)?;
            for value in self.row_dense(row) {
                write!(writer, "\t{}", value)?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Value at (feature, sample); zero when not stored.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.data.get(row, col).copied().unwrap_or(0)
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Underlying sparse storage.
    #[inline]
    pub fn data(&self) -> &CsMat<u64> {
        &self.data
    }

    /// Index of a sample by identifier.
    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|s| s == sample_id)
    }

    /// Dense counts of one feature across samples.
    pub fn row_dense(&self, row: usize) -> Vec<u64> {
        let mut dense = vec![0u64; self.n_samples()];
        if let Some(view) = self.data.outer_view(row) {
            for (col, &val) in view.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Dense counts of one sample across features.
    pub fn col_dense(&self, col: usize) -> Vec<u64> {
        let mut dense = vec![0u64; self.n_features()];
        for (row, view) in self.data.outer_iterator().enumerate() {
            if let Some(&v) = view.get(col) {
                dense[row] = v;
            }
        }
        dense
    }

    /// All samples as dense column vectors, in sample order.
    pub fn columns_dense(&self) -> Vec<Vec<u64>> {
        let mut cols = vec![vec![0u64; self.n_features()]; self.n_samples()];
        for (row, view) in self.data.outer_iterator().enumerate() {
            for (col, &val) in view.iter() {
                cols[col][row] = val;
            }
        }
        cols
    }

    /// Total count per feature.
    pub fn row_sums(&self) -> Vec<u64> {
        self.data
            .outer_iterator()
            .map(|view| view.iter().map(|(_, &v)| v).sum())
            .collect()
    }

    /// Library size per sample.
    pub fn col_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.n_samples()];
        for view in self.data.outer_iterator() {
            for (col, &val) in view.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Keep the listed features, in the given order.
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        let mut tri = TriMat::new((indices.len(), self.n_samples()));
        let mut ids = Vec::with_capacity(indices.len());
        for (new_row, &old_row) in indices.iter().enumerate() {
            let view = self.data.outer_view(old_row).ok_or_else(|| {
                RarefyError::InvalidParameter(format!("Feature index {} out of bounds", old_row))
            })?;
            ids.push(self.feature_ids[old_row].clone());
            for (col, &val) in view.iter() {
                tri.add_triplet(new_row, col, val);
            }
        }
        Self::new(tri.to_csr(), ids, self.sample_ids.clone())
    }

    /// Keep the listed samples, in the given order.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let mut remap: HashMap<usize, usize> = HashMap::with_capacity(indices.len());
        let mut ids = Vec::with_capacity(indices.len());
        for (new_col, &old_col) in indices.iter().enumerate() {
            if old_col >= self.n_samples() {
                return Err(RarefyError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_col
                )));
            }
            remap.insert(old_col, new_col);
            ids.push(self.sample_ids[old_col].clone());
        }

        let mut tri = TriMat::new((self.n_features(), indices.len()));
        for (row, view) in self.data.outer_iterator().enumerate() {
            for (old_col, &val) in view.iter() {
                if let Some(&new_col) = remap.get(&old_col) {
                    tri.add_triplet(row, new_col, val);
                }
            }
        }
        Self::new(tri.to_csr(), self.feature_ids.clone(), ids)
    }

    /// Replace feature identifiers (e.g. after taxonomy cleaning).
    pub fn with_feature_ids(mut self, feature_ids: Vec<String>) -> Result<Self> {
        if feature_ids.len() != self.n_features() {
            return Err(RarefyError::DimensionMismatch {
                expected: self.n_features(),
                actual: feature_ids.len(),
            });
        }
        self.feature_ids = feature_ids;
        Ok(self)
    }

    /// Dense `f64` copy (features × samples).
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        let mut dense = nalgebra::DMatrix::zeros(self.n_features(), self.n_samples());
        for (row, view) in self.data.outer_iterator().enumerate() {
            for (col, &val) in view.iter() {
                dense[(row, col)] = val as f64;
            }
        }
        dense
    }
}

fn first_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().find(|id| !seen.insert(id.as_str())).map(|s| s.as_str())
}
