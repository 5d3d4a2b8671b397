//! Joined count table and metadata.

use crate::data::{CountMatrix, Metadata};
use crate::error::{RarefyError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Why a sample was left out of the joined dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// Present in the count table, absent from metadata.
    NoMetadata,
    /// Present in metadata, absent from the count table.
    NoCounts,
    /// A required metadata column is missing for this sample.
    MissingValue(String),
}

/// A sample removed while building or filtering a [`Dataset`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedSample {
    pub sample_id: String,
    pub reason: DropReason,
}

/// Count table and metadata sharing one sample order.
#[derive(Debug, Clone)]
pub struct Dataset {
    counts: CountMatrix,
    metadata: Metadata,
    dropped: Vec<DroppedSample>,
}

impl Dataset {
    /// Join counts and metadata on sample ID.
    ///
    /// Samples found on only one side are dropped and reported; the join
    /// fails only when no sample is shared.
    pub fn new(counts: CountMatrix, metadata: Metadata) -> Result<Self> {
        let mut dropped = Vec::new();
        let mut keep = Vec::new();

        for (idx, sid) in counts.sample_ids().iter().enumerate() {
            if metadata.has_sample(sid) {
                keep.push(idx);
            } else {
                warn!("Sample '{}' has counts but no metadata; dropping it", sid);
                dropped.push(DroppedSample {
                    sample_id: sid.clone(),
                    reason: DropReason::NoMetadata,
                });
            }
        }
        for sid in metadata.sample_ids() {
            if counts.sample_index(sid).is_none() {
                warn!("Sample '{}' has metadata but no counts; dropping it", sid);
                dropped.push(DroppedSample {
                    sample_id: sid.clone(),
                    reason: DropReason::NoCounts,
                });
            }
        }

        if keep.is_empty() {
            return Err(RarefyError::SampleMismatch(
                "Count table and metadata share no sample identifiers".to_string(),
            ));
        }

        let counts = if keep.len() == counts.n_samples() {
            counts
        } else {
            counts.subset_samples(&keep)?
        };
        let metadata = metadata.subset_samples(counts.sample_ids())?;

        Ok(Self {
            counts,
            metadata,
            dropped,
        })
    }

    /// Load and join a count TSV and a metadata TSV.
    pub fn from_tsv<P: AsRef<Path>, Q: AsRef<Path>>(counts: P, metadata: Q) -> Result<Self> {
        Self::new(CountMatrix::from_tsv(counts)?, Metadata::from_tsv(metadata)?)
    }

    pub fn counts(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn sample_ids(&self) -> &[String] {
        self.counts.sample_ids()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    /// Samples removed so far, with reasons.
    pub fn dropped(&self) -> &[DroppedSample] {
        &self.dropped
    }

    /// Fail with [`RarefyError::MissingColumn`] unless every column exists.
    pub fn require_columns(&self, columns: &[&str]) -> Result<()> {
        for column in columns {
            if !self.metadata.has_column(column) {
                return Err(RarefyError::MissingColumn(column.to_string()));
            }
        }
        Ok(())
    }

    /// Drop samples with a missing value in any of `columns`.
    pub fn drop_missing(self, columns: &[&str]) -> Result<Self> {
        self.require_columns(columns)?;

        let mut dropped = self.dropped;
        let mut keep = Vec::with_capacity(self.counts.n_samples());
        for (idx, sid) in self.counts.sample_ids().iter().enumerate() {
            let missing = columns
                .iter()
                .find(|c| self.metadata.get(sid, c).map_or(true, |v| v.is_missing()));
            match missing {
                Some(column) => {
                    warn!("Sample '{}' has no value for '{}'; dropping it", sid, column);
                    dropped.push(DroppedSample {
                        sample_id: sid.clone(),
                        reason: DropReason::MissingValue(column.to_string()),
                    });
                }
                None => keep.push(idx),
            }
        }

        if keep.is_empty() {
            return Err(RarefyError::EmptyData(format!(
                "No samples have values for all of {:?}",
                columns
            )));
        }
        if keep.len() == self.counts.n_samples() {
            return Ok(Self {
                counts: self.counts,
                metadata: self.metadata,
                dropped,
            });
        }

        let counts = self.counts.subset_samples(&keep)?;
        let metadata = self.metadata.subset_samples(counts.sample_ids())?;
        Ok(Self {
            counts,
            metadata,
            dropped,
        })
    }

    /// Replace the count table, keeping metadata aligned to its samples.
    pub fn with_counts(&self, counts: CountMatrix) -> Result<Self> {
        let metadata = self.metadata.subset_samples(counts.sample_ids())?;
        Ok(Self {
            counts,
            metadata,
            dropped: self.dropped.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(samples: &[&str]) -> CountMatrix {
        let columns: Vec<Vec<u64>> = samples.iter().map(|_| vec![5, 10]).collect();
        CountMatrix::from_columns(
            &columns,
            vec!["f1".into(), "f2".into()],
            samples.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    fn metadata(rows: &[(&str, &str)]) -> Metadata {
        Metadata::from_rows(
            vec!["group".into()],
            rows.iter()
                .map(|(s, g)| (s.to_string(), vec![g.to_string()]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_join_reorders_metadata() {
        let ds = Dataset::new(
            counts(&["S1", "S2"]),
            metadata(&[("S2", "b"), ("S1", "a")]),
        )
        .unwrap();
        assert_eq!(ds.metadata().sample_ids(), &["S1", "S2"]);
        assert!(ds.dropped().is_empty());
    }

    #[test]
    fn test_mismatched_samples_reported() {
        let ds = Dataset::new(
            counts(&["S1", "S2", "S3"]),
            metadata(&[("S1", "a"), ("S2", "b"), ("S9", "c")]),
        )
        .unwrap();
        assert_eq!(ds.sample_ids(), &["S1", "S2"]);
        assert_eq!(ds.dropped().len(), 2);
        assert!(ds
            .dropped()
            .iter()
            .any(|d| d.sample_id == "S3" && d.reason == DropReason::NoMetadata));
        assert!(ds
            .dropped()
            .iter()
            .any(|d| d.sample_id == "S9" && d.reason == DropReason::NoCounts));
    }

    #[test]
    fn test_no_shared_samples_is_fatal() {
        let err = Dataset::new(counts(&["S1"]), metadata(&[("X1", "a")])).unwrap_err();
        assert!(matches!(err, RarefyError::SampleMismatch(_)));
    }

    #[test]
    fn test_drop_missing() {
        let ds = Dataset::new(
            counts(&["S1", "S2", "S3"]),
            metadata(&[("S1", "a"), ("S2", "NA"), ("S3", "b")]),
        )
        .unwrap()
        .drop_missing(&["group"])
        .unwrap();
        assert_eq!(ds.sample_ids(), &["S1", "S3"]);
        assert_eq!(
            ds.dropped()[0].reason,
            DropReason::MissingValue("group".into())
        );
    }

    #[test]
    fn test_require_columns() {
        let ds = Dataset::new(counts(&["S1"]), metadata(&[("S1", "a")])).unwrap();
        assert!(ds.require_columns(&["group"]).is_ok());
        assert!(matches!(
            ds.require_columns(&["subject"]),
            Err(RarefyError::MissingColumn(_))
        ));
    }
}
