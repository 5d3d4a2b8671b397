//! Per-sample metadata table.

use crate::error::{RarefyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A metadata cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    Categorical(String),
    Continuous(f64),
    Ordinal(i64),
    Missing,
}

impl Variable {
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            Variable::Ordinal(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_ordinal(&self) -> Option<i64> {
        match self {
            Variable::Ordinal(v) => Some(*v),
            _ => None,
        }
    }

    /// Level label used when the value acts as a grouping factor.
    pub fn label(&self) -> Option<String> {
        match self {
            Variable::Categorical(s) => Some(s.clone()),
            Variable::Continuous(v) => Some(v.to_string()),
            Variable::Ordinal(v) => Some(v.to_string()),
            Variable::Missing => None,
        }
    }

    fn parse(raw: &str, ty: VariableType) -> Self {
        let raw = raw.trim();
        if is_missing_token(raw) {
            return Variable::Missing;
        }
        match ty {
            VariableType::Continuous => raw.parse().map(Variable::Continuous).unwrap_or(Variable::Missing),
            VariableType::Ordinal => raw.parse().map(Variable::Ordinal).unwrap_or(Variable::Missing),
            VariableType::Categorical => Variable::Categorical(raw.to_string()),
        }
    }
}

/// Declared or inferred column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
    Ordinal,
}

fn is_missing_token(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan")
}

/// Sample metadata keyed by sample identifier.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    sample_ids: Vec<String>,
    column_names: Vec<String>,
    data: HashMap<String, HashMap<String, Variable>>,
    column_types: HashMap<String, VariableType>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metadata from in-memory rows of raw strings.
    ///
    /// Column types are inferred exactly as in [`Metadata::from_tsv`].
    pub fn from_rows(column_names: Vec<String>, rows: Vec<(String, Vec<String>)>) -> Result<Self> {
        if rows.is_empty() {
            return Err(RarefyError::EmptyData("No samples in metadata".to_string()));
        }

        let mut column_types = HashMap::new();
        for (idx, name) in column_names.iter().enumerate() {
            let numeric = rows.iter().all(|(_, values)| {
                values
                    .get(idx)
                    .map(|v| is_missing_token(v.trim()) || v.trim().parse::<f64>().is_ok())
                    .unwrap_or(true)
            });
            let ty = if numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(name.clone(), ty);
        }

        let mut sample_ids = Vec::with_capacity(rows.len());
        let mut data = HashMap::with_capacity(rows.len());
        for (sample_id, values) in rows {
            if data.contains_key(&sample_id) {
                return Err(RarefyError::DuplicateSample(sample_id));
            }
            let record: HashMap<String, Variable> = column_names
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let var = values
                        .get(idx)
                        .map(|raw| Variable::parse(raw, column_types[name]))
                        .unwrap_or(Variable::Missing);
                    (name.clone(), var)
                })
                .collect();
            sample_ids.push(sample_id.clone());
            data.insert(sample_id, record);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Load metadata from TSV: first column is the sample ID, the rest are
    /// variables. Numeric-only columns become continuous, all others
    /// categorical; `NA`/empty cells are missing. Duplicate sample IDs are
    /// rejected.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| RarefyError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(RarefyError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let column_names = header[1..].iter().map(|s| s.trim().to_string()).collect();

        let mut rows = Vec::new();
        for line in lines {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let sample_id = fields.next().unwrap_or_default().trim().to_string();
            rows.push((sample_id, fields.map(String::from).collect()));
        }

        Self::from_rows(column_names, rows)
    }

    /// Write as TSV with a `sample_id` first column; missing cells as `NA`.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "sample_id\t{}", self.column_names.join("\t"))?;
        for sid in &self.sample_ids {
            let cells: Vec<String> = self
                .column_names
                .iter()
                .map(|c| {
                    self.get(sid, c)
                        .and_then(Variable::label)
                        .unwrap_or_else(|| "NA".to_string())
                })
                .collect();
            writeln!(writer, "{}\t{}", sid, cells.join("\t"))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Override column types, re-interpreting existing values.
    pub fn with_column_types(mut self, types: HashMap<String, VariableType>) -> Self {
        for (column, ty) in types {
            for record in self.data.values_mut() {
                if let Some(var) = record.get_mut(&column) {
                    let raw = match var {
                        Variable::Categorical(s) => s.clone(),
                        Variable::Continuous(v) => v.to_string(),
                        Variable::Ordinal(v) => v.to_string(),
                        Variable::Missing => continue,
                    };
                    *var = Variable::parse(&raw, ty);
                }
            }
            self.column_types.insert(column, ty);
        }
        self
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// All values of a column in sample order.
    pub fn column(&self, column: &str) -> Result<Vec<&Variable>> {
        if !self.has_column(column) {
            return Err(RarefyError::MissingColumn(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| self.get(sid, column).unwrap_or(&Variable::Missing))
            .collect())
    }

    /// Column values as grouping labels (`None` where missing).
    pub fn labels(&self, column: &str) -> Result<Vec<Option<String>>> {
        Ok(self.column(column)?.into_iter().map(Variable::label).collect())
    }

    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Sorted distinct categorical levels of a column.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let levels: BTreeSet<String> = self
            .column(column)?
            .into_iter()
            .filter_map(|v| v.as_categorical().map(String::from))
            .collect();
        Ok(levels.into_iter().collect())
    }

    /// Restrict to the given samples, in the given order.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut data = HashMap::with_capacity(sample_ids.len());
        for sid in sample_ids {
            let record = self.data.get(sid).ok_or_else(|| {
                RarefyError::SampleMismatch(format!("Sample '{}' not found in metadata", sid))
            })?;
            data.insert(sid.clone(), record.clone());
        }
        Ok(Self {
            sample_ids: sample_ids.to_vec(),
            column_names: self.column_names.clone(),
            data,
            column_types: self.column_types.clone(),
        })
    }

    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_tsv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\ttreatment\tsubject\tweek").unwrap();
        writeln!(file, "S1\tcontrol\tm1\t0").unwrap();
        writeln!(file, "S2\tabx\tm1\t4").unwrap();
        writeln!(file, "S3\tcontrol\tm2\t0").unwrap();
        writeln!(file, "S4\tabx\tm2\tNA").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_tsv_write_then_read() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();
        let out = NamedTempFile::new().unwrap();
        meta.to_tsv(out.path()).unwrap();

        let again = Metadata::from_tsv(out.path()).unwrap();
        assert_eq!(again.sample_ids(), meta.sample_ids());
        assert_eq!(again.get("S2", "treatment"), meta.get("S2", "treatment"));
        assert!(again.get("S4", "week").unwrap().is_missing());
    }

    #[test]
    fn test_load_and_infer() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.n_samples(), 4);
        assert_eq!(meta.column_names(), &["treatment", "subject", "week"]);
        assert_eq!(meta.column_type("treatment"), Some(VariableType::Categorical));
        assert_eq!(meta.column_type("week"), Some(VariableType::Continuous));
        assert_eq!(meta.get("S2", "week").unwrap().as_continuous(), Some(4.0));
        assert!(meta.get("S4", "week").unwrap().is_missing());
    }

    #[test]
    fn test_levels_and_labels() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.levels("treatment").unwrap(), vec!["abx", "control"]);
        let labels = meta.labels("week").unwrap();
        assert_eq!(labels[0].as_deref(), Some("0"));
        assert_eq!(labels[3], None);
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tgroup").unwrap();
        writeln!(file, "S1\ta").unwrap();
        writeln!(file, "S1\tb").unwrap();
        file.flush().unwrap();

        let err = Metadata::from_tsv(file.path()).unwrap_err();
        assert!(matches!(err, RarefyError::DuplicateSample(ref s) if s == "S1"));
    }

    #[test]
    fn test_missing_column() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();
        assert!(matches!(meta.column("age"), Err(RarefyError::MissingColumn(_))));
    }

    #[test]
    fn test_with_column_types() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();
        let mut types = HashMap::new();
        types.insert("week".to_string(), VariableType::Categorical);
        let meta = meta.with_column_types(types);

        assert_eq!(meta.get("S2", "week").unwrap().as_categorical(), Some("4"));
        assert_eq!(meta.levels("week").unwrap(), vec!["0", "4"]);
    }

    #[test]
    fn test_subset_samples() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();
        let subset = meta.subset_samples(&["S3".to_string(), "S1".to_string()]).unwrap();
        assert_eq!(subset.sample_ids(), &["S3", "S1"]);
        assert!(meta.subset_samples(&["S9".to_string()]).is_err());
    }
}
