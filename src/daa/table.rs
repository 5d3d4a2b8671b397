//! Uniform per-feature result table returned by every DA engine.

use super::correct::Correction;
use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Round to `digits` significant digits (at least one). Zero and
/// non-finite values are returned unchanged.
pub fn round_signif(x: f64, digits: usize) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    let formatted = format!("{:.*e}", digits.max(1) - 1, x);
    formatted.parse().unwrap_or(x)
}

/// R writes missing numbers as `NA`; accept that and empty cells.
fn optional_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("NA") | Some("NaN") | Some("nan") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("NA") => Ok(false),
        Some("true") | Some("TRUE") | Some("True") | Some("1") => Ok(true),
        Some("false") | Some("FALSE") | Some("False") | Some("0") => Ok(false),
        Some(other) => Err(serde::de::Error::custom(format!("invalid boolean '{}'", other))),
    }
}

/// One feature × contrast row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaRow {
    pub feature_id: String,
    /// Coefficient or comparison, e.g. `grouptreated`.
    #[serde(default)]
    pub contrast: String,
    #[serde(deserialize_with = "optional_f64", default)]
    pub estimate: Option<f64>,
    #[serde(deserialize_with = "optional_f64", default)]
    pub std_error: Option<f64>,
    /// Lower confidence bound.
    #[serde(deserialize_with = "optional_f64", default)]
    pub lower: Option<f64>,
    #[serde(deserialize_with = "optional_f64", default)]
    pub upper: Option<f64>,
    #[serde(deserialize_with = "optional_f64", default)]
    pub p_value: Option<f64>,
    #[serde(deserialize_with = "optional_f64", default)]
    pub q_value: Option<f64>,
    #[serde(deserialize_with = "flexible_bool", default)]
    pub structural_zero: bool,
}

impl DaRow {
    pub fn new(feature_id: &str, contrast: &str) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            contrast: contrast.to_string(),
            estimate: None,
            std_error: None,
            lower: None,
            upper: None,
            p_value: None,
            q_value: None,
            structural_zero: false,
        }
    }

    fn numbers_mut(&mut self) -> [&mut Option<f64>; 6] {
        [
            &mut self.estimate,
            &mut self.std_error,
            &mut self.lower,
            &mut self.upper,
            &mut self.p_value,
            &mut self.q_value,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaTable {
    pub rows: Vec<DaRow>,
}

impl DaTable {
    pub fn new(rows: Vec<DaRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DaRow> {
        self.rows.iter()
    }

    /// Read a tab-separated table with a header naming [`DaRow`] fields.
    pub fn read_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .trim(csv::Trim::All)
            .from_path(path)?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<DaRow>, csv::Error>>()?;
        Ok(Self { rows })
    }

    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Copy with every numeric column rounded to `digits` significant digits.
    pub fn round_signif(&self, digits: usize) -> Self {
        let mut rounded = self.clone();
        for row in &mut rounded.rows {
            for value in row.numbers_mut() {
                *value = value.map(|v| round_signif(v, digits));
            }
        }
        rounded
    }

    /// Rows with a q-value below `alpha`.
    pub fn significant(&self, alpha: f64) -> Vec<&DaRow> {
        self.rows
            .iter()
            .filter(|r| r.q_value.is_some_and(|q| q < alpha))
            .collect()
    }

    /// Recompute q-values from p-values, separately within each contrast.
    pub fn with_correction(&self, correction: Correction) -> Self {
        let mut by_contrast: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, row) in self.rows.iter().enumerate() {
            by_contrast.entry(row.contrast.as_str()).or_default().push(i);
        }

        let mut corrected = self.clone();
        for indices in by_contrast.values() {
            let p: Vec<f64> = indices
                .iter()
                .map(|&i| self.rows[i].p_value.unwrap_or(f64::NAN))
                .collect();
            for (&i, q) in indices.iter().zip(correction.adjust(&p)) {
                corrected.rows[i].q_value = (!q.is_nan()).then_some(q);
            }
        }
        corrected
    }

    /// Render as a Markdown table with numbers at `digits` significant digits.
    pub fn to_markdown(&self, digits: usize) -> String {
        let fmt_num = |v: Option<f64>| match v {
            Some(x) => format!("{}", round_signif(x, digits)),
            None => "NA".to_string(),
        };

        let mut out = String::new();
        out.push_str("| feature | contrast | estimate | std_error | lower | upper | p_value | q_value | structural_zero |\n");
        out.push_str("|---|---|---:|---:|---:|---:|---:|---:|:---:|\n");
        for r in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
                r.feature_id,
                r.contrast,
                fmt_num(r.estimate),
                fmt_num(r.std_error),
                fmt_num(r.lower),
                fmt_num(r.upper),
                fmt_num(r.p_value),
                fmt_num(r.q_value),
                if r.structural_zero { "yes" } else { "" }
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn row(feature: &str, contrast: &str, estimate: f64, p: f64) -> DaRow {
        DaRow {
            estimate: Some(estimate),
            p_value: Some(p),
            ..DaRow::new(feature, contrast)
        }
    }

    #[test]
    fn test_round_signif() {
        assert_eq!(round_signif(123.456, 3), 123.0);
        assert_eq!(round_signif(0.00123456, 2), 0.0012);
        assert_eq!(round_signif(-98765.0, 2), -99000.0);
        assert_eq!(round_signif(0.0, 3), 0.0);
        assert_eq!(round_signif(1.5, 0), 2.0);
        assert!(round_signif(f64::NAN, 3).is_nan());
    }

    #[test]
    fn test_read_r_style_table() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "feature_id\tcontrast\testimate\tstd_error\tlower\tupper\tp_value\tq_value\tstructural_zero").unwrap();
        writeln!(file, "Bacteroides\tgrouptrt\t1.25\t0.3\t0.66\t1.84\t0.0001\t0.002\tFALSE").unwrap();
        writeln!(file, "Prevotella\tgrouptrt\tNA\tNA\tNA\tNA\tNA\tNA\tTRUE").unwrap();

        let table = DaTable::read_tsv(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].estimate, Some(1.25));
        assert!(!table.rows[0].structural_zero);
        assert_eq!(table.rows[1].p_value, None);
        assert!(table.rows[1].structural_zero);
    }

    #[test]
    fn test_tsv_write_then_read() {
        let table = DaTable::new(vec![row("f1", "c", 0.5, 0.01), DaRow::new("f2", "c")]);
        let file = NamedTempFile::new().unwrap();
        table.to_tsv(file.path()).unwrap();
        assert_eq!(DaTable::read_tsv(file.path()).unwrap(), table);
    }

    #[test]
    fn test_round_table_and_significant() {
        let mut table = DaTable::new(vec![row("f1", "c", 1.23456, 0.001), row("f2", "c", -0.5, 0.2)]);
        table.rows[0].q_value = Some(0.004);
        table.rows[1].q_value = Some(0.3);

        let rounded = table.round_signif(2);
        assert_eq!(rounded.rows[0].estimate, Some(1.2));
        assert_eq!(table.rows[0].estimate, Some(1.23456));

        let sig = table.significant(0.05);
        assert_eq!(sig.len(), 1);
        assert_eq!(sig[0].feature_id, "f1");
    }

    #[test]
    fn test_correction_per_contrast() {
        let table = DaTable::new(vec![
            row("f1", "a", 1.0, 0.01),
            row("f2", "a", 1.0, 0.02),
            row("f1", "b", 1.0, 0.01),
            DaRow::new("f2", "b"),
        ]);
        let q = table.with_correction(Correction::Bonferroni);
        assert_relative_eq!(q.rows[0].q_value.unwrap(), 0.02);
        assert_relative_eq!(q.rows[1].q_value.unwrap(), 0.04);
        // Contrast "b" has one tested feature.
        assert_relative_eq!(q.rows[2].q_value.unwrap(), 0.01);
        assert_eq!(q.rows[3].q_value, None);
    }

    #[test]
    fn test_markdown() {
        let md = DaTable::new(vec![row("f1", "grouptrt", 1.23456, 0.000123)]).to_markdown(3);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("| feature |"));
        assert_eq!(lines[2], "| f1 | grouptrt | 1.23 | NA | NA | NA | 0.000123 | NA |  |");

        let zero = DaRow {
            structural_zero: true,
            ..row("f2", "grouptrt", -2.0, 0.5)
        };
        let md = DaTable::new(vec![row("f1", "grouptrt", 1.0, 0.01), zero]).to_markdown(2);
        assert!(md.ends_with("| yes |\n"));
        assert_eq!(md.lines().count(), 4);
    }
}
