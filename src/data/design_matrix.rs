//! Model matrix construction from metadata and a formula.

use crate::data::{Formula, Metadata, Term, Variable, VariableType};
use crate::error::{RarefyError, Result};
use nalgebra::DMatrix;

/// Dummy-coded model matrix (samples × coefficients).
///
/// Categorical variables use treatment contrasts with the alphabetically
/// first level as reference; numeric variables enter as a single column.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: DMatrix<f64>,
    coefficient_names: Vec<String>,
    sample_ids: Vec<String>,
}

type Columns = Vec<(String, Vec<f64>)>;

impl DesignMatrix {
    /// Build the model matrix. Every formula variable must exist in the
    /// metadata and be non-missing for every sample.
    pub fn from_formula(metadata: &Metadata, formula: &Formula) -> Result<Self> {
        for var in formula.variables() {
            if !metadata.has_column(var) {
                return Err(RarefyError::MissingColumn(var.to_string()));
            }
        }

        let n = metadata.n_samples();
        let mut columns: Columns = Vec::new();
        if formula.intercept {
            columns.push(("(Intercept)".to_string(), vec![1.0; n]));
        }

        for term in &formula.terms {
            match term {
                Term::Main(var) => {
                    // Without an intercept the first factor keeps all its levels.
                    let full_rank = !formula.intercept
                        && !columns.iter().any(|(name, _)| name != "(Intercept)");
                    columns.extend(variable_columns(metadata, var, full_rank)?);
                }
                Term::Interaction(a, b) => {
                    let left = variable_columns(metadata, a, false)?;
                    let right = variable_columns(metadata, b, false)?;
                    for (na, ca) in &left {
                        for (nb, cb) in &right {
                            let col = ca.iter().zip(cb).map(|(x, y)| x * y).collect();
                            columns.push((format!("{}:{}", na, nb), col));
                        }
                    }
                }
            }
        }

        let mut matrix = DMatrix::zeros(n, columns.len());
        for (j, (_, col)) in columns.iter().enumerate() {
            for (i, &v) in col.iter().enumerate() {
                matrix[(i, j)] = v;
            }
        }

        Ok(Self {
            matrix,
            coefficient_names: columns.into_iter().map(|(name, _)| name).collect(),
            sample_ids: metadata.sample_ids().to_vec(),
        })
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_coefficients(&self) -> usize {
        self.matrix.ncols()
    }

    /// Numerical rank of the matrix (SVD, relative tolerance 1e-9).
    pub fn rank(&self) -> usize {
        if self.matrix.ncols() == 0 {
            return 0;
        }
        let svd = self.matrix.clone().svd(false, false);
        let max_sv = svd.singular_values.max();
        svd.singular_values
            .iter()
            .filter(|&&s| s > max_sv * 1e-9)
            .count()
    }
}

fn variable_columns(metadata: &Metadata, var: &str, full_rank: bool) -> Result<Columns> {
    let values = metadata.column(var)?;
    if let Some(pos) = values.iter().position(|v| v.is_missing()) {
        return Err(RarefyError::InvalidParameter(format!(
            "Variable '{}' is missing for sample '{}'",
            var,
            metadata.sample_ids()[pos]
        )));
    }

    match metadata.column_type(var) {
        Some(VariableType::Continuous) | Some(VariableType::Ordinal) => {
            let col = values.iter().filter_map(|v| v.as_continuous()).collect();
            Ok(vec![(var.to_string(), col)])
        }
        Some(VariableType::Categorical) | None => {
            let levels = metadata.levels(var)?;
            let skip = if full_rank { 0 } else { 1 };
            Ok(levels
                .iter()
                .skip(skip)
                .map(|level| {
                    let col = values
                        .iter()
                        .map(|v| match v {
                            Variable::Categorical(s) if s == level => 1.0,
                            _ => 0.0,
                        })
                        .collect();
                    (format!("{}{}", var, level), col)
                })
                .collect())
        }
    }
}
