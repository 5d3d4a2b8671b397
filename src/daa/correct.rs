//! Multiple-testing correction requested from a DA engine and applied to
//! its returned tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RarefyError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correction {
    /// Benjamini-Hochberg false discovery rate.
    #[default]
    BenjaminiHochberg,
    Bonferroni,
    /// Holm step-down family-wise error rate.
    Holm,
    None,
}

impl Correction {
    /// Name used by the R engines (`p.adjust` method).
    pub fn name(&self) -> &'static str {
        match self {
            Correction::BenjaminiHochberg => "BH",
            Correction::Bonferroni => "bonferroni",
            Correction::Holm => "holm",
            Correction::None => "none",
        }
    }

    /// Adjusted p-values in input order. NaN inputs stay NaN and do not
    /// count towards the number of tests.
    pub fn adjust(&self, p_values: &[f64]) -> Vec<f64> {
        let mut order: Vec<usize> = (0..p_values.len())
            .filter(|&i| !p_values[i].is_nan())
            .collect();
        order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));
        let m = order.len() as f64;

        let mut adjusted = p_values.to_vec();
        match self {
            Correction::None => {}
            Correction::Bonferroni => {
                for &i in &order {
                    adjusted[i] = (p_values[i] * m).min(1.0);
                }
            }
            Correction::Holm => {
                let mut running: f64 = 0.0;
                for (rank, &i) in order.iter().enumerate() {
                    let q = (p_values[i] * (m - rank as f64)).min(1.0);
                    running = running.max(q);
                    adjusted[i] = running;
                }
            }
            Correction::BenjaminiHochberg => {
                // Step up from the largest p-value.
                let mut running: f64 = 1.0;
                for (rank, &i) in order.iter().enumerate().rev() {
                    let q = p_values[i] * m / (rank + 1) as f64;
                    running = running.min(q);
                    adjusted[i] = running.min(1.0);
                }
            }
        }
        adjusted
    }
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Correction {
    type Err = RarefyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bh" | "fdr" | "benjamini_hochberg" => Ok(Correction::BenjaminiHochberg),
            "bonferroni" => Ok(Correction::Bonferroni),
            "holm" => Ok(Correction::Holm),
            "none" => Ok(Correction::None),
            _ => Err(RarefyError::InvalidParameter(format!(
                "Unknown p-value correction '{}'",
                s
            ))),
        }
    }
}
