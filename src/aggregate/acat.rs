//! Aggregated Cauchy association test (ACAT) for combining p-values.
//!
//! Each p-value maps to a standard Cauchy quantile `tan((0.5 - p)π)`. The
//! quantiles are summed, or averaged, and the Cauchy survival function of
//! the result gives the combined p-value.

use crate::error::{RarefyError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// How the weighted Cauchy quantiles are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcatStatistic {
    /// `Σ w_i t_i`. Many small p-values reinforce each other.
    #[default]
    Sum,
    /// `Σ w_i t_i / Σ w_i`, standard Cauchy under the null for any
    /// dependence; equal inputs `p0` combine to `p0`.
    Mean,
}

impl fmt::Display for AcatStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcatStatistic::Sum => write!(f, "sum"),
            AcatStatistic::Mean => write!(f, "mean"),
        }
    }
}

impl FromStr for AcatStatistic {
    type Err = RarefyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(AcatStatistic::Sum),
            "mean" => Ok(AcatStatistic::Mean),
            other => Err(RarefyError::InvalidParameter(format!(
                "Unknown ACAT statistic '{}' (expected sum or mean)",
                other
            ))),
        }
    }
}

/// Inputs and output are kept inside `[EPSILON, 1 - EPSILON]`.
pub const EPSILON: f64 = f64::EPSILON;

/// Below this, `tan((0.5 - p)π)` is replaced by `1 / (pπ)`.
const SMALL_P: f64 = 1e-15;

fn check_p_values(p_values: &[f64]) -> Result<()> {
    if p_values.is_empty() {
        return Err(RarefyError::EmptyReplicates);
    }
    for (replicate, &value) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&value) {
            return Err(RarefyError::InvalidPValue { replicate, value });
        }
    }
    Ok(())
}

fn check_weights(weights: &[f64], n: usize) -> Result<()> {
    if weights.len() != n {
        return Err(RarefyError::InvalidParameter(format!(
            "ACAT got {} weights for {} p-values",
            weights.len(),
            n
        )));
    }
    if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
        return Err(RarefyError::InvalidParameter(format!(
            "ACAT weights must be positive and finite, got {}",
            w
        )));
    }
    Ok(())
}

fn cauchy_quantile(p: f64) -> f64 {
    if p < SMALL_P {
        1.0 / (p * PI)
    } else {
        ((0.5 - p) * PI).tan()
    }
}

/// P(C > t) for standard Cauchy C; `atan(1/t)/π` keeps precision in the tail.
fn cauchy_survival(t: f64) -> f64 {
    if t > 1.0 {
        (1.0 / t).atan() / PI
    } else {
        0.5 - t.atan() / PI
    }
}

/// Combine p-values with ACAT; equal weights when `weights` is `None`.
///
/// Fails with `EmptyReplicates` on empty input and `InvalidPValue` (naming
/// the position) for NaN or out-of-range values. Exact 0 and 1 are clamped.
pub fn acat(
    p_values: &[f64],
    weights: Option<&[f64]>,
    statistic: AcatStatistic,
) -> Result<f64> {
    check_p_values(p_values)?;
    if let Some(w) = weights {
        check_weights(w, p_values.len())?;
    }

    let weight = |i: usize| weights.map_or(1.0, |w| w[i]);
    let sum: f64 = p_values
        .iter()
        .enumerate()
        .map(|(i, &p)| weight(i) * cauchy_quantile(p.clamp(EPSILON, 1.0 - EPSILON)))
        .sum();
    let t = match statistic {
        AcatStatistic::Sum => sum,
        AcatStatistic::Mean => sum / (0..p_values.len()).map(weight).sum::<f64>(),
    };

    Ok(cauchy_survival(t).clamp(EPSILON, 1.0 - EPSILON))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use AcatStatistic::{Mean, Sum};

    #[test]
    fn test_equal_inputs_return_same_value_under_mean() {
        for p0 in [0.001, 0.03, 0.2, 0.5, 0.77, 0.95] {
            assert_relative_eq!(acat(&[p0; 7], None, Mean).unwrap(), p0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_small_p_values_dominate_under_sum() {
        let p = [0.01, 0.02, 0.5, 0.8, 0.99];
        let combined = acat(&p, None, Sum).unwrap();
        // Cauchy sum 14.52
        assert!(combined < 0.05);
        assert_relative_eq!(combined, 0.0219, epsilon = 1e-3);
        assert!((combined - 0.5).abs() > 0.1);

        let averaged = acat(&p, None, Mean).unwrap();
        assert_relative_eq!(averaged, 0.1056, epsilon = 1e-3);
    }

    #[test]
    fn test_sum_and_mean_agree_for_one_value() {
        for p in [1e-8, 0.02, 0.6] {
            assert_relative_eq!(
                acat(&[p], None, Sum).unwrap(),
                acat(&[p], None, Mean).unwrap(),
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn test_statistic_parse() {
        assert_eq!("sum".parse::<AcatStatistic>().unwrap(), Sum);
        assert_eq!("Mean".parse::<AcatStatistic>().unwrap(), Mean);
        assert!("median".parse::<AcatStatistic>().is_err());
        assert_eq!(AcatStatistic::default(), Sum);
    }

    #[test]
    fn test_order_independent() {
        for statistic in [Sum, Mean] {
            let a = acat(&[0.01, 0.02, 0.5, 0.8, 0.99], None, statistic).unwrap();
            let b = acat(&[0.99, 0.5, 0.01, 0.8, 0.02], None, statistic).unwrap();
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_result_strictly_inside_unit_interval() {
        for p in [
            vec![1e-300, 1e-200],
            vec![1.0 - 1e-16, 0.999_999_999],
            vec![0.0, 0.4],
            vec![1.0, 1.0],
            vec![0.3],
        ] {
            for statistic in [Sum, Mean] {
                let combined = acat(&p, None, statistic).unwrap();
                assert!(combined > 0.0 && combined < 1.0, "{:?} -> {}", p, combined);
            }
        }
    }

    #[test]
    fn test_tiny_p_uses_stable_approximation() {
        let combined = acat(&[5e-16; 3], None, Mean).unwrap();
        assert_relative_eq!(combined, 5e-16, max_relative = 1e-6);

        // Exact zeros and underflowing inputs clamp to machine epsilon.
        let combined = acat(&[1e-20, 0.0], None, Sum).unwrap();
        assert_relative_eq!(combined, EPSILON, max_relative = 1e-6);
    }

    #[test]
    fn test_weights() {
        // All weight on the first p-value.
        let combined = acat(&[0.04, 0.9], Some(&[1.0, 1e-12]), Mean).unwrap();
        assert_relative_eq!(combined, 0.04, epsilon = 1e-6);

        assert!(matches!(
            acat(&[0.1, 0.2], Some(&[1.0]), Mean),
            Err(RarefyError::InvalidParameter(_))
        ));
        assert!(matches!(
            acat(&[0.1, 0.2], Some(&[1.0, 0.0]), Sum),
            Err(RarefyError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(acat(&[], None, Sum), Err(RarefyError::EmptyReplicates)));
        assert!(matches!(
            acat(&[0.2, f64::NAN], None, Sum),
            Err(RarefyError::InvalidPValue { replicate: 1, .. })
        ));
        assert!(matches!(
            acat(&[1.5], None, Mean),
            Err(RarefyError::InvalidPValue { replicate: 0, .. })
        ));
    }
}
