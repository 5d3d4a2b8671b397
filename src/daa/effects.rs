//! Fixed and random effect terms passed to DA engines.
//!
//! Random effects use lme4 notation:
//! - `(1 | subject)` random intercept per subject
//! - `(1 + time | subject)` random intercept and slope
//! - `(0 + time | subject)` random slope only

use crate::data::Metadata;
use crate::error::{RarefyError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn random_effect_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\(\s*([^|()]*?)\s*\|\s*([A-Za-z_.][A-Za-z0-9_.]*)\s*\)$")
            .expect("static regex")
    })
}

/// A random effect term such as `(1 | subject)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomEffect {
    /// Slope variables, without the intercept marker.
    pub slopes: Vec<String>,
    /// Grouping variable.
    pub grouping: String,
    pub intercept: bool,
}

impl RandomEffect {
    pub fn parse(term: &str) -> Result<Self> {
        let caps = random_effect_re().captures(term.trim()).ok_or_else(|| {
            RarefyError::FormulaParse(format!(
                "Random effect must look like '(1 | group)': {}",
                term
            ))
        })?;
        let (lhs, grouping) = (&caps[1], caps[2].to_string());

        let mut intercept = true;
        let mut slopes = Vec::new();
        for term in lhs.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            match term {
                "1" => intercept = true,
                "0" | "-1" => intercept = false,
                _ => slopes.push(term.to_string()),
            }
        }
        if !intercept && slopes.is_empty() {
            return Err(RarefyError::FormulaParse(format!(
                "Random effect has no terms: {}",
                term
            )));
        }

        Ok(Self {
            slopes,
            grouping,
            intercept,
        })
    }

    /// Grouping variable followed by slope variables.
    pub fn variables(&self) -> Vec<&str> {
        std::iter::once(self.grouping.as_str())
            .chain(self.slopes.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for RandomEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lhs: Vec<&str> = vec![if self.intercept { "1" } else { "0" }];
        lhs.extend(self.slopes.iter().map(String::as_str));
        write!(f, "({} | {})", lhs.join(" + "), self.grouping)
    }
}

/// Split `"group + age"` (with or without a leading `~`) into variables.
pub fn parse_fixed_effects(formula: &str) -> Result<Vec<String>> {
    let rhs = formula.split_once('~').map_or(formula, |(_, rhs)| rhs);
    let terms: Vec<String> = rhs
        .split('+')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    if terms.is_empty() {
        return Err(RarefyError::FormulaParse(format!(
            "No fixed effects in '{}'",
            formula
        )));
    }
    Ok(terms)
}

/// Check that every fixed and random effect variable is a metadata column.
pub fn check_effects(
    metadata: &Metadata,
    fixed: &[String],
    random: &[RandomEffect],
) -> Result<()> {
    if fixed.is_empty() {
        return Err(RarefyError::InvalidParameter(
            "At least one fixed effect is required".to_string(),
        ));
    }
    let random_vars = random.iter().flat_map(RandomEffect::variables);
    for var in fixed.iter().map(String::as_str).chain(random_vars) {
        if !metadata.has_column(var) {
            return Err(RarefyError::MissingColumn(var.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_intercept() {
        let re = RandomEffect::parse("(1 | subject)").unwrap();
        assert!(re.intercept);
        assert!(re.slopes.is_empty());
        assert_eq!(re.grouping, "subject");
        assert_eq!(re.to_string(), "(1 | subject)");
    }

    #[test]
    fn test_random_slopes() {
        let re = RandomEffect::parse("(0 + time | subject_id)").unwrap();
        assert!(!re.intercept);
        assert_eq!(re.slopes, vec!["time"]);
        assert_eq!(re.variables(), vec!["subject_id", "time"]);

        let re = RandomEffect::parse("(time|site)").unwrap();
        assert!(re.intercept);
        assert_eq!(re.to_string(), "(1 + time | site)");
    }

    #[test]
    fn test_invalid_random_effects() {
        assert!(RandomEffect::parse("1 | subject").is_err());
        assert!(RandomEffect::parse("(1 | )").is_err());
        assert!(RandomEffect::parse("(0 | subject)").is_err());
    }

    #[test]
    fn test_fixed_effects() {
        assert_eq!(parse_fixed_effects("~ group + age").unwrap(), vec!["group", "age"]);
        assert_eq!(parse_fixed_effects("diet").unwrap(), vec!["diet"]);
        assert!(parse_fixed_effects("~ ").is_err());
    }

    #[test]
    fn test_check_effects_against_metadata() {
        let metadata = Metadata::from_rows(
            vec!["group".into(), "subject".into()],
            vec![("S1".into(), vec!["a".into(), "p1".into()])],
        )
        .unwrap();
        let random = vec![RandomEffect::parse("(1 | subject)").unwrap()];
        assert!(check_effects(&metadata, &["group".to_string()], &random).is_ok());

        let err = check_effects(&metadata, &["age".to_string()], &random).unwrap_err();
        assert!(matches!(err, RarefyError::MissingColumn(c) if c == "age"));

        let bad = vec![RandomEffect::parse("(1 | site)").unwrap()];
        assert!(check_effects(&metadata, &["group".to_string()], &bad).is_err());
    }
}
