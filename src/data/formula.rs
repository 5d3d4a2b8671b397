//! R-style model formulas for grouping and covariates.

use crate::error::{RarefyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One term on the right-hand side of a formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    Main(String),
    Interaction(String, String),
}

impl Term {
    pub fn variables(&self) -> Vec<&str> {
        match self {
            Term::Main(v) => vec![v.as_str()],
            Term::Interaction(a, b) => vec![a.as_str(), b.as_str()],
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Main(v) => write!(f, "{}", v),
            Term::Interaction(a, b) => write!(f, "{}:{}", a, b),
        }
    }
}

/// A parsed formula.
///
/// Accepted forms: `~ group`, `~ group + age`, `~ group * age` (main effects
/// plus interaction), `~ group:age`, `~ 0 + group`. A left-hand side
/// (`dist ~ group`, as written for adonis-style calls) is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub intercept: bool,
    pub terms: Vec<Term>,
}

impl Formula {
    /// Parse a formula string.
    ///
    /// ```
    /// use microbiome_rarefy::data::Formula;
    /// let f = Formula::parse("~ treatment + week").unwrap();
    /// assert_eq!(f.variables(), vec!["treatment", "week"]);
    /// ```
    pub fn parse(formula: &str) -> Result<Self> {
        let (_, rhs) = formula
            .split_once('~')
            .ok_or_else(|| RarefyError::FormulaParse(format!("'{}' has no '~'", formula)))?;

        let mut intercept = true;
        let mut terms: Vec<Term> = Vec::new();

        for piece in rhs.split('+').map(str::trim) {
            match piece {
                "" => continue,
                "1" => intercept = true,
                "0" | "-1" => intercept = false,
                _ if piece.contains('*') => {
                    let (a, b) = split_pair(piece, '*')?;
                    push_unique(&mut terms, Term::Main(a.clone()));
                    push_unique(&mut terms, Term::Main(b.clone()));
                    push_unique(&mut terms, Term::Interaction(a, b));
                }
                _ if piece.contains(':') => {
                    let (a, b) = split_pair(piece, ':')?;
                    push_unique(&mut terms, Term::Interaction(a, b));
                }
                _ => {
                    if !is_identifier(piece) {
                        return Err(RarefyError::FormulaParse(format!(
                            "Invalid term '{}'",
                            piece
                        )));
                    }
                    push_unique(&mut terms, Term::Main(piece.to_string()));
                }
            }
        }

        if terms.is_empty() {
            return Err(RarefyError::FormulaParse(format!(
                "'{}' has no terms",
                formula.trim()
            )));
        }
        Ok(Self { intercept, terms })
    }

    /// Distinct variable names, sorted.
    pub fn variables(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = self.terms.iter().flat_map(Term::variables).collect();
        vars.sort_unstable();
        vars.dedup();
        vars
    }
}

fn push_unique(terms: &mut Vec<Term>, term: Term) {
    if !terms.contains(&term) {
        terms.push(term);
    }
}

fn split_pair(piece: &str, sep: char) -> Result<(String, String)> {
    let parts: Vec<&str> = piece.split(sep).map(str::trim).collect();
    match parts.as_slice() {
        [a, b] if is_identifier(a) && is_identifier(b) => Ok((a.to_string(), b.to_string())),
        _ => Err(RarefyError::FormulaParse(format!(
            "Invalid interaction term '{}'",
            piece
        ))),
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~ ")?;
        if !self.intercept {
            write!(f, "0 + ")?;
        }
        let terms: Vec<String> = self.terms.iter().map(Term::to_string).collect();
        write!(f, "{}", terms.join(" + "))
    }
}
