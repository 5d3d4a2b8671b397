//! Configuration records for the supported DA engines.
//!
//! Each record lists every parameter its engine accepts; nothing is passed
//! through as an untyped option list. `validate` checks ranges and that
//! every referenced variable exists in the metadata.

use super::correct::Correction;
use super::effects::{check_effects, RandomEffect};
use super::output::AnalysisKind;
use crate::data::Metadata;
use crate::error::{RarefyError, Result};
use serde::{Deserialize, Serialize};

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(RarefyError::InvalidParameter(format!(
            "{} must be in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_alpha(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(RarefyError::InvalidParameter(format!(
            "{} must be in (0, 1), got {}",
            name, value
        )));
    }
    Ok(())
}

fn parse_random(random_effects: &[String]) -> Result<Vec<RandomEffect>> {
    random_effects.iter().map(|s| RandomEffect::parse(s)).collect()
}

fn check_group(metadata: &Metadata, group: Option<&str>, fixed: &[String], why: &str) -> Result<()> {
    let group = group.ok_or_else(|| {
        RarefyError::InvalidParameter(format!("{} needs a group variable", why))
    })?;
    if !metadata.has_column(group) {
        return Err(RarefyError::MissingColumn(group.to_string()));
    }
    if !fixed.iter().any(|f| f == group) {
        return Err(RarefyError::InvalidParameter(format!(
            "Group variable '{}' must also be a fixed effect",
            group
        )));
    }
    Ok(())
}

/// ANCOM-BC2 parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncomBc2Config {
    pub fixed_effects: Vec<String>,
    /// lme4 terms such as `(1 | subject)`.
    #[serde(default)]
    pub random_effects: Vec<String>,
    /// Categorical variable for the multi-group analyses.
    #[serde(default)]
    pub group: Option<String>,
    /// Features present in fewer than this fraction of samples are dropped.
    pub prevalence_cutoff: f64,
    /// Samples with fewer reads are dropped.
    pub library_size_cutoff: u64,
    pub correction: Correction,
    pub structural_zero: bool,
    /// Classify structural zeros with the lower confidence bound.
    pub neg_lb: bool,
    pub alpha: f64,
    pub n_bootstrap: usize,
    #[serde(default)]
    pub analyses: Vec<AnalysisKind>,
}

impl Default for AncomBc2Config {
    fn default() -> Self {
        Self {
            fixed_effects: vec!["group".to_string()],
            random_effects: Vec::new(),
            group: None,
            prevalence_cutoff: 0.10,
            library_size_cutoff: 0,
            correction: Correction::Holm,
            structural_zero: false,
            neg_lb: false,
            alpha: 0.05,
            n_bootstrap: 100,
            analyses: Vec::new(),
        }
    }
}

impl AncomBc2Config {
    pub fn new(fixed_effects: &[&str]) -> Self {
        Self {
            fixed_effects: fixed_effects.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_random_effect(mut self, term: &str) -> Self {
        self.random_effects.push(term.to_string());
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn with_analysis(mut self, kind: AnalysisKind) -> Self {
        if !self.analyses.contains(&kind) {
            self.analyses.push(kind);
        }
        self
    }

    pub fn with_correction(mut self, correction: Correction) -> Self {
        self.correction = correction;
        self
    }

    pub fn validate(&self, metadata: &Metadata) -> Result<()> {
        check_effects(metadata, &self.fixed_effects, &parse_random(&self.random_effects)?)?;
        check_fraction("prevalence_cutoff", self.prevalence_cutoff)?;
        check_alpha("alpha", self.alpha)?;
        if self.n_bootstrap == 0 {
            return Err(RarefyError::InvalidParameter(
                "n_bootstrap must be at least 1".to_string(),
            ));
        }
        if !self.analyses.is_empty() {
            check_group(
                metadata,
                self.group.as_deref(),
                &self.fixed_effects,
                "Global, pairwise, Dunnett and trend analyses",
            )?;
        }
        Ok(())
    }
}

/// Test run by ALDEx2 on the Monte-Carlo CLR instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aldex2Test {
    /// Welch t-test and Wilcoxon, two groups.
    #[default]
    TTest,
    /// Kruskal-Wallis and one-way GLM, several groups.
    Kw,
    /// Generalized linear model over the fixed effects.
    Glm,
}

/// Features forming the CLR denominator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denominator {
    #[default]
    All,
    Iqlr,
    Zero,
    Lvha,
}

/// ALDEx2 parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aldex2Config {
    pub fixed_effects: Vec<String>,
    /// Condition column for `t_test` and `kw`.
    #[serde(default)]
    pub group: Option<String>,
    pub n_monte_carlo: usize,
    pub test: Aldex2Test,
    pub denominator: Denominator,
    pub correction: Correction,
}

impl Default for Aldex2Config {
    fn default() -> Self {
        Self {
            fixed_effects: vec!["group".to_string()],
            group: Some("group".to_string()),
            n_monte_carlo: 128,
            test: Aldex2Test::TTest,
            denominator: Denominator::All,
            correction: Correction::BenjaminiHochberg,
        }
    }
}

impl Aldex2Config {
    pub fn new(fixed_effects: &[&str]) -> Self {
        Self {
            fixed_effects: fixed_effects.iter().map(|s| s.to_string()).collect(),
            group: fixed_effects.first().map(|s| s.to_string()),
            ..Default::default()
        }
    }

    pub fn with_test(mut self, test: Aldex2Test) -> Self {
        self.test = test;
        self
    }

    pub fn with_denominator(mut self, denominator: Denominator) -> Self {
        self.denominator = denominator;
        self
    }

    pub fn validate(&self, metadata: &Metadata) -> Result<()> {
        check_effects(metadata, &self.fixed_effects, &[])?;
        if self.n_monte_carlo == 0 {
            return Err(RarefyError::InvalidParameter(
                "n_monte_carlo must be at least 1".to_string(),
            ));
        }
        match self.test {
            Aldex2Test::TTest | Aldex2Test::Kw => check_group(
                metadata,
                self.group.as_deref(),
                &self.fixed_effects,
                "ALDEx2 t-test and Kruskal-Wallis",
            ),
            Aldex2Test::Glm => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Normalization {
    #[default]
    Tss,
    Clr,
    Css,
    Tmm,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Transform {
    #[default]
    Log,
    Logit,
    /// Arcsine square root.
    Ar,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Maaslin2Method {
    #[default]
    Lm,
    Cplm,
    Negbin,
    Zinb,
}

/// Maaslin2 parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maaslin2Config {
    pub fixed_effects: Vec<String>,
    /// Grouping variables only, e.g. `(1 | subject)`.
    #[serde(default)]
    pub random_effects: Vec<String>,
    /// Reference levels as `variable,level`.
    #[serde(default)]
    pub reference: Vec<String>,
    pub min_prevalence: f64,
    pub min_abundance: f64,
    pub normalization: Normalization,
    pub transform: Transform,
    pub analysis_method: Maaslin2Method,
    pub correction: Correction,
    pub max_significance: f64,
}

impl Default for Maaslin2Config {
    fn default() -> Self {
        Self {
            fixed_effects: vec!["group".to_string()],
            random_effects: Vec::new(),
            reference: Vec::new(),
            min_prevalence: 0.1,
            min_abundance: 0.0,
            normalization: Normalization::Tss,
            transform: Transform::Log,
            analysis_method: Maaslin2Method::Lm,
            correction: Correction::BenjaminiHochberg,
            max_significance: 0.25,
        }
    }
}

impl Maaslin2Config {
    pub fn new(fixed_effects: &[&str]) -> Self {
        Self {
            fixed_effects: fixed_effects.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_random_effect(mut self, term: &str) -> Self {
        self.random_effects.push(term.to_string());
        self
    }

    pub fn with_reference(mut self, variable: &str, level: &str) -> Self {
        self.reference.push(format!("{},{}", variable, level));
        self
    }

    pub fn validate(&self, metadata: &Metadata) -> Result<()> {
        let random = parse_random(&self.random_effects)?;
        if let Some(re) = random.iter().find(|re| !re.slopes.is_empty()) {
            return Err(RarefyError::InvalidParameter(format!(
                "Maaslin2 supports random intercepts only, got {}",
                re
            )));
        }
        check_effects(metadata, &self.fixed_effects, &random)?;
        check_fraction("min_prevalence", self.min_prevalence)?;
        check_alpha("max_significance", self.max_significance)?;
        if self.min_abundance < 0.0 {
            return Err(RarefyError::InvalidParameter(format!(
                "min_abundance must be non-negative, got {}",
                self.min_abundance
            )));
        }

        for entry in &self.reference {
            let (variable, level) = entry.split_once(',').ok_or_else(|| {
                RarefyError::InvalidParameter(format!(
                    "Reference '{}' must be 'variable,level'",
                    entry
                ))
            })?;
            let (variable, level) = (variable.trim(), level.trim());
            if !self.fixed_effects.iter().any(|f| f == variable) {
                return Err(RarefyError::InvalidParameter(format!(
                    "Reference variable '{}' is not a fixed effect",
                    variable
                )));
            }
            if !metadata.levels(variable)?.iter().any(|l| l == level) {
                return Err(RarefyError::InvalidParameter(format!(
                    "Reference level '{}' not found in '{}'",
                    level, variable
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Metadata {
        Metadata::from_rows(
            vec!["group".into(), "subject".into(), "age".into()],
            vec![
                ("S1".into(), vec!["ctrl".into(), "p1".into(), "30".into()]),
                ("S2".into(), vec!["trt".into(), "p1".into(), "31".into()]),
                ("S3".into(), vec!["ctrl".into(), "p2".into(), "45".into()]),
                ("S4".into(), vec!["trt".into(), "p2".into(), "46".into()]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ancombc2_validation() {
        let md = metadata();
        let config = AncomBc2Config::new(&["group", "age"]).with_random_effect("(1 | subject)");
        assert!(config.validate(&md).is_ok());

        let missing = AncomBc2Config::new(&["diet"]);
        assert!(matches!(
            missing.validate(&md),
            Err(RarefyError::MissingColumn(c)) if c == "diet"
        ));

        // Multi-group analyses need a group that is also a fixed effect.
        let no_group = AncomBc2Config::new(&["group"]).with_analysis(AnalysisKind::Pairwise);
        assert!(no_group.validate(&md).is_err());
        assert!(no_group.with_group("group").validate(&md).is_ok());

        let bad = AncomBc2Config {
            prevalence_cutoff: 1.5,
            ..AncomBc2Config::new(&["group"])
        };
        assert!(bad.validate(&md).is_err());
    }

    #[test]
    fn test_aldex2_validation() {
        let md = metadata();
        assert!(Aldex2Config::new(&["group"]).validate(&md).is_ok());
        assert!(Aldex2Config::new(&["age"])
            .with_test(Aldex2Test::Glm)
            .validate(&md)
            .is_ok());
        let zero_mc = Aldex2Config {
            n_monte_carlo: 0,
            ..Aldex2Config::new(&["group"])
        };
        assert!(zero_mc.validate(&md).is_err());
    }

    #[test]
    fn test_maaslin2_validation() {
        let md = metadata();
        let config = Maaslin2Config::new(&["group", "age"])
            .with_random_effect("(1 | subject)")
            .with_reference("group", "ctrl");
        assert!(config.validate(&md).is_ok());

        let bad_level = Maaslin2Config::new(&["group"]).with_reference("group", "placebo");
        assert!(bad_level.validate(&md).is_err());

        let slope = Maaslin2Config::new(&["group"]).with_random_effect("(age | subject)");
        assert!(slope.validate(&md).is_err());
    }

    #[test]
    fn test_yaml_names() {
        let yaml = serde_yaml::to_string(&Maaslin2Config::default()).unwrap();
        assert!(yaml.contains("normalization: TSS"));
        assert!(yaml.contains("analysis_method: LM"));
        let yaml = serde_yaml::to_string(&AncomBc2Config::default()).unwrap();
        assert!(yaml.contains("correction: holm"));
    }
}
