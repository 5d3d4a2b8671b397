//! Analysis configuration records and their YAML form.

use crate::diversity::AlphaIndex;
use crate::error::{RarefyError, Result};
use crate::rarefy::RarefactionConfig;
use crate::test::PermanovaConfig;
use serde::{Deserialize, Serialize};

/// Alpha diversity compared across the levels of one metadata column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaConfig {
    pub index: AlphaIndex,
    pub group_column: String,
}

impl Default for AlphaConfig {
    fn default() -> Self {
        Self {
            index: AlphaIndex::Shannon,
            group_column: "group".to_string(),
        }
    }
}

impl AlphaConfig {
    pub fn new(index: AlphaIndex, group_column: &str) -> Self {
        Self {
            index,
            group_column: group_column.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.group_column.trim().is_empty() {
            return Err(RarefyError::InvalidParameter(
                "Alpha diversity needs a group column".to_string(),
            ));
        }
        Ok(())
    }
}

/// One complete rarefied analysis, as read from a YAML file.
///
/// ```yaml
/// analysis: alpha
/// rarefaction:
///   depth: 1000
///   n_replicates: 100
///   seed: 42
///   acat: sum
/// alpha:
///   index: shannon
///   group_column: group
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum AnalysisConfig {
    Alpha {
        rarefaction: RarefactionConfig,
        alpha: AlphaConfig,
    },
    Permanova {
        rarefaction: RarefactionConfig,
        permanova: PermanovaConfig,
    },
}

impl AnalysisConfig {
    pub const NAMES: [&'static str; 2] = ["alpha", "permanova"];

    /// Default configuration for a named analysis.
    pub fn example(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "alpha" => Ok(AnalysisConfig::Alpha {
                rarefaction: RarefactionConfig::default(),
                alpha: AlphaConfig::default(),
            }),
            "permanova" => Ok(AnalysisConfig::Permanova {
                rarefaction: RarefactionConfig::default(),
                permanova: PermanovaConfig::default(),
            }),
            _ => Err(RarefyError::UnknownAnalysis(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisConfig::Alpha { .. } => "alpha",
            AnalysisConfig::Permanova { .. } => "permanova",
        }
    }

    pub fn rarefaction(&self) -> &RarefactionConfig {
        match self {
            AnalysisConfig::Alpha { rarefaction, .. }
            | AnalysisConfig::Permanova { rarefaction, .. } => rarefaction,
        }
    }

    /// Metadata columns the analysis needs.
    pub fn required_columns(&self) -> Result<Vec<String>> {
        match self {
            AnalysisConfig::Alpha { alpha, .. } => Ok(vec![alpha.group_column.clone()]),
            AnalysisConfig::Permanova { permanova, .. } => permanova.required_columns(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.rarefaction().validate()?;
        match self {
            AnalysisConfig::Alpha { alpha, .. } => alpha.validate(),
            AnalysisConfig::Permanova { permanova, .. } => permanova.validate().map(|_| ()),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(RarefyError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AcatStatistic;
    use crate::diversity::DistanceMetric;

    #[test]
    fn test_alpha_yaml_round_trip() {
        let config = AnalysisConfig::Alpha {
            rarefaction: RarefactionConfig::new(2500, 20).with_seed(3),
            alpha: AlphaConfig::new(AlphaIndex::Chao1, "diet"),
        };
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("analysis: alpha"));
        assert_eq!(AnalysisConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_permanova_from_yaml() {
        let yaml = r#"
analysis: permanova
rarefaction:
  depth: 500
  n_replicates: 10
  seed: 1
  acat: mean
permanova:
  formula: "~ group + age"
  metric: jaccard
  strata: subject
  n_permutations: 199
  seed: 9
"#;
        let config = AnalysisConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name(), "permanova");
        assert_eq!(config.rarefaction().depth, 500);
        assert_eq!(config.rarefaction().acat, AcatStatistic::Mean);
        let AnalysisConfig::Permanova { permanova, .. } = &config else {
            panic!("expected permanova");
        };
        assert_eq!(permanova.metric, DistanceMetric::Jaccard);
        assert_eq!(
            config.required_columns().unwrap(),
            vec!["age", "group", "subject"]
        );
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let unknown = "analysis: beta_dispersion\nrarefaction: {depth: 10, n_replicates: 1, seed: 1}\n";
        assert!(matches!(
            AnalysisConfig::from_yaml(unknown),
            Err(RarefyError::Yaml(_))
        ));

        let bad_depth = "analysis: alpha\nrarefaction: {depth: 0, n_replicates: 1, seed: 1}\nalpha: {index: shannon, group_column: group}\n";
        assert!(matches!(
            AnalysisConfig::from_yaml(bad_depth),
            Err(RarefyError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_example_configs() {
        for name in AnalysisConfig::NAMES {
            let config = AnalysisConfig::example(name).unwrap();
            assert_eq!(config.name(), name);
            assert!(config.validate().is_ok());
        }
        assert!(matches!(
            AnalysisConfig::example("unifrac"),
            Err(RarefyError::UnknownAnalysis(_))
        ));
    }
}
