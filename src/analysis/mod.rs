//! Repeated-rarefaction analyses: alpha diversity and PERMANOVA.

mod config;
mod report;
mod runner;

pub use config::{AlphaConfig, AnalysisConfig};
pub use report::{AlphaReplicate, AlphaReport, AnalysisReport, PermanovaReport};
pub use runner::{alpha_replicate, run_alpha, run_analysis, run_permanova};
