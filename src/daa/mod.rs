//! Differential abundance through external engines.
//!
//! Engines (ANCOM-BC2, ALDEx2, Maaslin2) run out of process behind the
//! [`DaEngine`] trait. This module owns their typed configuration, the
//! uniform result table they return and multiple-testing correction.

mod config;
mod correct;
mod effects;
mod engine;
mod output;
mod table;

pub use config::{
    Aldex2Config, Aldex2Test, AncomBc2Config, Denominator, Maaslin2Config, Maaslin2Method,
    Normalization, Transform,
};
pub use correct::Correction;
pub use effects::{check_effects, parse_fixed_effects, RandomEffect};
pub use engine::{
    CommandEngine, DaEngine, DaRequest, COUNTS_FILE, METADATA_FILE, PRIMARY_FILE, REQUEST_FILE,
};
pub use output::{AnalysisKind, DaOutput, DaOutputs};
pub use table::{round_signif, DaRow, DaTable};
