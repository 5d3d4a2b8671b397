//! Tagged DA engine outputs, one case per analysis kind.

use super::table::DaTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Multi-group analyses an engine may run in addition to its primary test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Any difference across all levels of the group variable.
    Global,
    /// Every pair of levels.
    Pairwise,
    /// Every level against the reference.
    Dunnett,
    /// Monotone trend over ordered levels.
    Trend,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Global,
        AnalysisKind::Pairwise,
        AnalysisKind::Dunnett,
        AnalysisKind::Trend,
    ];

    /// File stem used when exchanging tables with an engine.
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisKind::Global => "global",
            AnalysisKind::Pairwise => "pairwise",
            AnalysisKind::Dunnett => "dunnett",
            AnalysisKind::Trend => "trend",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "table", rename_all = "snake_case")]
pub enum DaOutput {
    /// The engine's main per-feature test.
    Primary(DaTable),
    Global(DaTable),
    Pairwise(DaTable),
    Dunnett(DaTable),
    Trend(DaTable),
}

impl DaOutput {
    pub fn from_kind(kind: AnalysisKind, table: DaTable) -> Self {
        match kind {
            AnalysisKind::Global => DaOutput::Global(table),
            AnalysisKind::Pairwise => DaOutput::Pairwise(table),
            AnalysisKind::Dunnett => DaOutput::Dunnett(table),
            AnalysisKind::Trend => DaOutput::Trend(table),
        }
    }

    /// `None` for the primary table.
    pub fn kind(&self) -> Option<AnalysisKind> {
        match self {
            DaOutput::Primary(_) => None,
            DaOutput::Global(_) => Some(AnalysisKind::Global),
            DaOutput::Pairwise(_) => Some(AnalysisKind::Pairwise),
            DaOutput::Dunnett(_) => Some(AnalysisKind::Dunnett),
            DaOutput::Trend(_) => Some(AnalysisKind::Trend),
        }
    }

    pub fn table(&self) -> &DaTable {
        match self {
            DaOutput::Primary(t)
            | DaOutput::Global(t)
            | DaOutput::Pairwise(t)
            | DaOutput::Dunnett(t)
            | DaOutput::Trend(t) => t,
        }
    }
}

/// Everything one engine run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaOutputs {
    pub engine: String,
    pub outputs: Vec<DaOutput>,
}

impl DaOutputs {
    pub fn new(engine: &str) -> Self {
        Self {
            engine: engine.to_string(),
            outputs: Vec::new(),
        }
    }

    /// Add an output, replacing any earlier output of the same case.
    pub fn insert(&mut self, output: DaOutput) {
        let kind = output.kind();
        self.outputs.retain(|o| o.kind() != kind);
        self.outputs.push(output);
    }

    pub fn primary(&self) -> Option<&DaTable> {
        self.outputs
            .iter()
            .find(|o| matches!(o, DaOutput::Primary(_)))
            .map(DaOutput::table)
    }

    pub fn get(&self, kind: AnalysisKind) -> Option<&DaTable> {
        self.outputs
            .iter()
            .find(|o| o.kind() == Some(kind))
            .map(DaOutput::table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DaOutput> {
        self.outputs.iter()
    }
}
