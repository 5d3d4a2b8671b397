//! Handing a dataset to an external DA engine and collecting its tables.

use super::config::{Aldex2Config, AncomBc2Config, Maaslin2Config};
use super::output::{AnalysisKind, DaOutput, DaOutputs};
use super::table::DaTable;
use crate::data::{Dataset, Metadata};
use crate::error::{RarefyError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Which engine to run, with its full configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum DaRequest {
    #[serde(rename = "ancombc2")]
    AncomBc2(AncomBc2Config),
    #[serde(rename = "aldex2")]
    Aldex2(Aldex2Config),
    #[serde(rename = "maaslin2")]
    Maaslin2(Maaslin2Config),
}

impl DaRequest {
    pub fn method(&self) -> &'static str {
        match self {
            DaRequest::AncomBc2(_) => "ancombc2",
            DaRequest::Aldex2(_) => "aldex2",
            DaRequest::Maaslin2(_) => "maaslin2",
        }
    }

    pub fn validate(&self, metadata: &Metadata) -> Result<()> {
        match self {
            DaRequest::AncomBc2(c) => c.validate(metadata),
            DaRequest::Aldex2(c) => c.validate(metadata),
            DaRequest::Maaslin2(c) => c.validate(metadata),
        }
    }

    /// Extra tables expected besides the primary one.
    pub fn analyses(&self) -> &[AnalysisKind] {
        match self {
            DaRequest::AncomBc2(c) => &c.analyses,
            DaRequest::Aldex2(_) | DaRequest::Maaslin2(_) => &[],
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// A differential-abundance backend.
pub trait DaEngine {
    fn name(&self) -> &str;

    fn run(&self, dataset: &Dataset, request: &DaRequest) -> Result<DaOutputs>;
}

/// File names exchanged with a [`CommandEngine`].
pub const COUNTS_FILE: &str = "counts.tsv";
pub const METADATA_FILE: &str = "metadata.tsv";
pub const REQUEST_FILE: &str = "request.yaml";
pub const PRIMARY_FILE: &str = "primary.tsv";

/// Runs an external program (typically an R script) as the engine.
///
/// The program is invoked as `program [args..] <workdir>`. The work
/// directory holds `counts.tsv`, `metadata.tsv` and `request.yaml`; the
/// program must write `primary.tsv` and one `<kind>.tsv` per requested
/// analysis kind, in the [`DaTable`] column layout.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    name: String,
    program: PathBuf,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new<P: Into<PathBuf>>(name: &str, program: P) -> Self {
        Self {
            name: name.to_string(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn engine_error(&self, message: String) -> RarefyError {
        RarefyError::Engine {
            engine: self.name.clone(),
            message,
        }
    }

    fn write_inputs(&self, dir: &Path, dataset: &Dataset, request: &DaRequest) -> Result<()> {
        dataset.counts().to_tsv(dir.join(COUNTS_FILE))?;
        dataset.metadata().to_tsv(dir.join(METADATA_FILE))?;
        fs::write(dir.join(REQUEST_FILE), request.to_yaml()?)?;
        Ok(())
    }

    fn read_table(&self, dir: &Path, file: &str) -> Result<DaTable> {
        let path = dir.join(file);
        if !path.exists() {
            return Err(self.engine_error(format!("expected output '{}' was not written", file)));
        }
        DaTable::read_tsv(path)
    }
}

impl DaEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, dataset: &Dataset, request: &DaRequest) -> Result<DaOutputs> {
        request.validate(dataset.metadata())?;

        let workdir = tempfile::tempdir()?;
        let dir = workdir.path();
        self.write_inputs(dir, dataset, request)?;

        info!(
            "Running {} ({}) on {} samples",
            self.name,
            request.method(),
            dataset.n_samples()
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(dir)
            .output()
            .map_err(|e| self.engine_error(format!("failed to start {:?}: {}", self.program, e)))?;
        debug!("{} stdout: {}", self.name, String::from_utf8_lossy(&output.stdout));

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(self.engine_error(message));
        }

        let mut outputs = DaOutputs::new(&self.name);
        outputs.insert(DaOutput::Primary(self.read_table(dir, PRIMARY_FILE)?));
        for &kind in request.analyses() {
            let table = self.read_table(dir, &format!("{}.tsv", kind.name()))?;
            outputs.insert(DaOutput::from_kind(kind, table));
        }
        Ok(outputs)
    }
}
