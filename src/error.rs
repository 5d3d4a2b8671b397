//! Error types for the microbiome-rarefy library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum RarefyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Unknown analysis '{0}'")]
    UnknownAnalysis(String),

    #[error("Invalid distance metric '{0}'")]
    InvalidMetric(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Formula parse error: {0}")]
    FormulaParse(String),

    // Data errors
    #[error("Invalid count value '{value}' at row {row}, column {col}")]
    InvalidCount {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Duplicate sample identifier '{0}'")]
    DuplicateSample(String),

    #[error("Sample ID mismatch: {0}")]
    SampleMismatch(String),

    #[error("Sample '{sample}' has depth {depth}, below the rarefaction depth {target}")]
    InsufficientDepth {
        sample: String,
        depth: u64,
        target: u64,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Count row {row} ('{feature}') has {actual} values, expected {expected}")]
    RowLength {
        feature: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    // Aggregation and execution errors
    #[error("Cannot aggregate an empty replicate collection")]
    EmptyReplicates,

    #[error("Replicate {replicate}: invalid p-value {value}")]
    InvalidPValue { replicate: usize, value: f64 },

    #[error("Replicate {replicate} failed: {source}")]
    Replicate {
        replicate: usize,
        #[source]
        source: Box<RarefyError>,
    },

    #[error("{engine} engine failed: {message}")]
    Engine { engine: String, message: String },
}

impl RarefyError {
    /// Wrap an error with the index of the replicate that produced it.
    pub fn in_replicate(self, replicate: usize) -> Self {
        RarefyError::Replicate {
            replicate,
            source: Box::new(self),
        }
    }

    /// True for fail-fast configuration errors (bad names, missing columns).
    pub fn is_configuration(&self) -> bool {
        match self {
            RarefyError::MissingColumn(_)
            | RarefyError::UnknownAnalysis(_)
            | RarefyError::InvalidMetric(_)
            | RarefyError::InvalidParameter(_)
            | RarefyError::FormulaParse(_) => true,
            RarefyError::Replicate { source, .. } => source.is_configuration(),
            _ => false,
        }
    }

    /// True for errors caused by the input tables themselves.
    pub fn is_data(&self) -> bool {
        match self {
            RarefyError::InvalidCount { .. }
            | RarefyError::DuplicateSample(_)
            | RarefyError::SampleMismatch(_)
            | RarefyError::InsufficientDepth { .. }
            | RarefyError::DimensionMismatch { .. }
            | RarefyError::RowLength { .. }
            | RarefyError::EmptyData(_) => true,
            RarefyError::Replicate { source, .. } => source.is_data(),
            _ => false,
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, RarefyError>;
