//! Core tables: counts, metadata, formulas and the joined dataset.

mod count_matrix;
mod dataset;
mod design_matrix;
mod formula;
mod metadata;

pub use count_matrix::CountMatrix;
pub use dataset::{Dataset, DropReason, DroppedSample};
pub use design_matrix::DesignMatrix;
pub use formula::{Formula, Term};
pub use metadata::{Metadata, Variable, VariableType};
