//! Structural errors raised by the library.
//!
//! Configuration gaps and data-quality problems are reported as warnings next
//! to a best-effort result; only inputs that cannot be interpreted at all end
//! up here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The merge was invoked without a single input table
    #[error("no input files were supplied")]
    NoInputFiles,

    /// Two output columns share a name
    #[error("output column '{0}' is defined more than once")]
    DuplicateOutputColumn(String),

    /// A table header repeats a column name after trimming
    #[error("column '{0}' appears more than once in the table header")]
    DuplicateColumn(String),

    /// A row is wider or narrower than the header
    #[error("row {row} has {found} cell(s) but the header declares {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// The rule key column does not exist in the target table
    #[error("key column '{column}' not found in target table. Available: {available:?}")]
    MissingKeyColumn {
        column: String,
        available: Vec<String>,
    },
}
