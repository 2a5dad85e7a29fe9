//! Error types.

/// Fatal errors raised while screening candidate de novo calls.
///
/// Statistical edge cases are never reported through this type; they are
/// absorbed where the tests are computed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DenovoError {
    /// Depth encoding does not consist of exactly four non-negative integers.
    #[error("malformed depth field {value:?}, expected four comma-separated counts")]
    MalformedDepthField { value: String },
    /// A field value that cannot be parsed into the expected type.
    #[error("invalid value {value:?}: {message}")]
    InvalidValue { value: String, message: String },
    /// A required column is absent from the input table.
    #[error("required column {column:?} is missing")]
    MissingColumn { column: String },
    /// Parental depth given as a collection whose length is not two.
    #[error("expected a single depth or one depth per parent, got {len} values")]
    AmbiguousDepthInput { len: usize },
    /// The confidence threshold can never be exceeded.
    #[error("confidence threshold must be in [0, 1), got {threshold}")]
    InvalidThreshold { threshold: f64 },
    /// Per-read error probability outside of `[0, 1]`.
    #[error("error rate must be in [0, 1], got {error_rate}")]
    InvalidErrorRate { error_rate: f64 },
    /// Consequence term absent from the severity table.
    #[error("undefined consequence {value:?}")]
    UndefinedConsequence { value: String },
    /// Segmental duplication source row that cannot be indexed.
    #[error("invalid segdup record on line {line}: {message}")]
    InvalidSegdupRecord { line: usize, message: String },
    /// Wraps another error with the row and column that triggered it.
    #[error("row {row}, column {column:?}: {source}")]
    InRow {
        row: usize,
        column: String,
        #[source]
        source: Box<DenovoError>,
    },
}

impl DenovoError {
    /// Attach the 1-based data row and the column name to `self`.
    pub fn in_row(self, row: usize, column: &str) -> Self {
        DenovoError::InRow {
            row,
            column: column.to_string(),
            source: Box::new(self),
        }
    }
}
