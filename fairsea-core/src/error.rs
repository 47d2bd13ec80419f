//! Error types for the fairsea-core crate.

use thiserror::Error;

/// Top-level error type for bias analysis.
///
/// Variants fall into three classes:
/// - configuration errors (`MissingColumn`, `MissingValue`, `Config`, `UnknownFamily`)
///   are fatal for the pipeline invocation;
/// - degenerate-data errors (`DegenerateTable`, `ZeroVariance`, `InsufficientData`)
///   are caught per analysis unit and turned into skipped entries;
/// - external-dependency errors (`Embedding`, `Http`) abort the invocation that
///   needed the dependency.
#[derive(Debug, Error)]
pub enum FairseaError {
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Missing value for column '{column}' at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No pipeline registered for prompt family '{0}'")]
    UnknownFamily(String),

    #[error("Degenerate contingency table: {0}")]
    DegenerateTable(String),

    #[error("Zero variance: {0}")]
    ZeroVariance(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl FairseaError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateTable(msg.into())
    }

    pub fn zero_variance(msg: impl Into<String>) -> Self {
        Self::ZeroVariance(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Degenerate-data errors affect a single analysis unit only.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            Self::DegenerateTable(_) | Self::ZeroVariance(_) | Self::InsufficientData(_)
        )
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. }
                | Self::MissingValue { .. }
                | Self::Config(_)
                | Self::UnknownFamily(_)
        )
    }
}

/// Failure to obtain reference statistics. Never fatal for a pipeline run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Reference data fetching is disabled")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Malformed reference payload: {0}")]
    Parse(String),

    #[error("No numeric year column in dataset {0}")]
    MissingYearColumn(String),

    #[error("Reference dataset {0} has no usable rows")]
    Empty(String),
}

impl FetchError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_classification() {
        assert!(FairseaError::degenerate("zero row").is_degenerate());
        assert!(FairseaError::zero_variance("constant").is_degenerate());
        assert!(FairseaError::insufficient("one group").is_degenerate());
        assert!(!FairseaError::embedding("timeout").is_degenerate());
        assert!(!FairseaError::missing_column("Gender").is_degenerate());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(FairseaError::missing_column("Race").is_configuration());
        assert!(FairseaError::UnknownFamily("X9".into()).is_configuration());
        assert!(!FairseaError::degenerate("empty").is_configuration());
    }

    #[test]
    fn test_error_messages() {
        let err = FairseaError::MissingValue {
            column: "Gender".into(),
            row: 4,
        };
        assert_eq!(err.to_string(), "Missing value for column 'Gender' at row 4");
        assert_eq!(
            FetchError::Disabled.to_string(),
            "Reference data fetching is disabled"
        );
    }
}
