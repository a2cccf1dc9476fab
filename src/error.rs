use thiserror::Error;

/// Errors raised by the scoring pipeline.
///
/// Ingestion failures (`EmptyInput`, `Csv`, `RaggedRow`) and feature
/// selection failures are input errors and should be reported back to the
/// caller; `ModelFit` means the outlier model rejected its training data or
/// hyperparameters. Nothing here is retried internally.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("input table has no rows")]
    EmptyInput,

    #[error("failed to parse CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row} has {got} fields, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("no numeric feature columns found besides the time axis")]
    NoFeatures,

    #[error("unknown feature column: {0}")]
    UnknownFeature(String),

    #[error("the time axis cannot be used as a feature")]
    TimeAsFeature,

    #[error("model fit failed: {0}")]
    ModelFit(String),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, AnalyzeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_features_message_is_user_visible_contract() {
        assert_eq!(
            AnalyzeError::NoFeatures.to_string(),
            "no numeric feature columns found besides the time axis"
        );
    }

    #[test]
    fn ragged_row_display() {
        let err = AnalyzeError::RaggedRow {
            row: 3,
            expected: 4,
            got: 2,
        };
        assert_eq!(err.to_string(), "row 3 has 2 fields, expected 4");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AnalyzeError>();
    }
}
