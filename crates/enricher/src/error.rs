//! Enricher error types.
//!
//! [`EnricherError`] covers construction-time failures. Per-flow problems
//! are not errors: they are counted and the flow is dropped.

use ironflow_core::error::{ConfigError, IronflowError};

use crate::classifier::ClassifierError;

#[derive(Debug, thiserror::Error)]
pub enum EnricherError {
    /// A classifier rule does not compile
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    /// Invalid enricher setting
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },
}

impl From<EnricherError> for IronflowError {
    fn from(err: EnricherError) -> Self {
        match err {
            EnricherError::Classifier(e) => IronflowError::Classifier(e.to_string()),
            EnricherError::Config { field, reason } => {
                IronflowError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
