use thiserror::Error;
use veil_core_types::ReferenceError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("no classification known for {0}")]
    NotFound(String),
    #[error("classification backend failed: {0}")]
    Backend(String),
    #[error("no async runtime available for remote lookup")]
    NoRuntime,
    #[error("malformed reference: {0}")]
    Reference(#[from] ReferenceError),
}

impl ClassificationError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
