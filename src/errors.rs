//! Error taxonomy of the engine.
//!
//! Engine operations are best effort and never surface errors to the page; these types
//! cover setup (configuration, render signal, documents) and the CLI edge.

use thiserror::Error;
use veil_classification::ClassificationError;
use veil_core_types::ReferenceError;
use veil_dom::DomError;
use veil_resolver::ResolverError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed reference: {0}")]
    Reference(#[from] ReferenceError),
    #[error("document error: {0}")]
    Dom(#[from] DomError),
    #[error("classification error: {0}")]
    Classification(#[from] ClassificationError),
    #[error("resolver setup failed: {0}")]
    Resolver(#[from] ResolverError),
    #[error("invalid render signal: {0}")]
    Signal(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid birth date: {0:?}")]
    BirthDate(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn signal(msg: impl Into<String>) -> Self {
        Self::Signal(msg.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
