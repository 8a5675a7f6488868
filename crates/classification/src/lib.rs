//! Sensitivity verdicts for the current page view.
//!
//! The cache answers synchronously from what it already knows and issues at most one
//! remote lookup per reference through a [`ClassificationPort`]. Completed lookups are
//! announced as [`ClassificationUpdate`]s so every consumer can re-apply its state.

pub mod cache;
pub mod config;
pub mod errors;
pub mod port;

pub use cache::{CacheStats, ClassificationCache, ClassificationUpdate, Verdict};
pub use config::ClassificationConfig;
pub use errors::ClassificationError;
pub use port::{Classification, ClassificationPort, StaticClassifier};
