//! Media identity resolution.
//!
//! Maps a rendered element, its enclosing link or a raw URL onto a [`MediaReference`].
//! Strategies run in a fixed priority order and the first success wins; results from
//! different strategies are never combined.

pub mod config;
pub mod errors;
pub mod patterns;
pub mod strategy;

pub use config::ResolverConfig;
pub use errors::ResolverError;
pub use patterns::UrlPatterns;
pub use strategy::{MediaIdentityResolver, Resolution, Strategy};
pub use veil_core_types::MediaReference;
