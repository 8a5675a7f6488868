//! Obstruction markers for inline media.
//!
//! [`BlurStateController`] owns the target registry for one page view. It resolves media
//! nodes, consults the classification cache and keeps the blur marker on each node and
//! its wrapping elements in line with the verdict, including for content that arrives
//! after the initial scan.

pub mod config;
pub mod controller;
pub mod target;

pub use config::MarkerConfig;
pub use controller::{BlurStateController, ScanReport};
pub use target::{ObstructionTarget, TargetState};
