//! media-veil library
//!
//! Keeps sensitive media in a rendered wiki document obstructed until a user who opted
//! in may see it. The engine crates do the work; this crate wires one page view together
//! and carries configuration, the render signal and the preference gate.

pub mod attestation;
pub mod config;
pub mod errors;
pub mod gate;
pub mod metrics;
pub mod observability;
pub mod session;
pub mod signal;

pub use config::{load_config, load_config_with_options, EngineConfig, LoadOptions};
pub use errors::{EngineError, EngineResult};
pub use gate::{may_unblur, PreferenceGate};
pub use session::{DocumentEdit, PageEvent, PageSession, SessionReport};
pub use signal::RenderSignal;

pub use veil_blur::{BlurStateController, MarkerConfig};
pub use veil_classification::{ClassificationCache, ClassificationPort, StaticClassifier};
pub use veil_core_types::{MediaReference, PreferenceState};
pub use veil_dom::{Document, DocumentSnapshot, NodeId};
pub use veil_overlay::OverlaySynchronizer;
pub use veil_resolver::MediaIdentityResolver;
