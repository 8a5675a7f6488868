//! Minimal document model for the blur engine.
//!
//! The engine never talks to a browser directly. Hosts mirror the rendered page into a
//! [`Document`], forward structural changes as [`MutationBatch`]es and read the class
//! tokens the engine applied back out.

pub mod document;
pub mod errors;
pub mod mutation;
pub mod snapshot;

pub use document::{Document, NodeId};
pub use errors::DomError;
pub use mutation::{MutationBatch, MutationRecord};
pub use snapshot::{DocumentSnapshot, NodeSnapshot};
