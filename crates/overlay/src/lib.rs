//! Obstruction for the full-screen media viewer.
//!
//! The viewer renders into its own layer and swaps content independently of the page,
//! so there is always a window where it is visible but its subject is not yet known.
//! [`OverlaySynchronizer`] keeps that window obstructed: it pre-obstructs on user
//! intent, only lifts obstruction on a positive safe verdict, and coalesces updates to
//! one per frame.

pub mod config;
pub mod state;
pub mod synchronizer;

pub use config::OverlayConfig;
pub use state::{OverlayPhase, OverlayState};
pub use synchronizer::OverlaySynchronizer;
