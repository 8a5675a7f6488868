//! Shared primitives for the media-veil engine crates.

use std::fmt;

use uuid::Uuid;

pub mod classification;
pub mod preference;
pub mod reference;

pub use classification::{ClassificationRecord, ClassificationSource};
pub use preference::PreferenceState;
pub use reference::{MediaReference, ReferenceError, FILE_NAMESPACE};

/// Identifies one page view. All per-page state (cache, overlay, targets) lives exactly as
/// long as the view it was created for.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PageViewId(pub String);

impl PageViewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for PageViewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
