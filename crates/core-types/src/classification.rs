use chrono::{DateTime, Utc};

use crate::reference::MediaReference;

/// Where a sensitivity verdict came from.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ClassificationSource {
    /// The media description carries the sensitivity marker text.
    Marker,
    /// The media item belongs to the sensitive category.
    Category,
    /// Supplied without provenance (render signal, document markers).
    Unknown,
}

/// Resolved sensitivity of one media reference. Valid for the rest of the page view.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassificationRecord {
    pub reference: MediaReference,
    pub is_sensitive: bool,
    pub resolved_at: DateTime<Utc>,
    pub source: ClassificationSource,
}

impl ClassificationRecord {
    pub fn new(reference: MediaReference, is_sensitive: bool, source: ClassificationSource) -> Self {
        Self {
            reference,
            is_sensitive,
            resolved_at: Utc::now(),
            source,
        }
    }
}
