use serde::Serialize;
use veil_core_types::MediaReference;

/// Lifecycle of the viewer as seen by the synchronizer.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum OverlayPhase {
    #[default]
    Closed,
    /// Visible or about to be, subject not yet established. Always obstructed.
    Opening {
        /// Entered from a pointer-down on known sensitive media.
        intent_obstructed: bool,
    },
    Open {
        reference: MediaReference,
        obstructed: bool,
    },
}

/// Externally visible summary of the viewer state.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct OverlayState {
    pub active_reference: Option<MediaReference>,
    pub obstructed: bool,
    pub transition_locked: bool,
}

impl OverlayPhase {
    pub fn is_obstructed(&self) -> bool {
        match self {
            OverlayPhase::Closed => false,
            OverlayPhase::Opening { .. } => true,
            OverlayPhase::Open { obstructed, .. } => *obstructed,
        }
    }

    pub fn summary(&self) -> OverlayState {
        OverlayState {
            active_reference: match self {
                OverlayPhase::Open { reference, .. } => Some(reference.clone()),
                _ => None,
            },
            obstructed: self.is_obstructed(),
            transition_locked: matches!(self, OverlayPhase::Opening { .. }),
        }
    }
}
