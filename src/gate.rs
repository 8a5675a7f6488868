use tracing::info;
use veil_blur::MarkerConfig;
use veil_core_types::PreferenceState;
use veil_dom::Document;

/// Whether the user may see unobstructed media. Age attestation is enforced upstream
/// when the opt-in is saved, so only registration and the opt-in are consulted here.
pub fn may_unblur(preference: &PreferenceState) -> bool {
    preference.is_registered && preference.unblur_opt_in
}

/// Page-level switch decided once per page view.
#[derive(Clone, Copy, Debug)]
pub struct PreferenceGate {
    preference: PreferenceState,
}

impl PreferenceGate {
    pub fn new(preference: PreferenceState) -> Self {
        Self { preference }
    }

    pub fn preference(&self) -> PreferenceState {
        self.preference
    }

    pub fn may_unblur(&self) -> bool {
        may_unblur(&self.preference)
    }

    /// Marks the document root when the gate is open. Returns whether it was.
    pub fn apply(&self, doc: &mut Document, markers: &MarkerConfig) -> bool {
        if !self.may_unblur() {
            return false;
        }
        let root = doc.root();
        doc.add_class(root, &markers.unblur_class);
        info!(target: "veil.session", "session.gate.unblurred");
        true
    }
}
