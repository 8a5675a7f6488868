use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OverlayConfig {
    /// Class of the viewer's root container.
    pub root_class: String,
    /// Links naming the shown file, most specific first.
    pub link_classes: Vec<String>,
    /// Containers whose first link names the shown file.
    pub link_container_classes: Vec<String>,
    /// Frames a gesture-initiated opening waits for the viewer root to appear.
    pub intent_grace_frames: u32,
    /// Paint cycle length used by the live session loop.
    pub frame_interval_ms: u64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            root_class: "mw-mmv-wrapper".into(),
            link_classes: vec![
                "mw-mmv-description-page-button".into(),
                "mw-mmv-repo".into(),
                "mw-mmv-filepage".into(),
            ],
            link_container_classes: vec!["mw-mmv-title".into(), "mw-mmv-title-contain".into()],
            intent_grace_frames: 30,
            frame_interval_ms: 16,
        }
    }
}
