use serde::{Deserialize, Serialize};
use veil_dom::{Document, NodeId};

/// Class tokens and element shapes the engine reads and writes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MarkerConfig {
    /// Obstruction marker on media nodes and their wrappers.
    pub blur_class: String,
    /// Body-level marker while the overlay may be showing sensitive media.
    pub preblur_class: String,
    /// Marker on the overlay root while its content is obstructed.
    pub overlay_blur_class: String,
    /// Root-level marker when the user may see everything.
    pub unblur_class: String,
    /// Body marker the render pipeline sets on a sensitive file page.
    pub filepage_class: String,
    pub wrapper_tags: Vec<String>,
    pub wrapper_classes: Vec<String>,
    pub media_tags: Vec<String>,
    /// Keep media whose identity cannot be resolved obstructed.
    pub obstruct_unresolved: bool,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            blur_class: "nsfw-blur".into(),
            preblur_class: "nsfw-mmv-preblur".into(),
            overlay_blur_class: "nsfw-mmv-blur".into(),
            unblur_class: "nsfw-unblur".into(),
            filepage_class: "nsfw-filepage-blur".into(),
            wrapper_tags: vec!["figure".into()],
            wrapper_classes: vec!["mw-file-element".into(), "thumb".into(), "gallerybox".into()],
            media_tags: vec!["img".into()],
            obstruct_unresolved: true,
        }
    }
}

impl MarkerConfig {
    pub fn is_media(&self, doc: &Document, node: NodeId) -> bool {
        self.media_tags.iter().any(|tag| doc.is_tag(node, tag))
    }

    pub fn is_wrapper(&self, doc: &Document, node: NodeId) -> bool {
        self.wrapper_tags.iter().any(|tag| doc.is_tag(node, tag))
            || self
                .wrapper_classes
                .iter()
                .any(|class| doc.has_class(node, class))
    }

    pub fn is_marked(&self, doc: &Document, node: NodeId) -> bool {
        doc.has_class(node, &self.blur_class)
    }
}
