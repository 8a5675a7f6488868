use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Path segments under which uploaded assets are served (`/w/images/…`).
    pub asset_roots: Vec<String>,
    /// Extensions the filename heuristic accepts, lower case, without dot.
    pub extensions: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            asset_roots: vec!["images".into(), "assets".into()],
            extensions: [
                "png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "tif", "tiff", "avif", "apng",
                "webm", "ogv", "mp4", "ogg", "djvu", "pdf",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
        }
    }
}
