use regex::Regex;
use tracing::trace;
use veil_core_types::MediaReference;
use veil_dom::{Document, NodeId};

use crate::config::ResolverConfig;
use crate::errors::ResolverError;
use crate::patterns::{parse_candidate, UrlPatterns};

/// Resolution strategies in priority order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Strategy {
    /// `data-file-name` / `data-title` on the node.
    IdentityAttributes,
    /// RDFa `resource` attribute carrying a namespaced title.
    ResourceAttribute,
    /// `alt` / `title` values shaped like `name.ext`, node first, then its link.
    FilenameHeuristic,
    /// The URL the node is currently displaying.
    ImageUrl,
    /// The nearest enclosing link.
    EnclosingLink,
}

impl Strategy {
    pub const ORDER: [Strategy; 5] = [
        Strategy::IdentityAttributes,
        Strategy::ResourceAttribute,
        Strategy::FilenameHeuristic,
        Strategy::ImageUrl,
        Strategy::EnclosingLink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::IdentityAttributes => "identity_attributes",
            Strategy::ResourceAttribute => "resource_attribute",
            Strategy::FilenameHeuristic => "filename_heuristic",
            Strategy::ImageUrl => "image_url",
            Strategy::EnclosingLink => "enclosing_link",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resolution {
    pub reference: MediaReference,
    pub strategy: Strategy,
}

const HEURISTIC_ATTRIBUTES: [&str; 2] = ["alt", "title"];

#[derive(Debug, Clone)]
pub struct MediaIdentityResolver {
    urls: UrlPatterns,
    namespaced: Regex,
    filename: Regex,
}

impl MediaIdentityResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let extensions: Vec<String> = config
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(regex::escape)
            .collect();
        let extensions = if extensions.is_empty() {
            "png|jpe?g|gif".to_string()
        } else {
            extensions.join("|")
        };
        Ok(Self {
            urls: UrlPatterns::new(config)?,
            namespaced: Regex::new(r"(?i)^\s*:?\s*(?:file|image|media)\s*:")?,
            filename: Regex::new(&format!(
                r"(?i)^\s*(?:(?:file|image|media)\s*:\s*)?[^/\\:|#<>\[\]{{}}]+\.(?:{extensions})\s*$"
            ))?,
        })
    }

    pub fn urls(&self) -> &UrlPatterns {
        &self.urls
    }

    /// Runs the strategies in [`Strategy::ORDER`]; the first that yields a reference
    /// wins. `None` means the node carries no usable identity.
    pub fn resolve(&self, doc: &Document, node: NodeId) -> Option<Resolution> {
        Strategy::ORDER.iter().find_map(|strategy| {
            let reference = self.apply(*strategy, doc, node)?;
            trace!(
                target: "veil.resolver",
                node = %node,
                strategy = strategy.as_str(),
                reference = %reference,
                "resolver.resolve.hit"
            );
            Some(Resolution {
                reference,
                strategy: *strategy,
            })
        })
    }

    pub fn resolve_reference(&self, doc: &Document, node: NodeId) -> Option<MediaReference> {
        self.resolve(doc, node).map(|resolution| resolution.reference)
    }

    /// Resolves a bare URL or name: URL shapes first, then a namespaced or filename-like
    /// string.
    pub fn resolve_url(&self, raw: &str) -> Option<MediaReference> {
        self.urls.match_url(raw).or_else(|| {
            if self.namespaced.is_match(raw) || self.filename.is_match(raw) {
                parse_candidate(raw, "raw")
            } else {
                None
            }
        })
    }

    pub fn resolve_hash(&self, hash: &str) -> Option<MediaReference> {
        self.urls.match_hash(hash)
    }

    fn apply(&self, strategy: Strategy, doc: &Document, node: NodeId) -> Option<MediaReference> {
        match strategy {
            Strategy::IdentityAttributes => self.identity_attributes(doc, node),
            Strategy::ResourceAttribute => self.resource_attribute(doc, node),
            Strategy::FilenameHeuristic => self.filename_heuristic(doc, node),
            Strategy::ImageUrl => doc
                .current_src(node)
                .and_then(|src| self.urls.match_url(src)),
            Strategy::EnclosingLink => doc
                .closest_link(node)
                .and_then(|link| doc.attribute(link, "href"))
                .and_then(|href| self.urls.match_url(href)),
        }
    }

    fn identity_attributes(&self, doc: &Document, node: NodeId) -> Option<MediaReference> {
        if let Some(name) = doc.attribute(node, "data-file-name").filter(|v| !v.trim().is_empty()) {
            if let Some(reference) = parse_candidate(name, "data-file-name") {
                return Some(reference);
            }
        }
        doc.attribute(node, "data-title")
            .filter(|title| self.namespaced.is_match(title))
            .and_then(|title| parse_candidate(title, "data-title"))
    }

    fn resource_attribute(&self, doc: &Document, node: NodeId) -> Option<MediaReference> {
        let resource = doc.attribute(node, "resource")?;
        let resource = resource.trim().trim_start_matches("./");
        if self.namespaced.is_match(resource) {
            parse_candidate(resource, "resource")
        } else {
            None
        }
    }

    fn filename_heuristic(&self, doc: &Document, node: NodeId) -> Option<MediaReference> {
        let mut holders = vec![node];
        if let Some(link) = doc.closest_link(node).filter(|link| *link != node) {
            holders.push(link);
        }
        holders.into_iter().find_map(|holder| {
            HEURISTIC_ATTRIBUTES.iter().find_map(|attribute| {
                doc.attribute(holder, attribute)
                    .filter(|value| self.filename.is_match(value))
                    .and_then(|value| parse_candidate(value, "filename"))
            })
        })
    }
}
