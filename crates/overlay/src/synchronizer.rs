use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, trace};
use veil_blur::MarkerConfig;
use veil_classification::{ClassificationCache, ClassificationUpdate, Verdict};
use veil_core_types::{ClassificationSource, MediaReference};
use veil_dom::{Document, NodeId};
use veil_resolver::MediaIdentityResolver;

use crate::config::OverlayConfig;
use crate::state::{OverlayPhase, OverlayState};

/// Drives the viewer's obstruction markers: the body-level pre-obstruction marker and
/// the viewer root's own marker.
///
/// Work is requested with [`schedule`](Self::schedule) and performed by
/// [`on_frame`](Self::on_frame), at most once per frame however many requests arrived.
pub struct OverlaySynchronizer {
    resolver: Arc<MediaIdentityResolver>,
    cache: Arc<ClassificationCache>,
    markers: MarkerConfig,
    config: OverlayConfig,
    phase: OverlayPhase,
    update_pending: bool,
    grace_remaining: u32,
    updates: broadcast::Receiver<ClassificationUpdate>,
}

impl OverlaySynchronizer {
    pub fn new(
        resolver: Arc<MediaIdentityResolver>,
        cache: Arc<ClassificationCache>,
        markers: MarkerConfig,
        config: OverlayConfig,
    ) -> Self {
        let updates = cache.subscribe();
        Self {
            resolver,
            cache,
            markers,
            config,
            phase: OverlayPhase::Closed,
            update_pending: false,
            grace_remaining: 0,
            updates,
        }
    }

    pub fn phase(&self) -> &OverlayPhase {
        &self.phase
    }

    pub fn state(&self) -> OverlayState {
        self.phase.summary()
    }

    pub fn is_update_pending(&self) -> bool {
        self.update_pending
    }

    pub fn schedule(&mut self) {
        self.update_pending = true;
    }

    /// Pre-obstructs when a gesture lands on media already known to be sensitive, before
    /// the viewer reacts to the same gesture. Returns whether the gesture was treated as
    /// sensitive intent.
    pub fn on_pointer_down(&mut self, doc: &mut Document, target: NodeId) -> bool {
        let inside_marker = doc
            .closest_with_class(target, &self.markers.blur_class)
            .is_some();
        let known_sensitive = inside_marker
            || self
                .resolver
                .resolve_reference(doc, target)
                .map(|reference| self.cache.is_sensitive(&reference))
                .unwrap_or(false);
        if !known_sensitive {
            return false;
        }

        self.set_preblur(doc, true);
        if self.phase == OverlayPhase::Closed {
            self.phase = OverlayPhase::Opening {
                intent_obstructed: true,
            };
            self.grace_remaining = self.config.intent_grace_frames;
        }
        self.schedule();
        debug!(
            target: "veil.overlay",
            target_node = %target,
            inside_marker,
            "overlay.intent.preblur"
        );
        true
    }

    /// One paint cycle. Performs the pending update, if any, and reports whether it did.
    pub fn on_frame(&mut self, doc: &mut Document) -> bool {
        self.drain_classification_updates();
        if !self.update_pending {
            return false;
        }
        self.update_pending = false;
        self.update(doc);
        true
    }

    /// Seeds the cache with references of elements the render pipeline marked, skipping
    /// elements in `skip` (markers applied by this engine). Returns how many references
    /// were found.
    pub fn harvest_markers(&self, doc: &Document, skip: &BTreeSet<NodeId>) -> usize {
        let marked = doc.find_all(doc.root(), |doc, node| {
            self.markers.is_marked(doc, node) && !skip.contains(&node)
        });
        let mut found: BTreeSet<MediaReference> = BTreeSet::new();
        for element in marked {
            if doc.is_tag(element, "a") {
                found.extend(
                    doc.attribute(element, "href")
                        .and_then(|href| self.resolver.resolve_url(href)),
                );
            } else if self.markers.is_media(doc, element) {
                found.extend(self.resolver.resolve_reference(doc, element));
            }
            for link in doc.find_all(element, |doc, node| {
                node != element && doc.is_tag(node, "a") && doc.attribute(node, "href").is_some()
            }) {
                found.extend(
                    doc.attribute(link, "href")
                        .and_then(|href| self.resolver.resolve_url(href)),
                );
            }
        }
        for reference in &found {
            self.cache.mark_sensitive(reference, ClassificationSource::Marker);
        }
        debug!(target: "veil.overlay", harvested = found.len(), "overlay.markers.harvested");
        found.len()
    }

    fn drain_classification_updates(&mut self) {
        loop {
            match self.updates.try_recv() {
                Ok(update) => {
                    let relevant = match &self.phase {
                        OverlayPhase::Closed => false,
                        OverlayPhase::Opening { .. } => true,
                        OverlayPhase::Open { reference, .. } => *reference == update.reference,
                    };
                    if relevant {
                        self.update_pending = true;
                    }
                }
                Err(TryRecvError::Lagged(_)) => {
                    if self.phase != OverlayPhase::Closed {
                        self.update_pending = true;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    fn update(&mut self, doc: &mut Document) {
        let root = doc.find_first(doc.root(), |doc, node| {
            doc.has_class(node, &self.config.root_class)
        });
        let Some(root) = root else {
            self.on_root_missing(doc);
            return;
        };

        let reference = self.overlay_reference(doc, root);
        let intent_obstructed = matches!(
            self.phase,
            OverlayPhase::Opening {
                intent_obstructed: true
            }
        );

        // Open requires an Opening frame first: fresh openings and navigations to a
        // different reference are shown obstructed for at least one frame.
        let entering = match (&self.phase, &reference) {
            (OverlayPhase::Closed, _) => true,
            (OverlayPhase::Open { reference: shown, .. }, Some(next)) => shown != next,
            (OverlayPhase::Open { .. }, None) => true,
            (OverlayPhase::Opening { .. }, _) => false,
        };
        if entering {
            if let OverlayPhase::Open { reference: shown, .. } = &self.phase {
                debug!(
                    target: "veil.overlay",
                    from = %shown,
                    to = ?reference.as_ref().map(|r| r.title()),
                    "overlay.navigation"
                );
            } else {
                debug!(target: "veil.overlay", "overlay.opening");
            }
            self.phase = OverlayPhase::Opening { intent_obstructed };
            self.obstruct(doc, root, true);
            self.update_pending = true;
            return;
        }

        let Some(reference) = reference else {
            trace!(target: "veil.overlay", "overlay.reference.unresolved");
            self.obstruct(doc, root, true);
            self.update_pending = true;
            return;
        };

        match self.cache.ensure_classified(&reference) {
            Verdict::Safe => {
                self.obstruct(doc, root, false);
                self.enter_open(reference, false);
            }
            Verdict::Sensitive | Verdict::Failed => {
                self.obstruct(doc, root, true);
                self.enter_open(reference, true);
            }
            Verdict::Pending | Verdict::Unknown => {
                trace!(
                    target: "veil.overlay",
                    reference = %reference,
                    "overlay.reference.pending"
                );
                self.obstruct(doc, root, true);
                self.update_pending = true;
            }
        }
    }

    fn on_root_missing(&mut self, doc: &mut Document) {
        let awaiting_viewer = matches!(
            self.phase,
            OverlayPhase::Opening {
                intent_obstructed: true
            }
        );
        if awaiting_viewer && self.grace_remaining > 0 {
            self.grace_remaining -= 1;
            self.update_pending = true;
            return;
        }
        if self.phase != OverlayPhase::Closed {
            debug!(target: "veil.overlay", "overlay.closed");
        }
        self.phase = OverlayPhase::Closed;
        self.grace_remaining = 0;
        self.set_preblur(doc, false);
    }

    fn enter_open(&mut self, reference: MediaReference, obstructed: bool) {
        debug!(
            target: "veil.overlay",
            reference = %reference,
            obstructed,
            "overlay.open"
        );
        self.grace_remaining = 0;
        self.phase = OverlayPhase::Open {
            reference,
            obstructed,
        };
    }

    fn obstruct(&self, doc: &mut Document, root: NodeId, on: bool) {
        doc.toggle_class(root, &self.markers.overlay_blur_class, on);
        self.set_preblur(doc, on);
    }

    fn set_preblur(&self, doc: &mut Document, on: bool) {
        let body = doc.body();
        doc.toggle_class(body, &self.markers.preblur_class, on);
    }

    /// Configured link classes in order, then link containers, then any link in the
    /// viewer that resolves, then the location hash route.
    fn overlay_reference(&self, doc: &Document, root: NodeId) -> Option<MediaReference> {
        let resolve_link = |link: NodeId| {
            doc.attribute(link, "href")
                .and_then(|href| self.resolver.resolve_url(href))
        };
        let is_link = |doc: &Document, node: NodeId| {
            doc.is_tag(node, "a") && doc.attribute(node, "href").is_some()
        };

        for class in &self.config.link_classes {
            let found = doc
                .find_all(root, |doc, node| is_link(doc, node) && doc.has_class(node, class))
                .into_iter()
                .find_map(resolve_link);
            if found.is_some() {
                return found;
            }
        }
        for class in &self.config.link_container_classes {
            for container in doc.find_all(root, |doc, node| doc.has_class(node, class)) {
                let found = doc
                    .find_all(container, is_link)
                    .into_iter()
                    .find_map(resolve_link);
                if found.is_some() {
                    return found;
                }
            }
        }
        doc.find_all(root, is_link)
            .into_iter()
            .find_map(resolve_link)
            .or_else(|| {
                doc.location_hash()
                    .and_then(|hash| self.resolver.resolve_hash(hash))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use veil_classification::{ClassificationConfig, StaticClassifier};
    use veil_resolver::ResolverConfig;

    fn synchronizer(sensitive: &[&str], cleared: &[&str]) -> OverlaySynchronizer {
        let cache = ClassificationCache::new(
            Arc::new(StaticClassifier::new()),
            &ClassificationConfig::default(),
        );
        cache.seed(
            sensitive.iter().map(|raw| MediaReference::parse(raw).unwrap()),
            cleared.iter().map(|raw| MediaReference::parse(raw).unwrap()),
        );
        let resolver = MediaIdentityResolver::new(&ResolverConfig::default()).unwrap();
        OverlaySynchronizer::new(
            Arc::new(resolver),
            Arc::new(cache),
            MarkerConfig::default(),
            OverlayConfig::default(),
        )
    }

    fn open_viewer(doc: &mut Document, href: &str) -> NodeId {
        let wrapper = doc.element("div", &[("class", "mw-mmv-wrapper")]);
        let link = doc.element("a", &[("class", "mw-mmv-filepage"), ("href", href)]);
        doc.append_child(wrapper, link).unwrap();
        let body = doc.body();
        doc.append_child(body, wrapper).unwrap();
        wrapper
    }

    #[test]
    fn frames_without_requests_do_nothing() {
        let mut doc = Document::new();
        let mut sync = synchronizer(&[], &[]);
        assert!(!sync.on_frame(&mut doc));
        sync.schedule();
        sync.schedule();
        assert!(sync.on_frame(&mut doc));
        assert!(!sync.on_frame(&mut doc));
    }

    #[test]
    fn safe_file_is_shown_after_one_obstructed_frame() {
        let mut doc = Document::new();
        let mut sync = synchronizer(&[], &["Safe.png"]);
        let wrapper = open_viewer(&mut doc, "/wiki/File:Safe.png");
        sync.schedule();

        sync.on_frame(&mut doc);
        assert!(doc.has_class(wrapper, "nsfw-mmv-blur"));
        assert!(doc.has_class(doc.body(), "nsfw-mmv-preblur"));

        sync.on_frame(&mut doc);
        assert!(!doc.has_class(wrapper, "nsfw-mmv-blur"));
        assert!(!doc.has_class(doc.body(), "nsfw-mmv-preblur"));
        assert_eq!(
            sync.state(),
            OverlayState {
                active_reference: Some(MediaReference::parse("Safe.png").unwrap()),
                obstructed: false,
                transition_locked: false,
            }
        );
    }

    #[test]
    fn link_classes_take_priority_over_other_links() {
        let mut doc = Document::new();
        let sync = synchronizer(&[], &[]);
        let wrapper = doc.element("div", &[("class", "mw-mmv-wrapper")]);
        let stray = doc.element("a", &[("href", "/wiki/File:Stray.png")]);
        let repo = doc.element("a", &[("class", "mw-mmv-repo"), ("href", "/wiki/File:Shown.png")]);
        doc.append_child(wrapper, stray).unwrap();
        doc.append_child(wrapper, repo).unwrap();
        assert_eq!(
            sync.overlay_reference(&doc, wrapper).map(|r| r.title()).as_deref(),
            Some("File:Shown.png")
        );
    }

    #[test]
    fn hash_route_is_the_last_resort() {
        let mut doc = Document::new();
        let sync = synchronizer(&[], &[]);
        let wrapper = doc.element("div", &[("class", "mw-mmv-wrapper")]);
        let unrelated = doc.element("a", &[("href", "/wiki/Main_Page")]);
        doc.append_child(wrapper, unrelated).unwrap();
        assert_eq!(sync.overlay_reference(&doc, wrapper), None);
        doc.set_location("https://wiki.example/wiki/Cats#/media/File:Hashed.jpg");
        assert_eq!(
            sync.overlay_reference(&doc, wrapper).map(|r| r.title()).as_deref(),
            Some("File:Hashed.jpg")
        );
    }
}
