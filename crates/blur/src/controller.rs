use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, trace, warn};
use veil_classification::{ClassificationCache, ClassificationUpdate};
use veil_core_types::MediaReference;
use veil_dom::{Document, MutationBatch, NodeId};
use veil_resolver::MediaIdentityResolver;

use crate::config::MarkerConfig;
use crate::target::{ObstructionTarget, TargetState};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ScanReport {
    pub scanned: usize,
    pub obstructed: usize,
    pub safe: usize,
    pub unresolved: usize,
    /// Targets dropped because their node left the document.
    pub released: usize,
}

impl ScanReport {
    pub fn merge(&mut self, other: ScanReport) {
        self.scanned += other.scanned;
        self.obstructed += other.obstructed;
        self.safe += other.safe;
        self.unresolved += other.unresolved;
        self.released += other.released;
    }
}

/// Keeps the obstruction marker on media nodes, and on the link, table cell and wrapper
/// around them, consistent with the classification cache.
///
/// The controller remembers which markers it applied. A marker it finds already present
/// (set by the render pipeline) is left alone forever; a marker it applied to a shared
/// ancestor is removed only once no obstructed media beneath it still needs it.
pub struct BlurStateController {
    resolver: Arc<MediaIdentityResolver>,
    cache: Arc<ClassificationCache>,
    markers: MarkerConfig,
    targets: BTreeMap<NodeId, ObstructionTarget>,
    by_reference: HashMap<MediaReference, BTreeSet<NodeId>>,
    // element -> media nodes it carries our marker for
    holders: BTreeMap<NodeId, BTreeSet<NodeId>>,
    // media node -> elements marked on its behalf
    marked_for: BTreeMap<NodeId, BTreeSet<NodeId>>,
    updates: broadcast::Receiver<ClassificationUpdate>,
}

impl BlurStateController {
    pub fn new(
        resolver: Arc<MediaIdentityResolver>,
        cache: Arc<ClassificationCache>,
        markers: MarkerConfig,
    ) -> Self {
        let updates = cache.subscribe();
        Self {
            resolver,
            cache,
            markers,
            targets: BTreeMap::new(),
            by_reference: HashMap::new(),
            holders: BTreeMap::new(),
            marked_for: BTreeMap::new(),
            updates,
        }
    }

    pub fn markers(&self) -> &MarkerConfig {
        &self.markers
    }

    /// Evaluates every media node under `root`, inclusive. Running it again without
    /// intervening changes leaves the document untouched.
    pub fn scan(&mut self, doc: &mut Document, root: NodeId) -> ScanReport {
        let media = doc.find_all(root, |doc, node| self.markers.is_media(doc, node));
        let mut report = ScanReport::default();
        for node in media {
            self.evaluate(doc, node, &mut report);
        }
        debug!(
            target: "veil.blur",
            root = %root,
            scanned = report.scanned,
            obstructed = report.obstructed,
            unresolved = report.unresolved,
            "blur.scan.completed"
        );
        report
    }

    /// Handles one batch of structural changes: targets under removed subtrees are
    /// dropped, added subtrees are scanned. The rest of the document is not revisited.
    pub fn on_mutations(&mut self, doc: &mut Document, batch: &MutationBatch) -> ScanReport {
        let mut report = ScanReport::default();
        for removed in batch.removed() {
            report.released += self.release_detached(doc, removed);
        }
        for added in batch.added() {
            if doc.is_connected(added) {
                report.merge(self.scan(doc, added));
            }
        }
        trace!(
            target: "veil.blur",
            records = batch.len(),
            scanned = report.scanned,
            released = report.released,
            "blur.mutations.applied"
        );
        report
    }

    /// Content swapped without observable mutations: forget detached targets and scan
    /// the new content.
    pub fn content_replaced(&mut self, doc: &mut Document, root: NodeId) -> ScanReport {
        let released = self.collect_garbage(doc);
        let mut report = self.scan(doc, root);
        report.released += released;
        report
    }

    /// Applies classification results that arrived since the last call to every target
    /// sharing the reference. A lagged receiver re-evaluates all targets.
    pub fn apply_updates(&mut self, doc: &mut Document) -> ScanReport {
        let mut affected = BTreeSet::new();
        let mut lagged = false;
        loop {
            match self.updates.try_recv() {
                Ok(update) => {
                    if let Some(nodes) = self.by_reference.get(&update.reference) {
                        affected.extend(nodes.iter().copied());
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(target: "veil.blur", skipped, "blur.updates.lagged");
                    lagged = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if lagged {
            affected = self.targets.keys().copied().collect();
        }

        let mut report = ScanReport::default();
        for node in affected {
            if doc.is_connected(node) {
                self.evaluate(doc, node, &mut report);
            } else {
                self.drop_target(doc, node);
                report.released += 1;
            }
        }
        report
    }

    pub fn target(&self, node: NodeId) -> Option<&ObstructionTarget> {
        self.targets.get(&node)
    }

    pub fn targets(&self) -> impl Iterator<Item = &ObstructionTarget> {
        self.targets.values()
    }

    pub fn targets_for(&self, reference: &MediaReference) -> Vec<NodeId> {
        self.by_reference
            .get(reference)
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Elements currently carrying a marker this controller applied.
    pub fn marked_elements(&self) -> Vec<NodeId> {
        self.holders.keys().copied().collect()
    }

    fn evaluate(&mut self, doc: &mut Document, node: NodeId, report: &mut ScanReport) {
        let reference = self.resolver.resolve_reference(doc, node);
        let (state, obstruct) = match &reference {
            Some(reference) => {
                let state = TargetState::from_verdict(self.cache.ensure_classified(reference));
                (state, state.is_obstructed())
            }
            None => (TargetState::Unknown, self.markers.obstruct_unresolved),
        };
        let obstruct = obstruct || self.inherits_link_marker(doc, node);

        let desired = if obstruct {
            self.marker_holders(doc, node)
        } else {
            BTreeSet::new()
        };
        self.apply_marks(doc, node, desired);

        report.scanned += 1;
        if reference.is_none() {
            report.unresolved += 1;
        }
        if obstruct {
            report.obstructed += 1;
        } else {
            report.safe += 1;
        }
        self.track(node, reference, state);
    }

    /// An image directly inside a link the render pipeline already marked.
    fn inherits_link_marker(&self, doc: &Document, node: NodeId) -> bool {
        doc.parent(node)
            .filter(|parent| doc.is_tag(*parent, "a"))
            .map(|parent| self.markers.is_marked(doc, parent) && !self.holders.contains_key(&parent))
            .unwrap_or(false)
    }

    fn marker_holders(&self, doc: &Document, node: NodeId) -> BTreeSet<NodeId> {
        let mut holders = BTreeSet::from([node]);
        holders.extend(doc.closest_tag(node, "a"));
        holders.extend(doc.closest_tag(node, "td"));
        // The media node may carry a wrapper class itself (`img.mw-file-element`).
        holders.extend(doc.parent(node).and_then(|parent| {
            doc.closest(parent, |doc, candidate| self.markers.is_wrapper(doc, candidate))
        }));
        holders
    }

    fn apply_marks(&mut self, doc: &mut Document, media: NodeId, desired: BTreeSet<NodeId>) {
        let current = self.marked_for.remove(&media).unwrap_or_default();
        for element in current.difference(&desired) {
            self.release(doc, *element, media);
        }

        let mut owned = BTreeSet::new();
        for element in desired {
            if let Some(contributors) = self.holders.get_mut(&element) {
                contributors.insert(media);
                owned.insert(element);
            } else if !self.markers.is_marked(doc, element) {
                doc.add_class(element, &self.markers.blur_class);
                self.holders.insert(element, BTreeSet::from([media]));
                owned.insert(element);
            }
        }
        if !owned.is_empty() {
            self.marked_for.insert(media, owned);
        }
    }

    fn release(&mut self, doc: &mut Document, element: NodeId, media: NodeId) {
        if let Some(contributors) = self.holders.get_mut(&element) {
            contributors.remove(&media);
            if contributors.is_empty() {
                self.holders.remove(&element);
                doc.remove_class(element, &self.markers.blur_class);
            }
        }
    }

    fn track(&mut self, node: NodeId, reference: Option<MediaReference>, state: TargetState) {
        let previous = self.targets.insert(
            node,
            ObstructionTarget {
                node,
                reference: reference.clone(),
                state,
            },
        );
        if let Some(old) = previous.and_then(|target| target.reference) {
            if Some(&old) != reference.as_ref() {
                self.unindex(&old, node);
            }
        }
        if let Some(reference) = reference {
            self.by_reference.entry(reference).or_default().insert(node);
        }
    }

    fn unindex(&mut self, reference: &MediaReference, node: NodeId) {
        if let Some(nodes) = self.by_reference.get_mut(reference) {
            nodes.remove(&node);
            if nodes.is_empty() {
                self.by_reference.remove(reference);
            }
        }
    }

    fn drop_target(&mut self, doc: &mut Document, node: NodeId) {
        if let Some(target) = self.targets.remove(&node) {
            if let Some(reference) = &target.reference {
                self.unindex(reference, node);
            }
        }
        for element in self.marked_for.remove(&node).unwrap_or_default() {
            self.release(doc, element, node);
        }
    }

    fn release_detached(&mut self, doc: &mut Document, root: NodeId) -> usize {
        let gone: Vec<NodeId> = doc
            .descendants(root)
            .into_iter()
            .filter(|node| self.targets.contains_key(node) && !doc.is_connected(*node))
            .collect();
        for node in &gone {
            self.drop_target(doc, *node);
        }
        gone.len()
    }

    fn collect_garbage(&mut self, doc: &mut Document) -> usize {
        let gone: Vec<NodeId> = self
            .targets
            .keys()
            .copied()
            .filter(|node| !doc.is_connected(*node))
            .collect();
        for node in &gone {
            self.drop_target(doc, *node);
        }
        gone.len()
    }
}
