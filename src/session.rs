//! One page view, from first scan to teardown.
//!
//! [`PageSession`] owns the document and wires the gate, cache, blur controller and
//! overlay synchronizer together. Hosts either drive it step by step through
//! [`PageSession::handle`] and [`PageSession::frame`], or hand it to
//! [`PageSession::run`] and talk to it over a channel.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::select;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use veil_blur::{BlurStateController, ScanReport};
use veil_classification::{
    CacheStats, ClassificationCache, ClassificationPort, ClassificationUpdate,
};
use veil_core_types::{PageViewId, PreferenceState};
use veil_dom::{Document, NodeId};
use veil_overlay::{OverlayState, OverlaySynchronizer};
use veil_resolver::MediaIdentityResolver;

use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::gate::PreferenceGate;
use crate::metrics::{self, MetricSnapshot};
use crate::signal::RenderSignal;

/// Upper bound on settle rounds; an overlay whose subject never resolves keeps asking
/// for frames forever.
const SETTLE_ROUNDS: usize = 64;

/// Host-side change to the document, applied by the session that owns it.
pub type DocumentEdit = Box<dyn FnOnce(&mut Document) + Send>;

pub enum PageEvent {
    /// Incremental change; the session scans what the edit added.
    Mutations(DocumentEdit),
    /// Wholesale swap of a content region rooted at the returned node.
    ContentReplaced(Box<dyn FnOnce(&mut Document) -> NodeId + Send>),
    PointerDown(NodeId),
    HashChanged(String),
    /// The host re-rendered content in place and its markers should be re-read.
    ContentRefreshed,
    Shutdown,
}

impl fmt::Debug for PageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageEvent::Mutations(_) => f.write_str("Mutations"),
            PageEvent::ContentReplaced(_) => f.write_str("ContentReplaced"),
            PageEvent::PointerDown(node) => f.debug_tuple("PointerDown").field(node).finish(),
            PageEvent::HashChanged(hash) => f.debug_tuple("HashChanged").field(hash).finish(),
            PageEvent::ContentRefreshed => f.write_str("ContentRefreshed"),
            PageEvent::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Serializable view of a session, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub page_view: String,
    pub unblurred: bool,
    /// Every node carrying the obstruction marker, whoever applied it.
    pub marked: Vec<NodeId>,
    pub preblur: bool,
    pub overlay: OverlayState,
    pub cache: CacheStats,
    /// Process-wide counters; includes every session run in this process so far.
    pub metrics: MetricSnapshot,
}

struct Engine {
    cache: Arc<ClassificationCache>,
    controller: BlurStateController,
    overlay: OverlaySynchronizer,
    updates: broadcast::Receiver<ClassificationUpdate>,
    frame_interval: Duration,
}

impl Engine {
    fn drain_updates(&mut self) {
        loop {
            match self.updates.try_recv() {
                Ok(update) => metrics::record_verdict(update.verdict),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(target: "veil.session", skipped, "session.updates.lagged");
                }
                Err(_) => break,
            }
        }
    }
}

pub struct PageSession {
    id: PageViewId,
    document: Document,
    gate: PreferenceGate,
    engine: Option<Engine>,
}

impl PageSession {
    /// Runs the page-load sequence. When the gate opens the document only receives the
    /// root unblur marker and no engine component is built.
    pub fn start(
        mut document: Document,
        signal: &RenderSignal,
        preference: PreferenceState,
        port: Arc<dyn ClassificationPort>,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        let id = PageViewId::new();
        let gate = PreferenceGate::new(preference);
        if gate.apply(&mut document, &config.markers) {
            document.discard_mutations();
            return Ok(Self {
                id,
                document,
                gate,
                engine: None,
            });
        }

        let resolver = Arc::new(MediaIdentityResolver::new(&config.resolver)?);
        let cache = Arc::new(ClassificationCache::new(port, &config.classification));
        let body_flagged = document.has_class(document.body(), &config.markers.filepage_class);
        cache.seed(
            signal.sensitive_references(body_flagged),
            signal.cleared_references(),
        );
        let updates = cache.subscribe();

        let mut controller =
            BlurStateController::new(resolver.clone(), cache.clone(), config.markers.clone());
        let mut overlay = OverlaySynchronizer::new(
            resolver,
            cache.clone(),
            config.markers.clone(),
            config.overlay.clone(),
        );

        let harvested = overlay.harvest_markers(&document, &BTreeSet::new());
        let body = document.body();
        let started = Instant::now();
        let report = controller.scan(&mut document, body);
        metrics::record_scan(&report, started.elapsed());
        document.discard_mutations();
        overlay.schedule();

        info!(
            target: "veil.session",
            page_view = %id,
            harvested,
            scanned = report.scanned,
            obstructed = report.obstructed,
            "session.started"
        );

        Ok(Self {
            id,
            document,
            gate,
            engine: Some(Engine {
                cache,
                controller,
                overlay,
                updates,
                frame_interval: Duration::from_millis(config.overlay.frame_interval_ms.max(1)),
            }),
        })
    }

    pub fn id(&self) -> &PageViewId {
        &self.id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn is_unblurred(&self) -> bool {
        self.gate.may_unblur()
    }

    /// Applies one host event. Returns `false` once the session should stop.
    pub fn handle(&mut self, event: PageEvent) -> bool {
        debug!(target: "veil.session", page_view = %self.id, ?event, "session.event");
        let document = &mut self.document;
        let Some(engine) = self.engine.as_mut() else {
            // Edits still land so the host's document stays consistent.
            match event {
                PageEvent::Mutations(edit) => {
                    edit(document);
                    document.discard_mutations();
                }
                PageEvent::ContentReplaced(edit) => {
                    edit(document);
                    document.discard_mutations();
                }
                PageEvent::HashChanged(location) => document.set_location(location),
                PageEvent::Shutdown => return false,
                PageEvent::PointerDown(_) | PageEvent::ContentRefreshed => {}
            }
            return true;
        };

        match event {
            PageEvent::Mutations(edit) => {
                edit(document);
                if let Some(batch) = document.take_mutations() {
                    let started = Instant::now();
                    let report = engine.controller.on_mutations(document, &batch);
                    metrics::record_scan(&report, started.elapsed());
                }
                engine.overlay.schedule();
            }
            PageEvent::ContentReplaced(edit) => {
                let root = edit(document);
                document.discard_mutations();
                let started = Instant::now();
                let report = engine.controller.content_replaced(document, root);
                metrics::record_scan(&report, started.elapsed());
                engine.overlay.schedule();
            }
            PageEvent::PointerDown(target) => {
                if engine.overlay.on_pointer_down(document, target) {
                    metrics::record_overlay_intent();
                }
            }
            PageEvent::HashChanged(location) => {
                document.set_location(location);
                engine.overlay.schedule();
            }
            PageEvent::ContentRefreshed => {
                let own: BTreeSet<NodeId> =
                    engine.controller.marked_elements().into_iter().collect();
                engine.overlay.harvest_markers(document, &own);
                let body = document.body();
                let started = Instant::now();
                let report = engine.controller.scan(document, body);
                metrics::record_scan(&report, started.elapsed());
                document.discard_mutations();
                engine.overlay.schedule();
            }
            PageEvent::Shutdown => return false,
        }
        true
    }

    /// One paint cycle: applies verdicts that arrived since the last frame, then lets
    /// the overlay run its coalesced update.
    pub fn frame(&mut self) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        engine.drain_updates();
        let applied = engine.controller.apply_updates(&mut self.document);
        let updated = engine.overlay.on_frame(&mut self.document);
        if updated {
            metrics::record_overlay_update();
        }
        updated || applied != ScanReport::default()
    }

    /// Waits for outstanding lookups and runs frames until nothing changes or the round
    /// limit is hit.
    pub async fn settle(&mut self) {
        for _ in 0..SETTLE_ROUNDS {
            let Some(engine) = self.engine.as_ref() else {
                return;
            };
            let cache = engine.cache.clone();
            cache.settle().await;
            let changed = self.frame();
            let idle = self.engine.as_ref().map_or(true, |engine| {
                engine.cache.in_flight() == 0 && !engine.overlay.is_update_pending()
            });
            if idle && !changed {
                return;
            }
        }
        debug!(target: "veil.session", page_view = %self.id, "session.settle.gave_up");
    }

    /// Event loop for a live page. Returns the session once `shutdown` fires, a
    /// [`PageEvent::Shutdown`] arrives or every sender is gone.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<PageEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        let (mut wake, interval) = match self.engine.as_ref() {
            Some(engine) => (Some(engine.cache.subscribe()), engine.frame_interval),
            None => (None, Duration::from_millis(16)),
        };
        let mut frames = tokio::time::interval(interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(target: "veil.session", page_view = %self.id, "session.loop.started");

        loop {
            select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        if !self.handle(event) {
                            break;
                        }
                    }
                    None => break,
                },
                update = next_update(&mut wake) => match update {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        if let Some(engine) = self.engine.as_mut() {
                            engine.controller.apply_updates(&mut self.document);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!(target: "veil.session", page_view = %self.id, "session.updates.closed");
                        wake = None;
                    }
                },
                _ = frames.tick(), if self.engine.is_some() => {
                    self.frame();
                }
            }
        }

        info!(target: "veil.session", page_view = %self.id, "session.stopped");
        self
    }

    pub fn report(&self) -> SessionReport {
        let (marked, preblur, overlay, cache) = match self.engine.as_ref() {
            Some(engine) => {
                let markers = engine.controller.markers();
                let marked = self
                    .document
                    .find_all(self.document.root(), |doc, node| markers.is_marked(doc, node));
                let preblur = self
                    .document
                    .has_class(self.document.body(), &markers.preblur_class);
                (marked, preblur, engine.overlay.state(), engine.cache.stats())
            }
            None => (Vec::new(), false, OverlayState::default(), CacheStats::default()),
        };
        SessionReport {
            page_view: self.id.to_string(),
            unblurred: self.engine.is_none(),
            marked,
            preblur,
            overlay,
            cache,
            metrics: metrics::snapshot(),
        }
    }
}

async fn next_update(
    wake: &mut Option<broadcast::Receiver<ClassificationUpdate>>,
) -> Result<ClassificationUpdate, broadcast::error::RecvError> {
    match wake {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
