use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};
use veil_core_types::{ClassificationRecord, ClassificationSource, MediaReference};

use crate::config::ClassificationConfig;
use crate::errors::ClassificationError;
use crate::port::ClassificationPort;

/// What the cache currently knows about a reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Sensitive,
    Safe,
    /// A remote lookup is in flight.
    Pending,
    /// The remote lookup failed; not retried for this page view.
    Failed,
    /// Never seen and never requested.
    Unknown,
}

impl Verdict {
    /// Only a positive safe verdict lifts obstruction.
    pub fn is_obstructed(self) -> bool {
        !matches!(self, Verdict::Safe)
    }

    pub fn is_settled(self) -> bool {
        matches!(self, Verdict::Sensitive | Verdict::Safe | Verdict::Failed)
    }
}

/// Broadcast when a reference's verdict changes after the initial seed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassificationUpdate {
    pub reference: MediaReference,
    pub verdict: Verdict,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub sensitive: usize,
    pub safe: usize,
    pub pending: usize,
    pub failed: usize,
    pub remote_requests: u64,
    pub remote_failures: u64,
}

#[derive(Clone, Debug)]
enum CacheEntry {
    Resolved(ClassificationRecord),
    Pending,
    Failed,
}

impl CacheEntry {
    fn verdict(&self) -> Verdict {
        match self {
            CacheEntry::Resolved(record) if record.is_sensitive => Verdict::Sensitive,
            CacheEntry::Resolved(_) => Verdict::Safe,
            CacheEntry::Pending => Verdict::Pending,
            CacheEntry::Failed => Verdict::Failed,
        }
    }
}

#[derive(Default)]
struct Counters {
    remote_requests: AtomicU64,
    remote_failures: AtomicU64,
}

/// Per-page-view map from reference to classification.
///
/// Lookups are synchronous and total. Remote requests run on tracked tokio tasks and
/// are deduplicated through the map's entry API, so a reference is requested at most
/// once however many nodes share it.
pub struct ClassificationCache {
    entries: Arc<DashMap<MediaReference, CacheEntry>>,
    port: Arc<dyn ClassificationPort>,
    updates: broadcast::Sender<ClassificationUpdate>,
    tracker: TaskTracker,
    counters: Arc<Counters>,
}

impl ClassificationCache {
    pub fn new(port: Arc<dyn ClassificationPort>, config: &ClassificationConfig) -> Self {
        let (updates, _) = broadcast::channel(config.update_capacity.max(1));
        Self {
            entries: Arc::new(DashMap::new()),
            port,
            updates,
            tracker: TaskTracker::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Seeds the verdicts the render pipeline already computed. Sensitive entries win
    /// over cleared ones naming the same reference.
    pub fn seed<S, C>(&self, sensitive: S, cleared: C)
    where
        S: IntoIterator<Item = MediaReference>,
        C: IntoIterator<Item = MediaReference>,
    {
        let mut seeded = 0usize;
        for reference in sensitive {
            let record = ClassificationRecord::new(reference.clone(), true, ClassificationSource::Unknown);
            self.entries.insert(reference, CacheEntry::Resolved(record));
            seeded += 1;
        }
        for reference in cleared {
            if let Entry::Vacant(vacant) = self.entries.entry(reference.clone()) {
                let record = ClassificationRecord::new(reference, false, ClassificationSource::Unknown);
                vacant.insert(CacheEntry::Resolved(record));
                seeded += 1;
            }
        }
        debug!(target: "veil.classification", seeded, "classification.cache.seeded");
    }

    pub fn lookup(&self, reference: &MediaReference) -> Verdict {
        self.entries
            .get(reference)
            .map(|entry| entry.verdict())
            .unwrap_or(Verdict::Unknown)
    }

    pub fn is_sensitive(&self, reference: &MediaReference) -> bool {
        self.lookup(reference) == Verdict::Sensitive
    }

    pub fn record(&self, reference: &MediaReference) -> Option<ClassificationRecord> {
        self.entries.get(reference).and_then(|entry| match entry.value() {
            CacheEntry::Resolved(record) => Some(record.clone()),
            CacheEntry::Pending | CacheEntry::Failed => None,
        })
    }

    /// Records a reference found carrying a server-applied marker. Sensitivity always
    /// wins: a pending, failed or safe entry is upgraded and subscribers are notified.
    pub fn mark_sensitive(&self, reference: &MediaReference, source: ClassificationSource) {
        let previous = self.entries.insert(
            reference.clone(),
            CacheEntry::Resolved(ClassificationRecord::new(reference.clone(), true, source)),
        );
        let changed = previous.map(|entry| entry.verdict()) != Some(Verdict::Sensitive);
        if changed {
            debug!(
                target: "veil.classification",
                reference = %reference,
                "classification.cache.marked"
            );
            self.publish(reference.clone(), Verdict::Sensitive);
        }
    }

    /// Returns the current verdict and, for a reference never seen before, starts the
    /// single remote lookup for it.
    pub fn ensure_classified(&self, reference: &MediaReference) -> Verdict {
        match self.entries.entry(reference.clone()) {
            Entry::Occupied(occupied) => return occupied.get().verdict(),
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::Pending);
            }
        }
        self.spawn_lookup(reference.clone())
    }

    fn spawn_lookup(&self, reference: MediaReference) -> Verdict {
        if tokio::runtime::Handle::try_current().is_err() {
            let err = ClassificationError::NoRuntime;
            warn!(
                target: "veil.classification",
                reference = %reference,
                error = %err,
                "classification.lookup.failed"
            );
            self.counters.remote_failures.fetch_add(1, Ordering::Relaxed);
            self.entries.insert(reference, CacheEntry::Failed);
            return Verdict::Failed;
        }

        self.counters.remote_requests.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "veil.classification",
            reference = %reference,
            "classification.lookup.started"
        );

        let entries = Arc::clone(&self.entries);
        let port = Arc::clone(&self.port);
        let updates = self.updates.clone();
        let counters = Arc::clone(&self.counters);
        self.tracker.spawn(async move {
            let outcome = port.classify(&reference).await;
            let (entry, verdict) = match outcome {
                Ok(classification) => {
                    let record = ClassificationRecord::new(
                        reference.clone(),
                        classification.is_sensitive,
                        classification.source,
                    );
                    let entry = CacheEntry::Resolved(record);
                    let verdict = entry.verdict();
                    (entry, verdict)
                }
                Err(err) => {
                    counters.remote_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target: "veil.classification",
                        reference = %reference,
                        error = %err,
                        "classification.lookup.failed"
                    );
                    (CacheEntry::Failed, Verdict::Failed)
                }
            };

            // A marker may have settled the reference while the lookup was in flight.
            let applied = match entries.entry(reference.clone()) {
                Entry::Occupied(mut occupied) if matches!(occupied.get(), CacheEntry::Pending) => {
                    occupied.insert(entry);
                    true
                }
                Entry::Occupied(_) => false,
                Entry::Vacant(vacant) => {
                    vacant.insert(entry);
                    true
                }
            };
            if applied {
                debug!(
                    target: "veil.classification",
                    reference = %reference,
                    verdict = ?verdict,
                    "classification.lookup.completed"
                );
                let _ = updates.send(ClassificationUpdate { reference, verdict });
            }
        });
        Verdict::Pending
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClassificationUpdate> {
        self.updates.subscribe()
    }

    /// Waits until every lookup started so far has completed.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            remote_requests: self.counters.remote_requests.load(Ordering::Relaxed),
            remote_failures: self.counters.remote_failures.load(Ordering::Relaxed),
            ..CacheStats::default()
        };
        for entry in self.entries.iter() {
            stats.entries += 1;
            match entry.value().verdict() {
                Verdict::Sensitive => stats.sensitive += 1,
                Verdict::Safe => stats.safe += 1,
                Verdict::Pending => stats.pending += 1,
                Verdict::Failed => stats.failed += 1,
                Verdict::Unknown => {}
            }
        }
        stats
    }

    fn publish(&self, reference: MediaReference, verdict: Verdict) {
        // No subscribers is fine; nothing is tracking targets yet.
        let _ = self.updates.send(ClassificationUpdate { reference, verdict });
    }
}
