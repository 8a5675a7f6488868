use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use veil_core_types::{ClassificationSource, MediaReference};

use crate::errors::ClassificationError;

/// Answer of the classification backend for one reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Classification {
    pub is_sensitive: bool,
    pub source: ClassificationSource,
}

impl Classification {
    pub fn sensitive(source: ClassificationSource) -> Self {
        Self {
            is_sensitive: true,
            source,
        }
    }

    pub fn safe() -> Self {
        Self {
            is_sensitive: false,
            source: ClassificationSource::Unknown,
        }
    }
}

/// Remote lookup of a media item's sensitivity (description marker or category
/// membership). Implementations are called at most once per reference per page view.
#[async_trait]
pub trait ClassificationPort: Send + Sync {
    async fn classify(
        &self,
        reference: &MediaReference,
    ) -> Result<Classification, ClassificationError>;
}

/// In-memory backend with fixed answers. References it does not know fail with
/// [`ClassificationError::NotFound`].
#[derive(Debug, Default)]
pub struct StaticClassifier {
    verdicts: HashMap<MediaReference, Classification>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a classifier from `{"File:Name.png": true, ...}` style maps.
    pub fn from_map<I, K>(entries: I) -> Result<Self, ClassificationError>
    where
        I: IntoIterator<Item = (K, bool)>,
        K: AsRef<str>,
    {
        let mut classifier = Self::new();
        for (raw, is_sensitive) in entries {
            let reference = MediaReference::parse(raw.as_ref())?;
            classifier = classifier.with(reference, is_sensitive);
        }
        Ok(classifier)
    }

    pub fn with(mut self, reference: MediaReference, is_sensitive: bool) -> Self {
        let classification = if is_sensitive {
            Classification::sensitive(ClassificationSource::Category)
        } else {
            Classification::safe()
        };
        self.verdicts.insert(reference, classification);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassificationPort for StaticClassifier {
    async fn classify(
        &self,
        reference: &MediaReference,
    ) -> Result<Classification, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.verdicts
            .get(reference)
            .copied()
            .ok_or_else(|| ClassificationError::NotFound(reference.title()))
    }
}
