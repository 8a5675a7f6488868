use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use veil_classification::{
    ClassificationCache, ClassificationConfig, ClassificationUpdate, StaticClassifier, Verdict,
};
use veil_core_types::{ClassificationSource, MediaReference};

fn reference(raw: &str) -> MediaReference {
    MediaReference::parse(raw).unwrap()
}

fn setup(classifier: StaticClassifier) -> (Arc<StaticClassifier>, ClassificationCache) {
    let classifier = Arc::new(classifier);
    let cache = ClassificationCache::new(classifier.clone(), &ClassificationConfig::default());
    (classifier, cache)
}

#[tokio::test]
async fn one_request_for_many_nodes_sharing_a_reference() {
    let (classifier, cache) = setup(
        StaticClassifier::new()
            .with(reference("Shared.png"), true)
            .with_latency(Duration::from_millis(5)),
    );
    let mut updates = cache.subscribe();
    let shared = reference("File:Shared.png");

    for _ in 0..12 {
        assert_eq!(cache.ensure_classified(&shared), Verdict::Pending);
    }
    assert_eq!(cache.lookup(&shared), Verdict::Pending);

    cache.settle().await;
    assert_eq!(classifier.calls(), 1);
    assert_eq!(cache.lookup(&shared), Verdict::Sensitive);
    assert_eq!(
        updates.recv().await.unwrap(),
        ClassificationUpdate {
            reference: shared.clone(),
            verdict: Verdict::Sensitive
        }
    );
    assert_eq!(cache.stats().remote_requests, 1);
}

#[tokio::test]
async fn concurrent_callers_share_the_lookup() {
    let (classifier, cache) = setup(
        StaticClassifier::new()
            .with(reference("Busy.jpg"), false)
            .with_latency(Duration::from_millis(5)),
    );
    let cache = Arc::new(cache);
    let busy = reference("Busy.jpg");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let busy = busy.clone();
        handles.push(tokio::spawn(async move { cache.ensure_classified(&busy) }));
    }
    for handle in handles {
        let verdict = handle.await.unwrap();
        assert!(verdict == Verdict::Pending || verdict == Verdict::Safe);
    }
    cache.settle().await;
    assert_eq!(classifier.calls(), 1);
    assert_eq!(cache.lookup(&busy), Verdict::Safe);
}

#[tokio::test]
async fn failures_are_remembered_and_not_retried() {
    let (classifier, cache) = setup(StaticClassifier::new());
    let mut updates = cache.subscribe();
    let missing = reference("Missing.png");

    assert_eq!(cache.ensure_classified(&missing), Verdict::Pending);
    cache.settle().await;
    assert_eq!(cache.lookup(&missing), Verdict::Failed);
    assert!(cache.lookup(&missing).is_obstructed());
    assert_eq!(updates.recv().await.unwrap().verdict, Verdict::Failed);

    assert_eq!(cache.ensure_classified(&missing), Verdict::Failed);
    cache.settle().await;
    assert_eq!(classifier.calls(), 1);

    let stats = cache.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.remote_failures, 1);
}

#[tokio::test]
async fn seeded_references_never_reach_the_port() {
    let (classifier, cache) = setup(StaticClassifier::new());
    cache.seed([reference("Seen.png")], [reference("Cleared.png")]);

    assert_eq!(cache.ensure_classified(&reference("Seen.png")), Verdict::Sensitive);
    assert_eq!(cache.ensure_classified(&reference("Cleared.png")), Verdict::Safe);
    cache.settle().await;
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn marker_during_lookup_is_not_overwritten() {
    let (_classifier, cache) = setup(
        StaticClassifier::new()
            .with(reference("Racy.png"), false)
            .with_latency(Duration::from_millis(10)),
    );
    let racy = reference("Racy.png");
    assert_eq!(cache.ensure_classified(&racy), Verdict::Pending);
    cache.mark_sensitive(&racy, ClassificationSource::Marker);
    cache.settle().await;
    assert_eq!(cache.lookup(&racy), Verdict::Sensitive);
}
