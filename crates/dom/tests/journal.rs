use pretty_assertions::assert_eq;
use veil_dom::{Document, DocumentSnapshot, MutationRecord, NodeId};

#[test]
fn detached_subtrees_are_journaled_once_when_attached() {
    let mut doc = Document::new();
    let gallery = doc.element("ul", &[("class", "gallery")]);
    for name in ["A.png", "B.png", "C.png"] {
        let item = doc.element("li", &[("class", "gallerybox")]);
        let img = doc.element("img", &[("data-file-name", name)]);
        doc.append_child(item, img).unwrap();
        doc.append_child(gallery, item).unwrap();
    }
    assert!(doc.take_mutations().is_none(), "building off-document is silent");

    let body = doc.body();
    doc.append_child(body, gallery).unwrap();
    let batch = doc.take_mutations().unwrap();
    assert_eq!(batch.added(), vec![gallery]);
    assert!(batch.removed().is_empty());
}

#[test]
fn marker_changes_never_feed_the_journal() {
    let mut doc = Document::new();
    let body = doc.body();
    let img = doc.element("img", &[]);
    doc.append_child(body, img).unwrap();
    doc.discard_mutations();

    doc.add_class(img, "nsfw-blur");
    doc.set_attribute(img, "src", "/images/a/ab/Late.png").unwrap();
    doc.remove_class(img, "nsfw-blur");
    assert!(doc.take_mutations().is_none());
}

#[test]
fn moves_record_removal_then_insertion() {
    let mut doc = Document::new();
    let body = doc.body();
    let left = doc.element("div", &[]);
    let right = doc.element("div", &[]);
    let img = doc.element("img", &[]);
    for node in [left, right] {
        doc.append_child(body, node).unwrap();
    }
    doc.append_child(left, img).unwrap();
    doc.discard_mutations();

    doc.append_child(right, img).unwrap();
    let batch = doc.take_mutations().unwrap();
    assert_eq!(
        batch.records,
        vec![
            MutationRecord::Removed {
                parent: left,
                node: img
            },
            MutationRecord::Added {
                parent: right,
                node: img
            },
        ]
    );
}

#[test]
fn snapshots_carry_applied_markers() {
    let mut doc = DocumentSnapshot::from_json(
        r#"{"location": "https://wiki.example/wiki/Cats#/media/File:Cat.png",
            "body": {"tag": "body", "children": [
                {"tag": "a", "attributes": {"href": "/wiki/File:Cat.png"}, "children": [
                    {"tag": "img", "attributes": {"src": "/images/c/c4/Cat.png"}}
                ]}
            ]}}"#,
    )
    .unwrap()
    .into_document()
    .unwrap();
    assert!(doc.take_mutations().is_none());
    assert_eq!(doc.location_hash(), Some("/media/File:Cat.png"));

    let img = NodeId(3);
    doc.add_class(img, "nsfw-blur");
    doc.set_current_src(img, Some("/images/thumb/c/c4/Cat.png/440px-Cat.png".into()));
    let captured = DocumentSnapshot::capture(&doc);
    let link = &captured.body.children[0];
    assert_eq!(link.children[0].attributes.get("class").map(String::as_str), Some("nsfw-blur"));
    assert_eq!(
        link.children[0].current_src.as_deref(),
        Some("/images/thumb/c/c4/Cat.png/440px-Cat.png")
    );
    assert_eq!(link.current_src, None, "src fallback is not exported");

    let reloaded = captured.into_document().unwrap();
    assert!(reloaded.has_class(img, "nsfw-blur"));
    assert_eq!(
        reloaded.current_src(img),
        Some("/images/thumb/c/c4/Cat.png/440px-Cat.png")
    );
    assert_eq!(reloaded.attribute(img, "src"), Some("/images/c/c4/Cat.png"));
    assert_eq!(reloaded.closest_link(img), Some(NodeId(2)));
}

#[test]
fn snapshot_must_start_at_body() {
    let snapshot = DocumentSnapshot::from_json(r#"{"body": {"tag": "div"}}"#).unwrap();
    assert!(snapshot.into_document().is_err());
}

#[test]
fn large_batches_keep_first_occurrence_order() {
    let mut doc = Document::new();
    let body = doc.body();
    let items: Vec<NodeId> = (0..2000).map(|_| doc.element("li", &[])).collect();
    for item in &items {
        doc.append_child(body, *item).unwrap();
    }
    // Re-inserting moves each node again; it must still be reported once.
    for item in items.iter().rev() {
        doc.append_child(body, *item).unwrap();
    }
    let batch = doc.take_mutations().unwrap();
    assert_eq!(batch.len(), 6000);
    assert_eq!(batch.added(), items);
    assert_eq!(batch.removed(), items.iter().rev().copied().collect::<Vec<_>>());
}
