//! Every raw form a page uses for one file must land on the same reference.

use pretty_assertions::assert_eq;
use veil_dom::{Document, NodeId};
use veil_resolver::{MediaIdentityResolver, MediaReference, ResolverConfig, Strategy};

fn resolver() -> MediaIdentityResolver {
    MediaIdentityResolver::new(&ResolverConfig::default()).expect("default patterns compile")
}

fn image(doc: &mut Document, attrs: &[(&str, &str)]) -> NodeId {
    let img = doc.element("img", attrs);
    let body = doc.body();
    doc.append_child(body, img).unwrap();
    img
}

#[test]
fn raw_forms_of_one_file_are_equal() {
    let resolver = resolver();
    let expected = MediaReference::parse("File:Foo bar.png").unwrap();
    let forms = [
        "File:Foo_bar.png",
        "file:Foo bar.png",
        "Image:Foo%20bar.png",
        "/wiki/File:Foo_bar.png",
        "https://wiki.example/wiki/File:Foo%20bar.png",
        "/w/images/6/60/Foo_bar.png",
        "//upload.example/images/thumb/6/60/Foo_bar.png/220px-Foo_bar.png",
        "/w/index.php?title=File:Foo_bar.png&action=edit",
        "/wiki/Special:FilePath/Foo_bar.png",
        "foo_bar.png",
    ];
    for form in forms {
        assert_eq!(resolver.resolve_url(form), Some(expected.clone()), "form {form}");
    }
}

#[test]
fn thumbnail_and_direct_asset_match() {
    let resolver = resolver();
    let mut doc = Document::new();
    let thumb = image(
        &mut doc,
        &[("src", "/images/thumb/a/ab/Dog.jpg/320px-Dog.jpg")],
    );
    let direct = image(&mut doc, &[("src", "/images/a/ab/Dog.jpg")]);

    let thumb = resolver.resolve(&doc, thumb).unwrap();
    let direct = resolver.resolve(&doc, direct).unwrap();
    assert_eq!(thumb.reference, direct.reference);
    assert_eq!(thumb.reference.title(), "File:Dog.jpg");
    assert_eq!(thumb.strategy, Strategy::ImageUrl);

    assert_eq!(
        resolver.resolve_url("/assets/thumb/a/ab/Dog.jpg/320px-Dog.jpg"),
        resolver.resolve_url("/assets/a/ab/Dog.jpg")
    );
}

#[test]
fn first_successful_strategy_is_authoritative() {
    let resolver = resolver();
    let mut doc = Document::new();
    // Identity attribute and URL disagree; the higher-priority strategy wins and the
    // URL is never consulted.
    let img = image(
        &mut doc,
        &[
            ("data-file-name", "Declared.png"),
            ("src", "/images/a/ab/Served.png"),
        ],
    );
    let resolution = resolver.resolve(&doc, img).unwrap();
    assert_eq!(resolution.reference.title(), "File:Declared.png");
    assert_eq!(resolution.strategy, Strategy::IdentityAttributes);
}

#[test]
fn malformed_candidates_fall_through() {
    let resolver = resolver();
    let mut doc = Document::new();
    let img = image(
        &mut doc,
        &[
            ("data-file-name", "bad|name.png"),
            ("src", "/images/a/ab/Fallback.png"),
        ],
    );
    assert_eq!(
        resolver.resolve_reference(&doc, img).map(|r| r.title()).as_deref(),
        Some("File:Fallback.png")
    );
}

#[test]
fn hash_routes_resolve_like_urls() {
    let resolver = resolver();
    assert_eq!(
        resolver.resolve_hash("/media/File:Foo_bar.png"),
        resolver.resolve_url("/wiki/File:Foo%20bar.png")
    );
    assert_eq!(resolver.resolve_hash(""), None);
}

#[test]
fn custom_asset_roots_are_honoured() {
    let config = ResolverConfig {
        asset_roots: vec!["uploads".into()],
        ..ResolverConfig::default()
    };
    let resolver = MediaIdentityResolver::new(&config).unwrap();
    assert_eq!(
        resolver.resolve_url("/uploads/3/3c/Sample.gif").map(|r| r.title()).as_deref(),
        Some("File:Sample.gif")
    );
    assert_eq!(resolver.resolve_url("/images/3/3c/Sample.gif"), None);
}
