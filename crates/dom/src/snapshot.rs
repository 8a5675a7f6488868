use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::{Document, NodeId};
use crate::errors::DomError;

/// Serialized element subtree. `class` travels as a regular attribute.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(
        default,
        rename = "currentSrc",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_src: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

/// Serialized page: the `<body>` subtree plus the current location.
///
/// Loading assigns node ids in document order: `<html>` is `#0`, `<body>` is `#1`, and
/// body descendants follow depth first.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub body: NodeSnapshot,
}

impl DocumentSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, DomError> {
        serde_json::from_str(raw).map_err(|err| DomError::Snapshot(err.to_string()))
    }

    pub fn into_document(self) -> Result<Document, DomError> {
        if !self.body.tag.eq_ignore_ascii_case("body") {
            return Err(DomError::Snapshot(format!(
                "expected <body> at the top, found <{}>",
                self.body.tag
            )));
        }
        let mut doc = Document::new();
        let body = doc.body();
        apply_attributes(&mut doc, body, &self.body)?;
        for child in &self.body.children {
            build(&mut doc, body, child)?;
        }
        if let Some(location) = self.location {
            doc.set_location(location);
        }
        doc.discard_mutations();
        Ok(doc)
    }

    pub fn capture(doc: &Document) -> Self {
        Self {
            location: doc.location().map(str::to_string),
            body: capture_node(doc, doc.body()),
        }
    }
}

fn build(doc: &mut Document, parent: NodeId, snapshot: &NodeSnapshot) -> Result<(), DomError> {
    if snapshot.tag.trim().is_empty() {
        return Err(DomError::Snapshot("element without tag".into()));
    }
    let node = doc.create_element(snapshot.tag.trim());
    apply_attributes(doc, node, snapshot)?;
    doc.append_child(parent, node)?;
    for child in &snapshot.children {
        build(doc, node, child)?;
    }
    Ok(())
}

fn apply_attributes(doc: &mut Document, node: NodeId, snapshot: &NodeSnapshot) -> Result<(), DomError> {
    for (name, value) in &snapshot.attributes {
        doc.set_attribute(node, name, value)?;
    }
    if snapshot.current_src.is_some() {
        doc.set_current_src(node, snapshot.current_src.clone());
    }
    Ok(())
}

fn capture_node(doc: &Document, node: NodeId) -> NodeSnapshot {
    let mut attributes: BTreeMap<String, String> = doc
        .attributes(node)
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    if !doc.classes(node).is_empty() {
        attributes.insert("class".into(), doc.classes(node).join(" "));
    }
    NodeSnapshot {
        tag: doc.tag(node).unwrap_or_default().to_string(),
        attributes,
        current_src: doc.loaded_src(node).map(str::to_string),
        children: doc
            .children(node)
            .iter()
            .map(|child| capture_node(doc, *child))
            .collect(),
    }
}
