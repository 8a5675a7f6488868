use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomError;
use crate::mutation::{MutationBatch, MutationRecord};

/// Arena index of an element. Ids stay valid for the life of the document, including
/// after the element is detached.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    current_src: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            classes: Vec::new(),
            current_src: None,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Element tree rooted at `<html>` with a `<body>` child.
///
/// Child-list changes on connected elements are journaled and handed out through
/// [`Document::take_mutations`], mirroring how a mutation observer delivers batches.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<Element>,
    root: NodeId,
    body: NodeId,
    location: Option<String>,
    journal: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut root = Element::new("html");
        let mut body = Element::new("body");
        body.parent = Some(NodeId(0));
        root.children.push(NodeId(1));
        Self {
            nodes: vec![root, body],
            root: NodeId(0),
            body: NodeId(1),
            location: None,
            journal: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Element::new(tag));
        NodeId(self.nodes.len() - 1)
    }

    /// Creates a detached element with attributes; a `class` attribute is split into
    /// class tokens.
    pub fn element(&mut self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let node = self.create_element(tag);
        for (name, value) in attributes {
            self.write_attribute(node, name, value);
        }
        node
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.get(node).map(|element| element.tag.as_str())
    }

    pub fn is_tag(&self, node: NodeId, tag: &str) -> bool {
        self.tag(node)
            .map(|own| own.eq_ignore_ascii_case(tag))
            .unwrap_or(false)
    }

    /// Attribute value. Class tokens are exposed through [`Document::classes`] instead.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.get(node)
            .and_then(|element| element.attributes.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    pub fn attributes(&self, node: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.get(node)
            .into_iter()
            .flat_map(|element| element.attributes.iter())
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.ensure(node)?;
        self.write_attribute(node, name, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Option<String> {
        self.get_mut(node)
            .and_then(|element| element.attributes.remove(&name.to_ascii_lowercase()))
    }

    /// URL the element currently displays: the loaded source when known, else `src`.
    pub fn current_src(&self, node: NodeId) -> Option<&str> {
        let element = self.get(node)?;
        element
            .current_src
            .as_deref()
            .or_else(|| element.attributes.get("src").map(String::as_str))
    }

    /// The loaded source as set by the host, without the `src` fallback.
    pub fn loaded_src(&self, node: NodeId) -> Option<&str> {
        self.get(node)?.current_src.as_deref()
    }

    pub fn set_current_src(&mut self, node: NodeId, src: Option<String>) {
        if let Some(element) = self.get_mut(node) {
            element.current_src = src;
        }
    }

    pub fn classes(&self, node: NodeId) -> &[String] {
        self.get(node)
            .map(|element| element.classes.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).iter().any(|own| own == class)
    }

    /// Adds a class token; returns whether the element changed.
    pub fn add_class(&mut self, node: NodeId, class: &str) -> bool {
        match self.get_mut(node) {
            Some(element) if !element.classes.iter().any(|own| own == class) => {
                element.classes.push(class.to_string());
                true
            }
            _ => false,
        }
    }

    /// Removes a class token; returns whether the element changed.
    pub fn remove_class(&mut self, node: NodeId, class: &str) -> bool {
        match self.get_mut(node) {
            Some(element) => {
                let before = element.classes.len();
                element.classes.retain(|own| own != class);
                before != element.classes.len()
            }
            None => false,
        }
    }

    pub fn toggle_class(&mut self, node: NodeId, class: &str, on: bool) -> bool {
        if on {
            self.add_class(node, class)
        } else {
            self.remove_class(node, class)
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node).and_then(|element| element.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node)
            .map(|element| element.children.as_slice())
            .unwrap_or(&[])
    }

    /// Inclusive ancestor chain, starting at `node`.
    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: self.contains(node).then_some(node),
        }
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.ancestors(node).any(|ancestor| ancestor == self.root)
    }

    /// Nearest inclusive ancestor satisfying `predicate`.
    pub fn closest(&self, node: NodeId, predicate: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        self.ancestors(node).find(|candidate| predicate(self, *candidate))
    }

    pub fn closest_tag(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        self.closest(node, |doc, candidate| doc.is_tag(candidate, tag))
    }

    pub fn closest_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        self.closest(node, |doc, candidate| doc.has_class(candidate, class))
    }

    /// Nearest inclusive `<a>` carrying an `href`.
    pub fn closest_link(&self, node: NodeId) -> Option<NodeId> {
        self.closest(node, |doc, candidate| {
            doc.is_tag(candidate, "a") && doc.attribute(candidate, "href").is_some()
        })
    }

    /// `node` and everything below it, document order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(node) {
            return out;
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    pub fn find_first(&self, root: NodeId, predicate: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|candidate| predicate(self, *candidate))
    }

    pub fn find_all(&self, root: NodeId, predicate: impl Fn(&Self, NodeId) -> bool) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|candidate| predicate(self, *candidate))
            .collect()
    }

    /// Inserts `child` as last child of `parent`, detaching it from its previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.ensure(parent)?;
        self.ensure(child)?;
        if self.ancestors(parent).any(|ancestor| ancestor == child) {
            return Err(DomError::Hierarchy(format!(
                "{child} is an ancestor of {parent}"
            )));
        }
        self.detach(child);
        if let Some(element) = self.get_mut(child) {
            element.parent = Some(parent);
        }
        if let Some(element) = self.get_mut(parent) {
            element.children.push(child);
        }
        if self.is_connected(parent) {
            self.journal.push(MutationRecord::Added {
                parent,
                node: child,
            });
        }
        Ok(())
    }

    /// Detaches `node` from the tree. The node and its subtree stay addressable.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        self.ensure(node)?;
        if node == self.root || node == self.body {
            return Err(DomError::Hierarchy(format!("{node} cannot be removed")));
        }
        self.detach(node);
        Ok(())
    }

    /// Swaps all children of `parent` for `children`.
    pub fn replace_children(&mut self, parent: NodeId, children: &[NodeId]) -> Result<(), DomError> {
        self.ensure(parent)?;
        let previous: Vec<NodeId> = self.children(parent).to_vec();
        for child in previous {
            self.detach(child);
        }
        for child in children {
            self.append_child(parent, *child)?;
        }
        Ok(())
    }

    pub fn set_location(&mut self, url: impl Into<String>) {
        self.location = Some(url.into());
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Fragment of the current location without the leading `#`.
    pub fn location_hash(&self) -> Option<&str> {
        self.location
            .as_deref()
            .and_then(|location| location.split_once('#'))
            .map(|(_, hash)| hash)
            .filter(|hash| !hash.is_empty())
    }

    /// Hands out the journaled structural changes, if any.
    pub fn take_mutations(&mut self) -> Option<MutationBatch> {
        if self.journal.is_empty() {
            return None;
        }
        Some(MutationBatch::new(std::mem::take(&mut self.journal)))
    }

    /// Drops journaled changes without delivering them; models content swaps a host
    /// performs outside observation.
    pub fn discard_mutations(&mut self) {
        self.journal.clear();
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        let was_connected = self.is_connected(parent);
        if let Some(element) = self.get_mut(parent) {
            element.children.retain(|child| *child != node);
        }
        if let Some(element) = self.get_mut(node) {
            element.parent = None;
        }
        if was_connected {
            self.journal.push(MutationRecord::Removed { parent, node });
        }
    }

    fn write_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(element) = self.get_mut(node) else {
            return;
        };
        let name = name.to_ascii_lowercase();
        if name == "class" {
            element.classes.clear();
            for token in value.split_whitespace() {
                if !element.classes.iter().any(|own| own == token) {
                    element.classes.push(token.to_string());
                }
            }
        } else {
            element.attributes.insert(name, value.to_string());
        }
    }

    fn ensure(&self, node: NodeId) -> Result<(), DomError> {
        if self.contains(node) {
            Ok(())
        } else {
            Err(DomError::UnknownNode(node))
        }
    }

    fn get(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0)
    }

    fn get_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(node.0)
    }
}

pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.document.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn journal_records_connected_changes_only() {
        let mut doc = Document::new();
        let figure = doc.element("figure", &[]);
        let img = doc.element("img", &[("src", "/a.png")]);
        doc.append_child(figure, img).unwrap();
        assert!(doc.take_mutations().is_none());

        doc.append_child(doc.body(), figure).unwrap();
        let batch = doc.take_mutations().unwrap();
        assert_eq!(batch.added(), vec![figure]);
        assert!(doc.is_connected(img));

        doc.remove(figure).unwrap();
        let batch = doc.take_mutations().unwrap();
        assert_eq!(batch.removed(), vec![figure]);
        assert!(!doc.is_connected(img));
    }

    #[test]
    fn class_attribute_becomes_tokens() {
        let mut doc = Document::new();
        let node = doc.element("span", &[("class", "a b a"), ("data-x", "1")]);
        assert_eq!(doc.classes(node).to_vec(), vec!["a".to_string(), "b".to_string()]);
        assert!(doc.attribute(node, "class").is_none());
        assert_eq!(doc.attribute(node, "DATA-X"), Some("1"));
        assert!(doc.add_class(node, "c"));
        assert!(!doc.add_class(node, "c"));
        assert!(doc.remove_class(node, "a"));
        assert!(!doc.remove_class(node, "a"));
    }

    #[test]
    fn closest_includes_the_node_itself() {
        let mut doc = Document::new();
        let link = doc.element("a", &[("href", "/wiki/File:A.png")]);
        let img = doc.element("img", &[]);
        doc.append_child(link, img).unwrap();
        doc.append_child(doc.body(), link).unwrap();
        assert_eq!(doc.closest_link(img), Some(link));
        assert_eq!(doc.closest_link(link), Some(link));
        assert_eq!(doc.closest_tag(img, "td"), None);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut doc = Document::new();
        let outer = doc.element("div", &[]);
        let inner = doc.element("div", &[]);
        doc.append_child(outer, inner).unwrap();
        assert!(matches!(
            doc.append_child(inner, outer),
            Err(DomError::Hierarchy(_))
        ));
        assert!(matches!(doc.remove(doc.body()), Err(DomError::Hierarchy(_))));
    }

    #[test]
    fn current_src_prefers_loaded_url() {
        let mut doc = Document::new();
        let img = doc.element("img", &[("src", "/small.png")]);
        assert_eq!(doc.current_src(img), Some("/small.png"));
        doc.set_current_src(img, Some("/large.png".into()));
        assert_eq!(doc.current_src(img), Some("/large.png"));
    }

    #[test]
    fn location_hash_strips_marker() {
        let mut doc = Document::new();
        assert_eq!(doc.location_hash(), None);
        doc.set_location("https://wiki.example/wiki/Main#/media/File:A.png");
        assert_eq!(doc.location_hash(), Some("/media/File:A.png"));
    }

    #[test]
    fn descendants_are_in_document_order() {
        let mut doc = Document::new();
        let a = doc.element("div", &[]);
        let b = doc.element("p", &[]);
        let c = doc.element("img", &[]);
        let d = doc.element("span", &[]);
        doc.append_child(a, b).unwrap();
        doc.append_child(b, c).unwrap();
        doc.append_child(a, d).unwrap();
        assert_eq!(doc.descendants(a), vec![a, b, c, d]);
    }
}
