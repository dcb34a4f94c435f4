//! Page document: a `scraper` tree changed in place, standing in for the browser DOM.
//!
//! Nodes are addressed by ego-tree [`NodeId`]s. Detached nodes keep their id (like a removed
//! DOM node that is still referenced) and can be reinserted, but no longer count as connected.
//! Structural changes to connected nodes inside an observed subtree are reported to a single
//! mutation observer, one [`MutationRecord`] per change.

use std::sync::Arc;

use ego_tree::NodeRef;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::{Element, Text};
use scraper::{ElementRef, Html, Node, Selector, StrTendril};

pub use ego_tree::NodeId;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A structural change: `added` and `removed` are children of `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Receives mutation records. Called synchronously from the mutating call.
pub type MutationCallback = Arc<dyn Fn(&MutationRecord) + Send + Sync + 'static>;

struct Observer {
    scope: NodeId,
    callback: MutationCallback,
}

pub struct Document {
    html: Html,
    observer: Option<Observer>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.node_count())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

fn html_name(local: &str) -> QualName {
    QualName::new(
        None,
        Namespace::from(HTML_NAMESPACE),
        LocalName::from(local.to_ascii_lowercase()),
    )
}

fn attr_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(local))
}

impl Document {
    /// Empty document holding only the root node.
    pub fn new() -> Self {
        Self {
            html: Html::new_document(),
            observer: None,
        }
    }

    /// Parses markup into a document. The parser is forgiving: any input yields a document
    /// with the usual `html`/`head`/`body` skeleton.
    pub fn parse_html(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
            observer: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.html.tree.root().id()
    }

    /// First `<body>` element, or the root when the document has none.
    pub fn body(&self) -> NodeId {
        self.first_element_named("body").unwrap_or_else(|| self.root())
    }

    /// First `<head>` element, or the root when the document has none.
    pub fn head(&self) -> NodeId {
        self.first_element_named("head").unwrap_or_else(|| self.root())
    }

    fn first_element_named(&self, name: &str) -> Option<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .find(|node| node.value().as_element().is_some_and(|el| el.name() == name))
            .map(|node| node.id())
    }

    fn node(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.html.tree.get(id)
    }

    /// Number of nodes ever allocated, attached or not.
    pub fn node_count(&self) -> usize {
        self.html.tree.nodes().count()
    }

    /// New detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        let element = Element::new(html_name(name), Vec::new());
        self.html.tree.orphan(Node::Element(element)).id()
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node(id)?.value().as_element()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent().map(|parent| parent.id())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| node.children().map(|child| child.id()).collect())
            .unwrap_or_default()
    }

    /// Parent chain from the nearest ancestor upwards, not including `id`.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(|node| node.ancestors())
            .map(|ancestor| ancestor.id())
    }

    /// All descendants of `id` in document order, not including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| node.descendants().skip(1).map(|d| d.id()).collect())
            .unwrap_or_default()
    }

    /// Whether the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let root = self.root();
        id == root || self.ancestors(id).any(|a| a == root)
    }

    fn is_inclusive_descendant(&self, id: NodeId, of: NodeId) -> bool {
        id == of || self.ancestors(id).any(|a| a == of)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        self.update_attrs(id, |attrs| {
            match attrs.iter_mut().find(|attr| &*attr.name.local == name) {
                Some(attr) => attr.value = value.into(),
                None => attrs.push(Attribute {
                    name: attr_name(name),
                    value: value.into(),
                }),
            }
        });
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if self.has_attr(id, name) {
            self.update_attrs(id, |attrs| attrs.retain(|attr| &*attr.name.local != name));
        }
    }

    /// Rebuilds the element at `id` with edited attributes, keeping their order.
    /// The element caches its id and classes, so it is replaced rather than edited.
    fn update_attrs(&mut self, id: NodeId, edit: impl FnOnce(&mut Vec<Attribute>)) {
        let Some(mut node) = self.html.tree.get_mut(id) else {
            return;
        };
        let rebuilt = match node.value() {
            Node::Element(element) => {
                let mut attrs: Vec<Attribute> = element
                    .attrs
                    .iter()
                    .map(|(name, value)| Attribute {
                        name: name.clone(),
                        value: (&**value).into(),
                    })
                    .collect();
                edit(&mut attrs);
                Element::new(element.name.clone(), attrs)
            }
            _ => return,
        };
        *node.value() = Node::Element(rebuilt);
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.node(id)
            .and_then(ElementRef::wrap)
            .is_some_and(|element| selector.matches(&element))
    }

    /// Elements under `scope` (excluding `scope`) matching `selector`, in document order.
    pub fn select_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let Some(scope) = self.node(scope) else {
            return Vec::new();
        };
        scope
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|element| selector.matches(element))
            .map(|element| element.id())
            .collect()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.node(id) else {
            return String::new();
        };
        node.descendants()
            .filter_map(|d| d.value().as_text())
            .map(|text| &**text)
            .collect()
    }

    /// Like [`Document::text_content`], skipping every descendant element matching `excluded`
    /// together with its subtree.
    pub fn text_content_excluding(&self, id: NodeId, excluded: &Selector) -> String {
        let mut out = String::new();
        if let Some(node) = self.node(id) {
            collect_text(node, excluded, &mut out);
        }
        out
    }

    /// Replaces the children of `id` with a single text node. A lone text child is rewritten in
    /// place, which is not a structural change.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let children = self.children(id);
        let lone_text = match children.as_slice() {
            [only] if self.node(*only).is_some_and(|n| n.value().is_text()) => Some(*only),
            _ => None,
        };
        let target = match self.node(id) {
            Some(node) if node.value().is_text() => Some(id),
            Some(_) => lone_text,
            None => return,
        };

        if let Some(target) = target {
            if let Some(mut node) = self.html.tree.get_mut(target) {
                *node.value() = Node::Text(Text {
                    text: StrTendril::from(text),
                });
            }
            return;
        }

        for child in &children {
            if let Some(mut node) = self.html.tree.get_mut(*child) {
                node.detach();
            }
        }
        let Some(mut parent) = self.html.tree.get_mut(id) else {
            return;
        };
        let added = parent
            .append(Node::Text(Text {
                text: StrTendril::from(text),
            }))
            .id();
        self.notify(id, vec![added], children);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.can_adopt(parent, child) {
            return;
        }
        self.detach(child);
        if let Some(mut node) = self.html.tree.get_mut(parent) {
            node.append_id(child);
            self.notify(parent, vec![child], Vec::new());
        }
    }

    /// Inserts `child` before `reference`; appends when `reference` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        if child == reference || self.parent(reference) != Some(parent) {
            self.append_child(parent, child);
            return;
        }
        if !self.can_adopt(parent, child) {
            return;
        }
        self.detach(child);
        if let Some(mut node) = self.html.tree.get_mut(reference) {
            node.insert_id_before(child);
            self.notify(parent, vec![child], Vec::new());
        }
    }

    /// A node cannot move into itself or into its own subtree.
    fn can_adopt(&self, parent: NodeId, child: NodeId) -> bool {
        self.node(child).is_some() && !self.is_inclusive_descendant(parent, child)
    }

    /// Removes `id` from its parent. The subtree stays intact and can be reinserted.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(mut node) = self.html.tree.get_mut(id) {
            node.detach();
        }
        self.notify(parent, Vec::new(), vec![id]);
    }

    /// Starts delivering mutation records for changes inside `scope`. Replaces any previous
    /// observer.
    pub fn observe(&mut self, scope: NodeId, callback: MutationCallback) {
        self.observer = Some(Observer { scope, callback });
    }

    pub fn disconnect(&mut self) {
        self.observer = None;
    }

    #[cfg(test)]
    pub(crate) fn is_observed(&self) -> bool {
        self.observer.is_some()
    }

    fn notify(&self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        let Some(observer) = &self.observer else {
            return;
        };
        if !self.is_connected(target) || !self.is_inclusive_descendant(target, observer.scope) {
            return;
        }
        (observer.callback)(&MutationRecord {
            target,
            added,
            removed,
        });
    }

    /// Serialises the element at `id` as HTML.
    #[cfg(test)]
    pub(crate) fn outer_html(&self, id: NodeId) -> String {
        self.node(id)
            .and_then(ElementRef::wrap)
            .map(|element| element.html())
            .unwrap_or_default()
    }
}

fn collect_text(node: NodeRef<'_, Node>, excluded: &Selector, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if ElementRef::wrap(child).is_some_and(|element| excluded.matches(&element)) {
                    continue;
                }
                collect_text(child, excluded, out);
            }
            _ => {}
        }
    }
}
