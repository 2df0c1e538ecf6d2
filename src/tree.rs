//! # Tree-Walk Source Abstraction
//!
//! The dispatch core never owns document nodes. It consumes a tree through the
//! [`NodeTree`] capability trait: stable node identities, per-node kind and
//! name access, and ordered child iteration. Any parser or document model can
//! sit behind this trait; [`DocumentTree`] is the in-memory reference
//! implementation used by tests and the bypass path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Qualified element or attribute name: local part plus optional namespace
/// prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    pub local: String,
    pub namespace: Option<String>,
}

impl QName {
    pub fn new(local: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            namespace: None,
        }
    }

    pub fn namespaced(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Parse `ns:local` or plain `local` notation.
    pub fn parse(name: &str) -> Self {
        match name.split_once(':') {
            Some((ns, local)) if !ns.is_empty() => Self::namespaced(ns, local),
            _ => Self::new(name),
        }
    }

    /// Name equality as used by selector matching: local parts must match and
    /// a selector-side namespace, when present, must match the element's.
    /// A prefix-less selector name matches any namespace.
    pub fn selects(&self, element: &QName) -> bool {
        if self.local != element.local {
            return false;
        }
        match &self.namespace {
            Some(ns) => element.namespace.as_deref() == Some(ns.as_str()),
            None => true,
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}:{}", ns, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// Stable, copyable identity of a node within its source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// The node kinds the dispatch runtime distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

/// Capability interface the dispatch runtime consumes from an external
/// parser or document model. Implementations must keep node identities
/// stable for the lifetime of an execution.
pub trait NodeTree {
    /// The document root element.
    fn root(&self) -> NodeId;

    fn kind(&self, node: NodeId) -> NodeKind;

    /// Element name; `None` for text nodes.
    fn name(&self, node: NodeId) -> Option<&QName>;

    /// Attributes in document order; empty for text nodes.
    fn attributes(&self, node: NodeId) -> &[(QName, String)];

    /// Character data; `None` for element nodes.
    fn text(&self, node: NodeId) -> Option<&str>;

    /// Child nodes in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Look up an attribute by local name.
    fn attribute(&self, node: NodeId, local: &str) -> Option<&str> {
        self.attributes(node)
            .iter()
            .find(|(name, _)| name.local == local)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    name: Option<QName>,
    attributes: Vec<(QName, String)>,
    text: Option<String>,
    children: Vec<NodeId>,
}

/// In-memory document tree with a small builder API.
///
/// ```
/// use weft_core::tree::{DocumentTree, NodeTree};
///
/// let mut tree = DocumentTree::new("order");
/// let item = tree.append_element(tree.root(), "item");
/// tree.set_attribute(item, "id", "1");
/// tree.append_text(item, "socks");
/// assert_eq!(tree.children(tree.root()).len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<Node>,
}

impl DocumentTree {
    /// Create a tree with the given root element name.
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Element,
                name: Some(QName::parse(root_name)),
                attributes: Vec::new(),
                text: None,
                children: Vec::new(),
            }],
        }
    }

    /// Append a child element under `parent` and return its id.
    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: NodeKind::Element,
            name: Some(QName::parse(name)),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append a text node under `parent` and return its id.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: NodeKind::Text,
            name: None,
            attributes: Vec::new(),
            text: Some(text.to_string()),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Set (or replace) an attribute on an element.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let qname = QName::parse(name);
        let attrs = &mut self.nodes[node.0].attributes;
        if let Some(existing) = attrs.iter_mut().find(|(n, _)| *n == qname) {
            existing.1 = value.to_string();
        } else {
            attrs.push((qname, value.to_string()));
        }
    }
}

impl NodeTree for DocumentTree {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        self.nodes[node.0].kind
    }

    fn name(&self, node: NodeId) -> Option<&QName> {
        self.nodes[node.0].name.as_ref()
    }

    fn attributes(&self, node: NodeId) -> &[(QName, String)] {
        &self.nodes[node.0].attributes
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].text.as_deref()
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node.0].children.clone()
    }
}

/// Serialize a subtree to XML-shaped text. Used by whole-document handlers
/// and as the reference output for bypass equivalence checks.
pub fn write_subtree(tree: &dyn NodeTree, node: NodeId, out: &mut String) {
    match tree.kind(node) {
        NodeKind::Text => {
            if let Some(text) = tree.text(node) {
                out.push_str(text);
            }
        }
        NodeKind::Element => {
            let Some(name) = tree.name(node) else {
                return;
            };
            out.push('<');
            out.push_str(&name.to_string());
            for (attr, value) in tree.attributes(node) {
                out.push(' ');
                out.push_str(&attr.to_string());
                out.push_str("=\"");
                out.push_str(value);
                out.push('"');
            }
            out.push('>');
            for child in tree.children(node) {
                write_subtree(tree, child, out);
            }
            out.push_str("</");
            out.push_str(&name.to_string());
            out.push('>');
        }
    }
}
