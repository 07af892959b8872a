//! In-memory render target.
//!
//! Nodes are indices into a flat arena. Every structural change and attribute
//! write is appended to a mutation log so callers can assert exactly what a
//! render pass did to the tree.
//!
//! # Attribute handling
//!
//! - `className` is an alias for `class`
//! - `on<event>` names store a [`Listener`] (removed when the value is null)
//! - `value` and `checked` are live properties; [`MemoryBackend::set_property`]
//!   simulates user input changing them behind the reconciler's back
//! - `raw_html` stores a markup string emitted verbatim by [`MemoryBackend::to_markup`]
//! - null and `false` clear the attribute, callbacks and opaque values are ignored

use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use log::{debug, trace};

use super::Backend;
use crate::types::{Attributes, Listener, NodeId, Value};
use crate::vnode::RAW_HTML;

// =============================================================================
// Node storage
// =============================================================================

#[derive(Debug)]
enum NodeKind {
    Element(Rc<str>),
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    namespaced: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: Attributes,
    properties: HashMap<String, Value>,
    listeners: HashMap<String, Listener>,
    raw_html: Option<String>,
}

impl NodeData {
    fn new(kind: NodeKind, namespaced: bool) -> Self {
        Self {
            kind,
            namespaced,
            parent: None,
            children: Vec::new(),
            attributes: Attributes::new(),
            properties: HashMap::new(),
            listeners: HashMap::new(),
            raw_html: None,
        }
    }
}

/// A single recorded operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    SetText { node: NodeId, text: String },
    Append { parent: NodeId, child: NodeId },
    InsertBefore { parent: NodeId, child: NodeId, reference: NodeId },
    Replace { parent: NodeId, new_child: NodeId, old_child: NodeId },
    Remove { parent: NodeId, child: NodeId },
    SetAttribute { node: NodeId, name: String, value: Value },
    RemoveAttribute { node: NodeId, name: String },
}

impl Mutation {
    pub fn is_creation(&self) -> bool {
        matches!(self, Self::CreateElement { .. } | Self::CreateText { .. })
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Remove { .. } | Self::Replace { .. })
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Self::Append { .. } | Self::InsertBefore { .. })
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self, Self::SetAttribute { .. } | Self::RemoveAttribute { .. })
    }
}

// =============================================================================
// MemoryBackend
// =============================================================================

/// Arena-backed document with a mutation log.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    nodes: Vec<NodeData>,
    log: Vec<Mutation>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element to mount into. Not recorded in the log.
    pub fn create_container(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Element(tag.into()), false))
    }

    /// Number of nodes ever allocated.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.log
    }

    /// Return and clear the mutation log.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.log)
    }

    pub fn clear_mutations(&mut self) {
        self.log.clear();
    }

    /// Attribute value as last applied, if present.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&Value> {
        self.node(node).attributes.get(name)
    }

    /// Change a live property as user interaction would. Not recorded.
    pub fn set_property(&mut self, node: NodeId, name: &str, value: impl Into<Value>) {
        self.node_mut(node).properties.insert(name.to_string(), value.into());
    }

    /// Attach an attribute directly, bypassing the log. Used to build trees
    /// the reconciler will adopt.
    pub fn set_raw_attribute(&mut self, node: NodeId, name: &str, value: impl Into<Value>) {
        self.node_mut(node).attributes.insert(name.to_string(), value.into());
    }

    /// Serialize the subtree rooted at `node` as markup.
    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    /// Serialize only the children of `node`.
    pub fn inner_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.node(node).children {
            self.write_markup(child, &mut out);
        }
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        let data = self.node(node);
        match &data.kind {
            NodeKind::Text(text) => escape_into(text, out),
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &data.attributes {
                    match value {
                        Value::Bool(true) => {
                            let _ = write!(out, " {name}");
                        }
                        other => {
                            if let Some(text) = other.to_text() {
                                let _ = write!(out, " {name}=\"");
                                escape_into(&text, out);
                                out.push('"');
                            }
                        }
                    }
                }
                out.push('>');
                if let Some(raw) = &data.raw_html {
                    out.push_str(raw);
                }
                for &child in &data.children {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(data);
        id
    }

    fn node(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.index()]
    }

    fn node_mut(&mut self, node: NodeId) -> &mut NodeData {
        &mut self.nodes[node.index()]
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.node_mut(child).parent.take() {
            self.node_mut(parent).children.retain(|&c| c != child);
        }
    }
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// `onClick` / `onclick` -> `click`
fn event_name(name: &str) -> Option<String> {
    let rest = name.strip_prefix("on")?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_ascii_lowercase())
}

impl Backend for MemoryBackend {
    fn create_element(&mut self, tag: &str, namespaced: bool) -> NodeId {
        let node = self.alloc(NodeData::new(NodeKind::Element(tag.into()), namespaced));
        trace!("create <{tag}> {node}");
        self.log.push(Mutation::CreateElement { node, tag: tag.to_string() });
        node
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        let node = self.alloc(NodeData::new(NodeKind::Text(text.to_string()), false));
        self.log.push(Mutation::CreateText { node, text: text.to_string() });
        node
    }

    fn node_name(&self, node: NodeId) -> Option<&str> {
        match &self.node(node).kind {
            NodeKind::Element(tag) => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.node(node).kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element(_) => None,
        }
    }

    fn is_namespaced(&self, node: NodeId) -> bool {
        self.node(node).namespaced
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    fn property(&self, node: NodeId, name: &str) -> Value {
        let data = self.node(node);
        data.properties
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, Value)> {
        self.node(node)
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn listener(&self, node: NodeId, event: &str) -> Option<Listener> {
        self.node(node).listeners.get(event).cloned()
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let NodeKind::Text(current) = &mut self.node_mut(node).kind {
            current.clear();
            current.push_str(text);
            self.log.push(Mutation::SetText { node, text: text.to_string() });
        } else {
            debug!("set_text on element {node} ignored");
        }
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
        self.log.push(Mutation::Append { parent, child });
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        if child == reference {
            return;
        }
        self.detach(child);
        let siblings = &mut self.node_mut(parent).children;
        let pos = siblings
            .iter()
            .position(|&c| c == reference)
            .unwrap_or(siblings.len());
        siblings.insert(pos, child);
        self.node_mut(child).parent = Some(parent);
        self.log.push(Mutation::InsertBefore { parent, child, reference });
    }

    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) {
        if new_child == old_child {
            return;
        }
        self.detach(new_child);
        let siblings = &mut self.node_mut(parent).children;
        match siblings.iter().position(|&c| c == old_child) {
            Some(pos) => siblings[pos] = new_child,
            None => siblings.push(new_child),
        }
        self.node_mut(old_child).parent = None;
        self.node_mut(new_child).parent = Some(parent);
        self.log.push(Mutation::Replace { parent, new_child, old_child });
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(child).parent != Some(parent) {
            return;
        }
        self.detach(child);
        self.log.push(Mutation::Remove { parent, child });
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, _old: &Value, new: &Value, _namespaced: bool) {
        if matches!(self.node(node).kind, NodeKind::Text(_)) {
            debug!("attribute {name} on text node {node} ignored");
            return;
        }
        let name = if name == "className" { "class" } else { name };

        if let Some(event) = event_name(name) {
            let data = self.node_mut(node);
            match new.as_listener() {
                Some(listener) => {
                    data.listeners.insert(event, listener.clone());
                }
                None => {
                    data.listeners.remove(&event);
                }
            }
            self.log.push(Mutation::SetAttribute { node, name: name.to_string(), value: new.clone() });
            return;
        }

        if name == RAW_HTML {
            self.node_mut(node).raw_html = new.to_text();
            self.log.push(Mutation::SetAttribute { node, name: name.to_string(), value: new.clone() });
            return;
        }

        if name == "value" || name == "checked" {
            self.node_mut(node).properties.insert(name.to_string(), new.clone());
        }

        match new {
            Value::Null | Value::Bool(false) => {
                self.node_mut(node).attributes.shift_remove(name);
                self.log.push(Mutation::RemoveAttribute { node, name: name.to_string() });
            }
            Value::Listener(_) | Value::Ref(_) | Value::Any(_) => {
                debug!("attribute {name} on {node}: value has no attribute form");
            }
            value => {
                self.node_mut(node).attributes.insert(name.to_string(), value.clone());
                self.log.push(Mutation::SetAttribute { node, name: name.to_string(), value: value.clone() });
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
