//! Render Target - the live tree the reconciler mutates.
//!
//! The reconciler never touches a concrete UI surface. Everything it needs is
//! expressed through the [`Backend`] trait:
//! - node creation (elements, text)
//! - structure queries (parent, children, siblings)
//! - structural mutations (append, insert-before, replace, remove)
//! - attribute application (best effort, never fails)
//!
//! # Contract
//!
//! Structural mutations follow DOM semantics: inserting a node that already
//! has a parent first detaches it from that parent. `set_attribute` must
//! swallow values the surface cannot represent; a failure there must never
//! abort a render pass.
//!
//! [`MemoryBackend`] is a complete in-memory implementation with a mutation
//! log, used by the tests and usable as a headless target.

mod memory;

pub use memory::{MemoryBackend, Mutation};

use crate::types::{Listener, NodeId, Value};

/// Primitive operations on a live tree.
pub trait Backend {
    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Create a detached element. `namespaced` is set inside namespace roots
    /// such as `svg`.
    fn create_element(&mut self, tag: &str, namespaced: bool) -> NodeId;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> NodeId;

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Element tag name, or `None` for text nodes.
    fn node_name(&self, node: NodeId) -> Option<&str>;

    /// Text content of a text node, or `None` for elements.
    fn text(&self, node: NodeId) -> Option<&str>;

    /// Whether the node lives inside a namespace root.
    fn is_namespaced(&self, node: NodeId) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Children in document order.
    fn children(&self, node: NodeId) -> &[NodeId];

    /// Live value of a property that user interaction can change
    /// independently of the virtual tree (`value`, `checked`).
    fn property(&self, node: NodeId, name: &str) -> Value;

    /// Attributes currently present on the node. Used to seed the prop
    /// cache when adopting a tree the reconciler did not build.
    fn attributes(&self, node: NodeId) -> Vec<(String, Value)>;

    /// Listener registered for `event` on `node`, if the backend stores them.
    fn listener(&self, _node: NodeId, _event: &str) -> Option<Listener> {
        None
    }

    fn is_text(&self, node: NodeId) -> bool {
        self.text(node).is_some()
    }

    fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.children(node).get(index).copied()
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).first().copied()
    }

    fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).last().copied()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == node)?;
        siblings.get(pos + 1).copied()
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == node)?;
        pos.checked_sub(1).and_then(|p| siblings.get(p).copied())
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    fn set_text(&mut self, node: NodeId, text: &str);

    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Insert `child` before `reference`, which must be a child of `parent`.
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId);

    /// Put `new_child` where `old_child` is and detach `old_child`.
    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId);

    fn remove_child(&mut self, parent: NodeId, child: NodeId);

    /// Detach a node from its parent, if attached.
    fn remove_node(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            self.remove_child(parent, node);
        }
    }

    /// Apply (`new` non-null) or clear (`new` null) a named attribute.
    /// `old` is the last value applied for this name.
    fn set_attribute(&mut self, node: NodeId, name: &str, old: &Value, new: &Value, namespaced: bool);
}
