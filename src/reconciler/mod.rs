//! Tree Reconciler - brings a live tree in line with a virtual tree.
//!
//! The reconciler owns everything a render pass needs: the backend, per-node
//! metadata (prop cache and owning component), the queue of components
//! waiting for `did_mount`, and the pass-wide flags.
//!
//! # Architecture
//!
//! ```text
//! diff (depth counter, flush mounts at depth 0)
//!   └─ idiff
//!        ├─ text      → reuse or replace a text node
//!        ├─ component → build_component_from_vnode (lifecycle)
//!        └─ element   → reuse or recreate, then
//!                         inner_diff_node (children)
//!                         diff_attributes (attributes, refs)
//! ```
//!
//! Nodes the reconciler has touched carry a prop cache: the attribute map it
//! last applied. A node without one was built by someone else and is only
//! adopted while hydrating.

mod attributes;
mod children;

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use log::{trace, warn};

use crate::backend::Backend;
use crate::component::{ComponentType, Context, Instance, Recycler};
use crate::error::Result;
use crate::options::Options;
use crate::scheduler::Scheduler;
use crate::types::{Attributes, NodeId};
use crate::vnode::{RAW_HTML, REF, Tag, VChild, VNode};

/// What the engine remembers about a live node.
#[derive(Default)]
pub(crate) struct NodeMeta {
    /// Last applied attributes. `None` until the reconciler touches the node.
    pub props: Option<Attributes>,
    /// Outermost component whose root this node is.
    pub component: Option<Rc<Instance>>,
    pub component_type: Option<ComponentType>,
}

pub(crate) struct Engine<B> {
    pub backend: B,
    pub options: Options,
    pub scheduler: Rc<Scheduler>,
    pub recycler: Recycler,
    nodes: HashMap<NodeId, NodeMeta>,
    /// Components waiting for `did_mount`, children before parents.
    pub mounts: VecDeque<Rc<Instance>>,
    pub diff_level: usize,
    /// Inside a namespace root (`svg`).
    namespaced: bool,
    /// Adopting a tree with no prop caches.
    hydrating: bool,
}

impl<B: Backend> Engine<B> {
    pub fn new(backend: B, options: Options, scheduler: Rc<Scheduler>) -> Self {
        Self {
            backend,
            options,
            scheduler,
            recycler: Recycler::default(),
            nodes: HashMap::new(),
            mounts: VecDeque::new(),
            diff_level: 0,
            namespaced: false,
            hydrating: false,
        }
    }

    // -------------------------------------------------------------------------
    // Node metadata
    // -------------------------------------------------------------------------

    pub fn meta(&self, node: NodeId) -> Option<&NodeMeta> {
        self.nodes.get(&node)
    }

    pub fn meta_mut(&mut self, node: NodeId) -> &mut NodeMeta {
        self.nodes.entry(node).or_default()
    }

    pub fn has_prop_cache(&self, node: NodeId) -> bool {
        self.meta(node).is_some_and(|m| m.props.is_some())
    }

    pub fn owner(&self, node: NodeId) -> Option<Rc<Instance>> {
        self.meta(node).and_then(|m| m.component.clone())
    }

    pub fn owner_type(&self, node: NodeId) -> Option<ComponentType> {
        self.meta(node).and_then(|m| m.component_type.clone())
    }

    pub fn set_owner(&mut self, node: NodeId, owner: &Rc<Instance>) {
        let meta = self.meta_mut(node);
        meta.component_type = Some(owner.ty().clone());
        meta.component = Some(owner.clone());
    }

    pub fn clear_owner(&mut self, node: NodeId) {
        if let Some(meta) = self.nodes.get_mut(&node) {
            meta.component = None;
            meta.component_type = None;
        }
    }

    pub fn call_node_ref(&self, node: NodeId) {
        let node_ref = self
            .meta(node)
            .and_then(|m| m.props.as_ref())
            .and_then(|p| p.get(REF))
            .and_then(|v| v.as_ref_callback().cloned());
        if let Some(node_ref) = node_ref {
            node_ref.call(None);
        }
    }

    // -------------------------------------------------------------------------
    // Pass entry points
    // -------------------------------------------------------------------------

    /// Reconcile `dom` against `vnode`, returning the resulting node.
    ///
    /// `parent`, when given, receives the result if it is not already its
    /// child. `component_root` marks a diff of a component's rendered output:
    /// such a diff may reuse component-owned text and leaves the mount queue
    /// to the caller.
    pub fn diff(
        &mut self,
        dom: Option<NodeId>,
        vnode: &VChild,
        context: &Context,
        mount_all: bool,
        parent: Option<NodeId>,
        component_root: bool,
    ) -> Result<NodeId> {
        if self.diff_level == 0 {
            self.namespaced = parent.is_some_and(|p| self.backend.is_namespaced(p));
            self.hydrating = dom.is_some_and(|d| !self.has_prop_cache(d));
        }
        self.diff_level += 1;

        let out = self.idiff(dom, vnode, context, mount_all, component_root)?;

        if let Some(parent) = parent {
            if self.backend.parent(out) != Some(parent) {
                self.backend.append_child(parent, out);
            }
        }

        self.diff_level -= 1;
        if self.diff_level == 0 {
            self.hydrating = false;
            if !component_root {
                self.flush_mounts()?;
            }
        }

        Ok(out)
    }

    /// Reset pass state after an error unwound a pass.
    pub fn abort_pass(&mut self) {
        if !self.mounts.is_empty() {
            warn!("render pass failed; dropping {} pending mount notification(s)", self.mounts.len());
            self.mounts.clear();
        }
        self.diff_level = 0;
        self.namespaced = false;
        self.hydrating = false;
    }

    /// Call `did_mount` for every queued component, in queue order.
    pub fn flush_mounts(&mut self) -> Result<()> {
        while let Some(instance) = self.mounts.pop_front() {
            if let Some(observer) = &self.options.after_mount {
                observer(&instance.handle());
            }
            instance.call_did_mount()?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Single node
    // -------------------------------------------------------------------------

    pub(crate) fn idiff(
        &mut self,
        dom: Option<NodeId>,
        vnode: &VChild,
        context: &Context,
        mount_all: bool,
        component_root: bool,
    ) -> Result<NodeId> {
        let vnode = match vnode {
            VChild::Text(text) => return self.diff_text(dom, text, component_root),
            VChild::Empty => return self.diff_text(dom, "", component_root),
            VChild::Node(node) => node,
        };

        let tag = match &vnode.tag {
            Tag::Component(ty) => return self.build_component_from_vnode(dom, ty, vnode, context, mount_all),
            Tag::Element(tag) => tag.clone(),
        };

        let saved = self.namespaced;
        self.namespaced = match &*tag {
            "svg" => true,
            "foreignObject" => false,
            _ => saved,
        };
        let result = self.diff_element(dom, vnode, &tag, context, mount_all);
        self.namespaced = saved;
        result
    }

    fn diff_text(&mut self, dom: Option<NodeId>, text: &str, component_root: bool) -> Result<NodeId> {
        if let Some(node) = dom {
            let reusable = self.backend.is_text(node)
                && self.backend.parent(node).is_some()
                && (self.owner(node).is_none() || component_root);
            if reusable {
                if self.backend.text(node) != Some(text) {
                    self.backend.set_text(node, text);
                }
                self.meta_mut(node).props.get_or_insert_with(Attributes::new);
                return Ok(node);
            }
        }

        let out = self.backend.create_text(text);
        if let Some(node) = dom {
            if let Some(parent) = self.backend.parent(node) {
                self.backend.replace_child(parent, out, node);
            }
            self.recollect_node_tree(node, true)?;
        }
        self.meta_mut(out).props = Some(Attributes::new());
        Ok(out)
    }

    fn diff_element(
        &mut self,
        dom: Option<NodeId>,
        vnode: &VNode,
        tag: &str,
        context: &Context,
        mount_all: bool,
    ) -> Result<NodeId> {
        let out = match dom {
            Some(node) if self.is_named_node(node, tag) => node,
            _ => {
                let created = self.backend.create_element(tag, self.namespaced);
                if let Some(node) = dom {
                    // keep the old children; they are diffed below
                    while let Some(child) = self.backend.first_child(node) {
                        self.backend.append_child(created, child);
                    }
                    if let Some(parent) = self.backend.parent(node) {
                        self.backend.replace_child(parent, created, node);
                    }
                    self.recollect_node_tree(node, true)?;
                }
                created
            }
        };

        if !self.has_prop_cache(out) {
            let seeded: Attributes = self.backend.attributes(out).into_iter().collect();
            self.meta_mut(out).props = Some(seeded);
        }

        let first = self.backend.first_child(out);
        let single_text = match (vnode.children.as_slice(), first) {
            ([VChild::Text(text)], Some(fc)) if !self.hydrating => {
                let only = self.backend.is_text(fc) && self.backend.next_sibling(fc).is_none();
                only.then_some((fc, text))
            }
            _ => None,
        };

        if let Some((fc, text)) = single_text {
            if self.backend.text(fc) != Some(&**text) {
                self.backend.set_text(fc, text);
            }
        } else if !vnode.children.is_empty() || first.is_some() {
            let raw = self
                .meta(out)
                .and_then(|m| m.props.as_ref())
                .and_then(|p| p.get(RAW_HTML))
                .is_some_and(|v| !v.is_null());
            let adopt_foreign = self.hydrating || raw;
            self.inner_diff_node(out, &vnode.children, context, mount_all, adopt_foreign)?;
        }

        self.diff_attributes(out, &vnode.attributes);
        Ok(out)
    }

    fn is_named_node(&self, node: NodeId, tag: &str) -> bool {
        self.backend.node_name(node).is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Tear down a subtree: unmount its component, or detach refs and remove
    /// it. With `unmount_only`, managed nodes stay attached to their parent.
    /// The metadata of every discarded node is dropped.
    pub fn recollect_node_tree(&mut self, node: NodeId, unmount_only: bool) -> Result<()> {
        self.release(node, unmount_only, true)
    }

    /// Recollect every child of `node`, last to first, without detaching
    /// managed ones. Without `forget` the children keep their metadata, as
    /// the subtree of a pooled root must.
    pub fn release_children(&mut self, node: NodeId, forget: bool) -> Result<()> {
        let mut cursor = self.backend.last_child(node);
        while let Some(child) = cursor {
            cursor = self.backend.previous_sibling(child);
            self.release(child, true, forget)?;
        }
        Ok(())
    }

    fn release(&mut self, node: NodeId, unmount_only: bool, forget: bool) -> Result<()> {
        // a component root is pooled by its unmount and keeps its metadata
        if let Some(component) = self.owner(node) {
            return self.unmount_component(&component);
        }

        self.call_node_ref(node);
        if !unmount_only || !self.has_prop_cache(node) {
            trace!("remove {node}");
            self.backend.remove_node(node);
        }
        self.release_children(node, forget)?;
        if forget {
            self.nodes.remove(&node);
        }
        Ok(())
    }

    /// Drop the metadata of a detached subtree without running callbacks.
    pub fn forget_tree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            self.nodes.remove(&node);
            let mut child = self.backend.first_child(node);
            while let Some(current) = child {
                stack.push(current);
                child = self.backend.next_sibling(current);
            }
        }
    }

    /// Number of nodes the engine holds metadata for.
    pub fn tracked_nodes(&self) -> usize {
        self.nodes.len()
    }
}
