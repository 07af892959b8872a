//! Child reconciliation.
//!
//! Existing children are split into a keyed map and an unkeyed list. Each
//! virtual child claims a keyed node by key, or the first unclaimed unkeyed
//! node of the same kind; then the claimed (or new) node is diffed and moved
//! into position. Whatever was not claimed is torn down at the end.

use indexmap::IndexMap;
use log::warn;

use super::Engine;
use crate::backend::Backend;
use crate::component::Context;
use crate::error::Result;
use crate::types::{Key, NodeId};
use crate::vnode::{KEY, Tag, VChild};

impl<B: Backend> Engine<B> {
    /// Reconcile the children of `dom` against `vchildren`.
    ///
    /// `adopt_foreign` admits children without a prop cache into the unkeyed
    /// pool (hydration, raw markup); whitespace-only text is then skipped.
    pub(crate) fn inner_diff_node(
        &mut self,
        dom: NodeId,
        vchildren: &[VChild],
        context: &Context,
        mount_all: bool,
        adopt_foreign: bool,
    ) -> Result<()> {
        let original: Vec<NodeId> = self.backend.children(dom).to_vec();
        let mut keyed: IndexMap<Key, Option<NodeId>> = IndexMap::new();
        let mut keyed_len = 0;
        let mut displaced: Vec<NodeId> = Vec::new();
        let mut children: Vec<Option<NodeId>> = Vec::new();

        for child in original {
            let managed = self.has_prop_cache(child);
            let key = if !vchildren.is_empty() && managed { self.child_key(child) } else { None };

            if let Some(key) = key {
                match keyed.insert(key.clone(), Some(child)) {
                    Some(Some(earlier)) => {
                        warn!("duplicate key {key} under {dom}; discarding the earlier node");
                        displaced.push(earlier);
                    }
                    _ => keyed_len += 1,
                }
            } else if managed
                || match self.backend.text(child) {
                    Some(text) => !adopt_foreign || !text.trim().is_empty(),
                    None => adopt_foreign,
                }
            {
                children.push(Some(child));
            }
        }

        let mut min = 0;
        let mut children_len = children.len();

        for (i, vchild) in vchildren.iter().enumerate() {
            let mut claimed = None;

            if let Some(key) = vchild.key() {
                if keyed_len > 0 {
                    if let Some(slot) = keyed.get_mut(key) {
                        if let Some(node) = slot.take() {
                            claimed = Some(node);
                            keyed_len -= 1;
                        }
                    }
                }
            } else if min < children_len {
                for j in min..children_len {
                    let Some(candidate) = children[j] else { continue };
                    if self.is_same_node_type(candidate, vchild, adopt_foreign) {
                        claimed = Some(candidate);
                        children[j] = None;
                        if j == children_len - 1 {
                            children_len -= 1;
                        }
                        if j == min {
                            min += 1;
                        }
                        break;
                    }
                }
            }

            let child = self.idiff(claimed, vchild, context, mount_all, false)?;

            let current = self.backend.child_at(dom, i);
            if child != dom && Some(child) != current {
                match current {
                    None => self.backend.append_child(dom, child),
                    Some(f) if self.backend.next_sibling(f) == Some(child) => self.backend.remove_node(f),
                    Some(f) => self.backend.insert_before(dom, child, f),
                }
            }
        }

        if keyed_len > 0 {
            for node in keyed.into_values().flatten() {
                self.recollect_node_tree(node, false)?;
            }
        }

        for node in displaced {
            self.recollect_node_tree(node, false)?;
        }

        for j in (min..=children_len).rev() {
            if let Some(Some(node)) = children.get(j).copied() {
                self.recollect_node_tree(node, false)?;
            }
        }

        Ok(())
    }

    /// Key of an existing child: its component's key when component-owned,
    /// else the `key` attribute it was last rendered with.
    fn child_key(&self, child: NodeId) -> Option<Key> {
        if let Some(owner) = self.owner(child) {
            return owner.key();
        }
        self.meta(child)
            .and_then(|m| m.props.as_ref())
            .and_then(|p| p.get(KEY))
            .and_then(Key::from_value)
    }

    /// Whether `node` can be diffed into `vchild` without replacement.
    pub(crate) fn is_same_node_type(&self, node: NodeId, vchild: &VChild, hydrating: bool) -> bool {
        match vchild {
            VChild::Text(_) | VChild::Empty => self.backend.is_text(node),
            VChild::Node(vnode) => match &vnode.tag {
                Tag::Element(tag) => {
                    self.owner_type(node).is_none()
                        && self.backend.node_name(node).is_some_and(|n| n.eq_ignore_ascii_case(tag))
                }
                Tag::Component(ty) => hydrating || self.owner_type(node).as_ref() == Some(ty),
            },
        }
    }
}
