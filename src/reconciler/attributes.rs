//! Attribute diffing against the prop cache.

use log::trace;

use super::Engine;
use crate::backend::Backend;
use crate::types::{Attributes, NodeId, RefTarget, Value};
use crate::vnode::{CHILDREN, INNER_HTML, KEY, REF};

impl<B: Backend> Engine<B> {
    /// Apply the difference between the node's prop cache and `attrs`.
    ///
    /// Cached names missing (or null) in `attrs` are cleared. New or changed
    /// names are applied; `value` and `checked` compare against the live
    /// property since user input changes them behind the cache's back.
    pub(crate) fn diff_attributes(&mut self, node: NodeId, attrs: &Attributes) {
        let mut cache = self.meta_mut(node).props.take().unwrap_or_default();

        let stale: Vec<String> = cache
            .iter()
            .filter(|(name, old)| !old.is_null() && attrs.get(*name).is_none_or(Value::is_null))
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            if let Some(old) = cache.shift_remove(&name) {
                self.apply_attribute(node, &name, &old, &Value::Null);
            }
        }

        for (name, value) in attrs {
            if name == CHILDREN || name == INNER_HTML {
                continue;
            }
            let changed = match cache.get(name) {
                None => !value.is_null(),
                Some(_) if name == "value" || name == "checked" => *value != self.backend.property(node, name),
                Some(old) => old != value,
            };
            if changed {
                let old = cache.insert(name.clone(), value.clone()).unwrap_or_default();
                self.apply_attribute(node, name, &old, value);
            }
        }

        self.meta_mut(node).props = Some(cache);
    }

    fn apply_attribute(&mut self, node: NodeId, name: &str, old: &Value, new: &Value) {
        match name {
            KEY => {}
            REF => {
                if let Some(previous) = old.as_ref_callback() {
                    previous.call(None);
                }
                if let Some(current) = new.as_ref_callback() {
                    current.call(Some(RefTarget::Node(node)));
                }
            }
            _ => {
                trace!("{node} {name} = {new:?}");
                self.backend.set_attribute(node, name, old, new, self.namespaced);
            }
        }
    }
}
