//! Instance recycler - pool of root nodes left behind by torn-down instances,
//! by component type.
//!
//! Only the root node of an unmounted instance is ever reused: a new instance
//! of the same type inherits it as its `next_base` and diffs against it
//! instead of building a fresh tree. The instance itself is not kept.

use std::collections::HashMap;

use log::trace;

use super::TypeKey;
use crate::types::NodeId;

#[derive(Default)]
pub(crate) struct Recycler {
    pools: HashMap<TypeKey, Vec<NodeId>>,
}

impl Recycler {
    pub fn collect(&mut self, key: TypeKey, base: NodeId) {
        trace!("pooled root {base} for {key:?}");
        self.pools.entry(key).or_default().push(base);
    }

    /// Remove the most recently pooled root of exactly this type.
    pub fn take(&mut self, key: TypeKey) -> Option<NodeId> {
        let pool = self.pools.get_mut(&key)?;
        let base = pool.pop();
        if pool.is_empty() {
            self.pools.remove(&key);
        }
        base
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }
}
