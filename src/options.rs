//! Renderer configuration.
//!
//! Options are fixed when a [`crate::Renderer`] is built. All fields are
//! public; the `with_*` helpers exist for chaining.
//!
//! ```
//! use spark_vdom::{FlushOrder, Options};
//!
//! let options = Options::default()
//!     .with_sync_component_updates(false)
//!     .with_flush_order(FlushOrder::FirstRequestedFirst)
//!     .with_after_mount(|c| log::debug!("mounted <{}>", c.name()));
//! assert!(!options.sync_component_updates);
//! ```

use std::fmt;
use std::rc::Rc;

use crate::component::ComponentHandle;
use crate::scheduler::{Defer, FlushOrder};

/// Callback observing a lifecycle transition of any component.
pub type Observer = Rc<dyn Fn(&ComponentHandle)>;

#[derive(Clone)]
pub struct Options {
    /// Re-render mounted components synchronously when their parent passes
    /// them new props. When `false` those renders go through the scheduler.
    pub sync_component_updates: bool,
    pub flush_order: FlushOrder,
    /// Where flush tasks go. `None` uses the renderer's own microtask queue.
    pub defer: Option<Rc<dyn Defer>>,
    /// Called before each component's `did_mount`.
    pub after_mount: Option<Observer>,
    /// Called after each component's `did_update`.
    pub after_update: Option<Observer>,
    /// Called before each component's `will_unmount`.
    pub before_unmount: Option<Observer>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            sync_component_updates: true,
            flush_order: FlushOrder::default(),
            defer: None,
            after_mount: None,
            after_update: None,
            before_unmount: None,
        }
    }
}

impl Options {
    pub fn with_sync_component_updates(mut self, sync: bool) -> Self {
        self.sync_component_updates = sync;
        self
    }

    pub fn with_flush_order(mut self, order: FlushOrder) -> Self {
        self.flush_order = order;
        self
    }

    pub fn with_defer(mut self, defer: Rc<dyn Defer>) -> Self {
        self.defer = Some(defer);
        self
    }

    pub fn with_after_mount(mut self, f: impl Fn(&ComponentHandle) + 'static) -> Self {
        self.after_mount = Some(Rc::new(f));
        self
    }

    pub fn with_after_update(mut self, f: impl Fn(&ComponentHandle) + 'static) -> Self {
        self.after_update = Some(Rc::new(f));
        self
    }

    pub fn with_before_unmount(mut self, f: impl Fn(&ComponentHandle) + 'static) -> Self {
        self.before_unmount = Some(Rc::new(f));
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("sync_component_updates", &self.sync_component_updates)
            .field("flush_order", &self.flush_order)
            .field("defer", &self.defer.as_ref().map(|_| ".."))
            .field("after_mount", &self.after_mount.is_some())
            .field("after_update", &self.after_update.is_some())
            .field("before_unmount", &self.before_unmount.is_some())
            .finish()
    }
}
