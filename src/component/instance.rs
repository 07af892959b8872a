//! Component instances - the engine-side record behind every component.
//!
//! The user's [`Component`] value is boxed inside an [`Instance`] together
//! with everything the lifecycle manager tracks: current and previous
//! props/state/context, the committed root node, the recycled node hint, and
//! the links of a higher-order chain.
//!
//! Borrow discipline: user hooks run with only the component box borrowed.
//! Values passed to hooks are cloned out of the core first so a hook can read
//! its own handle.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use log::trace;

use super::{
    Component, ComponentHandle, ComponentType, Context, Props, RenderResult, Snapshot, State, StateUpdate,
    Updater,
};
use crate::error::{BoxError, Error, Result};
use crate::scheduler::Scheduler;
use crate::types::{Attributes, Key, NodeId, NodeRef};
use crate::vnode::VChild;

// =============================================================================
// Flags and modes
// =============================================================================

bitflags::bitflags! {
    /// Scheduling and reentrancy flags of an instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct InstanceFlags: u8 {
        /// Queued for re-render; cleared when the render starts.
        const DIRTY = 1 << 0;
        /// Props are being applied, or the instance is torn down.
        const DISABLED = 1 << 1;
        /// A forced render was requested while the engine was busy.
        const FORCE = 1 << 2;
    }
}

/// How a render of a component was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderMode {
    /// Apply props only.
    None,
    /// Render now.
    Sync,
    /// Render now, bypassing `should_update`.
    Force,
    /// Render now if synchronous updates are enabled, otherwise queue.
    /// Also used by the flush, where it behaves like `Sync`.
    Scheduled,
}

// =============================================================================
// Instance
// =============================================================================

pub(crate) struct Core {
    pub props: Props,
    pub state: State,
    pub context: Context,
    pub prev_props: Option<Props>,
    pub prev_state: Option<State>,
    pub prev_context: Option<Context>,
    /// Root node of the last committed render.
    pub base: Option<NodeId>,
    /// Node to try reusing on the next render.
    pub next_base: Option<NodeId>,
    /// Component this one renders directly into.
    pub child: Option<Rc<Instance>>,
    /// Component that renders directly into this one.
    pub parent: Weak<Instance>,
    pub key: Option<Key>,
    pub node_ref: Option<NodeRef>,
}

type Callback = Box<dyn FnOnce()>;

pub(crate) struct Instance {
    ty: ComponentType,
    component: RefCell<Box<dyn Component>>,
    flags: Cell<InstanceFlags>,
    core: RefCell<Core>,
    callbacks: RefCell<Vec<Callback>>,
    updater: Updater,
}

impl Instance {
    /// Construct the user component and wrap it.
    pub fn new(ty: &ComponentType, props: &Props, context: &Context, scheduler: Weak<Scheduler>) -> Rc<Self> {
        Rc::new_cyclic(|weak| {
            let updater = Updater::new(weak.clone(), scheduler);
            let component = ty.construct(props, context, updater.clone());
            let state = State::new(component.initial_state());
            trace!("created <{}>", ty.name());
            Self {
                ty: ty.clone(),
                component: RefCell::new(component),
                flags: Cell::new(InstanceFlags::empty()),
                core: RefCell::new(Core {
                    props: props.clone(),
                    state,
                    context: context.clone(),
                    prev_props: None,
                    prev_state: None,
                    prev_context: None,
                    base: None,
                    next_base: None,
                    child: None,
                    parent: Weak::new(),
                    key: None,
                    node_ref: None,
                }),
                callbacks: RefCell::new(Vec::new()),
                updater,
            }
        })
    }

    pub fn ty(&self) -> &ComponentType {
        &self.ty
    }

    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    pub fn component(&self) -> &RefCell<Box<dyn Component>> {
        &self.component
    }

    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }

    pub fn core(&self) -> Ref<'_, Core> {
        self.core.borrow()
    }

    pub fn core_mut(&self) -> RefMut<'_, Core> {
        self.core.borrow_mut()
    }

    // -------------------------------------------------------------------------
    // Flags
    // -------------------------------------------------------------------------

    fn has(&self, flag: InstanceFlags) -> bool {
        self.flags.get().contains(flag)
    }

    pub fn set_flag(&self, flag: InstanceFlags, on: bool) {
        let mut flags = self.flags.get();
        flags.set(flag, on);
        self.flags.set(flags);
    }

    pub fn is_dirty(&self) -> bool {
        self.has(InstanceFlags::DIRTY)
    }

    pub fn is_disabled(&self) -> bool {
        self.has(InstanceFlags::DISABLED)
    }

    /// A forced render is waiting in the queue.
    pub fn is_forced(&self) -> bool {
        self.has(InstanceFlags::FORCE)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn base(&self) -> Option<NodeId> {
        self.core.borrow().base
    }

    pub fn child(&self) -> Option<Rc<Instance>> {
        self.core.borrow().child.clone()
    }

    pub fn parent(&self) -> Option<Rc<Instance>> {
        self.core.borrow().parent.upgrade()
    }

    pub fn key(&self) -> Option<Key> {
        self.core.borrow().key.clone()
    }

    pub fn handle(self: &Rc<Self>) -> ComponentHandle {
        ComponentHandle(self.clone())
    }

    pub fn snapshot(&self) -> Snapshot {
        let core = self.core.borrow();
        Snapshot {
            props: core.props.clone(),
            state: core.state.clone(),
            context: core.context.clone(),
        }
    }

    /// Values the component showed before the pending changes, falling back
    /// to the current ones where nothing changed.
    pub fn previous_snapshot(&self) -> Snapshot {
        let core = self.core.borrow();
        Snapshot {
            props: core.prev_props.clone().unwrap_or_else(|| core.props.clone()),
            state: core.prev_state.clone().unwrap_or_else(|| core.state.clone()),
            context: core.prev_context.clone().unwrap_or_else(|| core.context.clone()),
        }
    }

    // -------------------------------------------------------------------------
    // State and callbacks
    // -------------------------------------------------------------------------

    pub fn push_callback(&self, callback: Callback) {
        self.callbacks.borrow_mut().push(callback);
    }

    /// Most recently added first.
    pub fn pop_callback(&self) -> Option<Callback> {
        self.callbacks.borrow_mut().pop()
    }

    /// Merge a state update into the state now. The state shown by the last
    /// render is kept as the previous state until the next render.
    pub fn apply_state(&self, update: StateUpdate) {
        let (mut state, props) = {
            let core = self.core.borrow();
            (core.state.clone(), core.props.clone())
        };
        match update {
            StateUpdate::Merge(partial) => state.merge(partial),
            StateUpdate::Apply(f) => {
                let partial = f(&state, &props);
                state.merge(partial);
            }
        }

        let mut core = self.core.borrow_mut();
        if core.prev_state.is_none() {
            core.prev_state = Some(core.state.clone());
        }
        core.state = state;
    }

    // -------------------------------------------------------------------------
    // User hooks
    // -------------------------------------------------------------------------

    fn hook<R>(
        &self,
        hook: &'static str,
        f: impl FnOnce(&mut dyn Component) -> std::result::Result<R, BoxError>,
    ) -> Result<R> {
        let mut component = self.component.borrow_mut();
        f(component.as_mut()).map_err(|source| Error::Hook {
            component: self.name(),
            hook,
            source,
        })
    }

    pub fn call_render(&self, props: &Props, state: &State, context: &Context) -> Result<VChild> {
        let rendered: RenderResult = self.component.borrow_mut().render(props, state, context);
        rendered.map_err(|source| Error::Render {
            component: self.name(),
            source,
        })
    }

    pub fn call_will_mount(&self) -> Result<()> {
        let current = self.snapshot();
        self.hook("will_mount", |c| c.will_mount(&current))
    }

    pub fn call_did_mount(&self) -> Result<()> {
        let current = self.snapshot();
        self.hook("did_mount", |c| c.did_mount(&current))
    }

    pub fn call_will_receive_props(&self, next_props: &Props, next_context: &Context) -> Result<()> {
        let current = self.snapshot();
        self.hook("will_receive_props", |c| {
            c.will_receive_props(&current, next_props, next_context)
        })
    }

    pub fn call_should_update(&self, current: &Snapshot, next: &Snapshot) -> Result<bool> {
        self.hook("should_update", |c| c.should_update(current, next))
    }

    pub fn call_will_update(&self, current: &Snapshot, next: &Snapshot) -> Result<()> {
        self.hook("will_update", |c| c.will_update(current, next))
    }

    pub fn call_did_update(&self, previous: &Snapshot, current: &Snapshot) -> Result<()> {
        self.hook("did_update", |c| c.did_update(previous, current))
    }

    pub fn call_will_unmount(&self) -> Result<()> {
        self.hook("will_unmount", |c| c.will_unmount())
    }

    pub fn call_child_context(&self, props: &Props, state: &State, context: &Context) -> Option<Attributes> {
        self.component.borrow().child_context(props, state, context)
    }
}
