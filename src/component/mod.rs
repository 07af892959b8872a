//! Components - stateful units that render virtual nodes.
//!
//! A component is any type implementing [`Component`]. Only `render` is
//! required; every lifecycle hook has a no-op default, so the lifecycle
//! manager calls what a component provides without caring what it is.
//!
//! # Lifecycle
//!
//! ```text
//! first mount:  will_mount -> render -> did_mount (after all descendants)
//! update:       will_receive_props -> should_update -> will_update -> render -> did_update
//! teardown:     will_unmount
//! ```
//!
//! # Example
//!
//! ```
//! use spark_vdom::{
//!     attrs, children, h, Component, ComponentType, Context, Create, Props, RenderResult, State,
//!     Updater,
//! };
//!
//! struct Counter {
//!     updater: Updater,
//! }
//!
//! impl Create for Counter {
//!     fn create(_: &Props, _: &Context, updater: Updater) -> Self {
//!         Self { updater }
//!     }
//! }
//!
//! impl Component for Counter {
//!     fn render(&mut self, props: &Props, state: &State, _: &Context) -> RenderResult {
//!         let count = state.get("count").and_then(|v| v.as_int()).unwrap_or(0);
//!         let label = props.get("label").and_then(|v| v.as_str()).unwrap_or("count");
//!         Ok(h("span", attrs! {}, children![format!("{label}: {count}")]).into())
//!     }
//! }
//!
//! let counter = ComponentType::of::<Counter>();
//! let node = h(&counter, attrs! { "label" => "clicks" }, children![]);
//! assert!(node.is_component());
//! ```

mod instance;
mod lifecycle;
mod recycler;

pub(crate) use instance::{Instance, InstanceFlags, RenderMode};
pub(crate) use recycler::Recycler;

use std::any::{Any, TypeId};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::error::{BoxError, Result};
use crate::scheduler::Scheduler;
use crate::types::{Attributes, Key, NodeId, NodeRef, Value};
use crate::vnode::{KEY, REF, VChild, VNode};

/// What `render` returns.
pub type RenderResult = std::result::Result<VChild, BoxError>;

/// What lifecycle hooks return.
pub type HookResult = std::result::Result<(), BoxError>;

// =============================================================================
// Props / State / Context
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
struct PropsInner {
    attributes: Attributes,
    children: Vec<VChild>,
}

/// Properties handed to a component: the attributes of its virtual node plus
/// the node's children. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Props(Rc<PropsInner>);

impl Props {
    pub fn new(attributes: Attributes, children: Vec<VChild>) -> Self {
        Self(Rc::new(PropsInner { attributes, children }))
    }

    pub fn attributes(&self) -> &Attributes {
        &self.0.attributes
    }

    pub fn children(&self) -> &[VChild] {
        &self.0.children
    }

    /// Key carried by the props, before identity attributes are stripped.
    pub(crate) fn key(&self) -> Option<Key> {
        self.0.attributes.get(KEY).and_then(Key::from_value)
    }

    /// Remove `ref` and `key`, returning them.
    pub(crate) fn take_identity(&mut self) -> (Option<NodeRef>, Option<Key>) {
        if !self.0.attributes.contains_key(REF) && !self.0.attributes.contains_key(KEY) {
            return (None, None);
        }
        let inner = Rc::make_mut(&mut self.0);
        let node_ref = inner
            .attributes
            .shift_remove(REF)
            .and_then(|v| v.as_ref_callback().cloned());
        let key = inner
            .attributes
            .shift_remove(KEY)
            .and_then(|v| Key::from_value(&v));
        (node_ref, key)
    }
}

impl Deref for Props {
    type Target = Attributes;

    fn deref(&self) -> &Attributes {
        &self.0.attributes
    }
}

/// Component-local state. Updated by merging partial maps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct State(Rc<Attributes>);

impl State {
    pub fn new(values: Attributes) -> Self {
        Self(Rc::new(values))
    }

    /// Merge `partial` over the current values; later keys win.
    pub fn merge(&mut self, partial: Attributes) {
        if partial.is_empty() {
            return;
        }
        let values = Rc::make_mut(&mut self.0);
        for (name, value) in partial {
            values.insert(name, value);
        }
    }
}

impl Deref for State {
    type Target = Attributes;

    fn deref(&self) -> &Attributes {
        &self.0
    }
}

/// Values passed implicitly down the tree. Extended by
/// [`Component::child_context`]; compared by identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Context(Rc<Attributes>);

impl Context {
    pub fn new(values: Attributes) -> Self {
        Self(Rc::new(values))
    }

    /// A new context with `extra` layered over this one.
    pub fn extend(&self, extra: Attributes) -> Self {
        let mut values = (*self.0).clone();
        values.extend(extra);
        Self(Rc::new(values))
    }

    /// Whether both handles refer to the same context object.
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Context {
    type Target = Attributes;

    fn deref(&self) -> &Attributes {
        &self.0
    }
}

/// Props, state and context as seen at one point of the lifecycle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub props: Props,
    pub state: State,
    pub context: Context,
}

// =============================================================================
// Component trait
// =============================================================================

/// Upcast helper so handles can hand out typed references.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A stateful unit that renders virtual nodes.
///
/// Hooks that observe a transition receive the values the component is
/// currently showing (`current`) alongside the incoming ones (`next`).
/// Any hook error aborts the render pass and is returned to its caller.
#[allow(unused_variables)]
pub trait Component: AsAny + 'static {
    fn render(&mut self, props: &Props, state: &State, context: &Context) -> RenderResult;

    /// State the instance starts with. Read once, right after construction.
    fn initial_state(&self) -> Attributes {
        Attributes::new()
    }

    /// Before the first render.
    fn will_mount(&mut self, current: &Snapshot) -> HookResult {
        Ok(())
    }

    /// After the first render, once every descendant has mounted.
    fn did_mount(&mut self, current: &Snapshot) -> HookResult {
        Ok(())
    }

    /// A mounted component is about to receive props that differ from its current ones.
    fn will_receive_props(&mut self, current: &Snapshot, next_props: &Props, next_context: &Context) -> HookResult {
        Ok(())
    }

    /// Return `false` to skip this render. Bypassed by forced renders.
    fn should_update(&mut self, current: &Snapshot, next: &Snapshot) -> std::result::Result<bool, BoxError> {
        Ok(true)
    }

    fn will_update(&mut self, current: &Snapshot, next: &Snapshot) -> HookResult {
        Ok(())
    }

    fn did_update(&mut self, previous: &Snapshot, current: &Snapshot) -> HookResult {
        Ok(())
    }

    fn will_unmount(&mut self) -> HookResult {
        Ok(())
    }

    /// Values to add to the context seen by descendants.
    fn child_context(&self, props: &Props, state: &State, context: &Context) -> Option<Attributes> {
        None
    }
}

/// Construction of a component instance from its first props.
pub trait Create: Component + Sized {
    fn create(props: &Props, context: &Context, updater: Updater) -> Self;
}

/// Render function of a function component.
pub type RenderFn = Rc<dyn Fn(&Props, &Context) -> RenderResult>;

/// Backing instance for function components.
struct FunctionComponent {
    render: RenderFn,
}

impl Component for FunctionComponent {
    fn render(&mut self, props: &Props, _state: &State, context: &Context) -> RenderResult {
        (self.render)(props, context)
    }
}

// =============================================================================
// ComponentType
// =============================================================================

/// Exact identity of a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    /// A struct implementing [`Create`].
    Type(TypeId),
    /// A function component whose render function has a type of its own
    /// (a function item or a non-capturing closure).
    Function(TypeId),
    /// A function component built from a function pointer or a capturing
    /// closure. Numbered per [`ComponentType::function`] call.
    Allocated(u64),
}

static NEXT_ALLOCATED: AtomicU64 = AtomicU64::new(0);

type Constructor = Rc<dyn Fn(&Props, &Context, Updater) -> Box<dyn Component>>;

struct TypeDef {
    key: TypeKey,
    name: &'static str,
    construct: Constructor,
    default_props: Attributes,
}

/// Reference to a component factory, used as a virtual node tag.
///
/// Two `ComponentType`s are equal when they build the same Rust type (or wrap
/// the same function), regardless of name.
#[derive(Clone)]
pub struct ComponentType(Rc<TypeDef>);

impl ComponentType {
    /// Component type for a struct implementing [`Create`].
    pub fn of<C: Create>() -> Self {
        let full = std::any::type_name::<C>();
        let name = full.rsplit("::").next().unwrap_or(full);
        Self(Rc::new(TypeDef {
            key: TypeKey::Type(TypeId::of::<C>()),
            name,
            construct: Rc::new(|props, context, updater| Box::new(C::create(props, context, updater))),
            default_props: Attributes::new(),
        }))
    }

    /// Component type for a plain render function.
    ///
    /// Wrapping the same function item twice yields equal types. A function
    /// pointer or a capturing closure has no type of its own, so each call
    /// yields a distinct type; clone the result to share it.
    pub fn function<F>(name: &'static str, render: F) -> Self
    where
        F: Fn(&Props, &Context) -> RenderResult + 'static,
    {
        let key = if std::mem::size_of::<F>() == 0 {
            TypeKey::Function(TypeId::of::<F>())
        } else {
            TypeKey::Allocated(NEXT_ALLOCATED.fetch_add(1, Ordering::Relaxed))
        };
        let render: RenderFn = Rc::new(render);
        Self(Rc::new(TypeDef {
            key,
            name,
            construct: Rc::new(move |_, _, _| Box::new(FunctionComponent { render: render.clone() })),
            default_props: Attributes::new(),
        }))
    }

    /// Attribute values used when a virtual node omits them.
    pub fn with_default_props(self, default_props: Attributes) -> Self {
        Self(Rc::new(TypeDef {
            key: self.0.key,
            name: self.0.name,
            construct: self.0.construct.clone(),
            default_props,
        }))
    }

    pub fn name(&self) -> &'static str {
        self.0.name
    }

    pub fn type_key(&self) -> TypeKey {
        self.0.key
    }

    pub fn default_props(&self) -> &Attributes {
        &self.0.default_props
    }

    pub(crate) fn construct(&self, props: &Props, context: &Context, updater: Updater) -> Box<dyn Component> {
        (self.0.construct)(props, context, updater)
    }

    /// Props for a component-tagged node: its attributes, its children, and
    /// defaults for attributes it does not set.
    pub(crate) fn props_from_vnode(&self, vnode: &VNode) -> Props {
        let mut attributes = vnode.attributes.clone();
        for (name, value) in &self.0.default_props {
            if !attributes.contains_key(name) {
                attributes.insert(name.clone(), value.clone());
            }
        }
        Props::new(attributes, vnode.children.clone())
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentType").field(&self.0.name).finish()
    }
}

// =============================================================================
// Updater
// =============================================================================

/// A change to component state.
pub(crate) enum StateUpdate {
    Merge(Attributes),
    Apply(Box<dyn FnOnce(&State, &Props) -> Attributes>),
}

/// Handle a component uses to change its own state or re-render itself.
///
/// State changes are merged immediately, so [`ComponentHandle::state`] sees
/// them at once; the render they request is queued. Updates to a dropped
/// component are ignored.
#[derive(Clone)]
pub struct Updater {
    instance: Weak<Instance>,
    scheduler: Weak<Scheduler>,
}

impl Updater {
    pub(crate) fn new(instance: Weak<Instance>, scheduler: Weak<Scheduler>) -> Self {
        Self { instance, scheduler }
    }

    /// Merge `partial` into the state and schedule a render.
    pub fn set_state(&self, partial: Attributes) {
        self.push(StateUpdate::Merge(partial), None);
    }

    /// Like [`Updater::set_state`], running `callback` after the render commits.
    pub fn set_state_then(&self, partial: Attributes, callback: impl FnOnce() + 'static) {
        self.push(StateUpdate::Merge(partial), Some(Box::new(callback)));
    }

    /// Compute a partial from the current state and props.
    pub fn update_state(&self, f: impl FnOnce(&State, &Props) -> Attributes + 'static) {
        self.push(StateUpdate::Apply(Box::new(f)), None);
    }

    /// Like [`Updater::update_state`], running `callback` after the render commits.
    pub fn update_state_then(
        &self,
        f: impl FnOnce(&State, &Props) -> Attributes + 'static,
        callback: impl FnOnce() + 'static,
    ) {
        self.push(StateUpdate::Apply(Box::new(f)), Some(Box::new(callback)));
    }

    /// Re-render now, bypassing `should_update`. Inside a render pass the
    /// request is deferred to the next flush instead.
    pub fn force_render(&self) -> Result<()> {
        self.force(None)
    }

    /// Like [`Updater::force_render`], running `callback` after the render commits.
    pub fn force_render_then(&self, callback: impl FnOnce() + 'static) -> Result<()> {
        self.force(Some(Box::new(callback)))
    }

    /// Handle to the instance, while it is alive.
    pub fn handle(&self) -> Option<ComponentHandle> {
        self.instance.upgrade().map(ComponentHandle)
    }

    fn push(&self, update: StateUpdate, callback: Option<Box<dyn FnOnce()>>) {
        let Some(instance) = self.instance.upgrade() else {
            debug!("state update for a dropped component ignored");
            return;
        };
        instance.apply_state(update);
        if let Some(callback) = callback {
            instance.push_callback(callback);
        }
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.enqueue(&instance);
        }
    }

    fn force(&self, callback: Option<Box<dyn FnOnce()>>) -> Result<()> {
        let Some(instance) = self.instance.upgrade() else {
            return Ok(());
        };
        if let Some(callback) = callback {
            instance.push_callback(callback);
        }
        let scheduler = self.scheduler.upgrade().ok_or(crate::Error::Detached)?;
        scheduler.force(&instance)
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance.upgrade() {
            Some(instance) => write!(f, "Updater(<{}>)", instance.ty().name()),
            None => f.write_str("Updater(dropped)"),
        }
    }
}

// =============================================================================
// ComponentHandle
// =============================================================================

/// Shared handle to a live component instance.
#[derive(Clone)]
pub struct ComponentHandle(pub(crate) Rc<Instance>);

impl ComponentHandle {
    pub fn component_type(&self) -> &ComponentType {
        self.0.ty()
    }

    pub fn name(&self) -> &'static str {
        self.0.ty().name()
    }

    /// Root node of the last committed render.
    pub fn base(&self) -> Option<NodeId> {
        self.0.base()
    }

    pub fn is_mounted(&self) -> bool {
        self.0.base().is_some()
    }

    /// Queued or currently rendering.
    pub fn is_dirty(&self) -> bool {
        self.0.is_dirty()
    }

    pub fn props(&self) -> Props {
        self.0.snapshot().props
    }

    pub fn state(&self) -> State {
        self.0.snapshot().state
    }

    pub fn context(&self) -> Context {
        self.0.snapshot().context
    }

    /// Nested component this one passes its output through to.
    pub fn child(&self) -> Option<ComponentHandle> {
        self.0.child().map(ComponentHandle)
    }

    pub fn updater(&self) -> Updater {
        self.0.updater()
    }

    /// Borrow the component as its concrete type. `None` if the type does
    /// not match or the component is busy inside one of its own hooks.
    pub fn with<C: Component, R>(&self, f: impl FnOnce(&C) -> R) -> Option<R> {
        let component = self.0.component().try_borrow().ok()?;
        let typed = (**component).as_any().downcast_ref::<C>()?;
        Some(f(typed))
    }

    /// Mutable variant of [`ComponentHandle::with`].
    pub fn with_mut<C: Component, R>(&self, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        let mut component = self.0.component().try_borrow_mut().ok()?;
        let typed = (**component).as_any_mut().downcast_mut::<C>()?;
        Some(f(typed))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("type", &self.name())
            .field("base", &self.base())
            .finish()
    }
}

impl From<ComponentHandle> for Value {
    fn from(handle: ComponentHandle) -> Self {
        Value::any(handle)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attrs, children, h};

    struct Plain;

    impl Create for Plain {
        fn create(_: &Props, _: &Context, _: Updater) -> Self {
            Plain
        }
    }

    impl Component for Plain {
        fn render(&mut self, _: &Props, _: &State, _: &Context) -> RenderResult {
            Ok(VChild::Empty)
        }
    }

    fn one(_: &Props, _: &Context) -> RenderResult {
        Ok("one".into())
    }

    fn two(_: &Props, _: &Context) -> RenderResult {
        Ok("two".into())
    }

    fn twin_a(_: &Props, _: &Context) -> RenderResult {
        Ok("twin".into())
    }

    fn twin_b(_: &Props, _: &Context) -> RenderResult {
        Ok("twin".into())
    }

    #[test]
    fn test_type_identity() {
        assert_eq!(ComponentType::of::<Plain>(), ComponentType::of::<Plain>());
        assert_eq!(ComponentType::of::<Plain>().name(), "Plain");

        // same name, different functions: distinct types
        assert_ne!(ComponentType::function("Same", one), ComponentType::function("Same", two));
        assert_eq!(ComponentType::function("A", one), ComponentType::function("B", one));
        assert_ne!(ComponentType::function("Plain", one), ComponentType::of::<Plain>());

        // identical bodies are still different functions
        assert_ne!(ComponentType::function("Twin", twin_a), ComponentType::function("Twin", twin_b));
    }

    #[test]
    fn test_pointer_function_identity_is_per_call() {
        let pointer: fn(&Props, &Context) -> RenderResult = one;
        let wrapped = ComponentType::function("Pointer", pointer);
        assert_ne!(wrapped, ComponentType::function("Pointer", pointer));
        assert_eq!(wrapped, wrapped.clone());
        assert_eq!(wrapped, wrapped.clone().with_default_props(attrs! { "a" => 1 }));

        let label = String::from("captured");
        let capturing = ComponentType::function("Capturing", move |_, _| Ok(label.as_str().into()));
        assert!(matches!(capturing.type_key(), TypeKey::Allocated(_)));
        assert!(matches!(ComponentType::function("Item", one).type_key(), TypeKey::Function(_)));
    }

    #[test]
    fn test_props_from_vnode_applies_defaults() {
        let ty = ComponentType::of::<Plain>().with_default_props(attrs! { "size" => 3, "label" => "x" });
        let node = h(&ty, attrs! { "label" => "given" }, children!["c"]);
        let props = ty.props_from_vnode(&node);
        assert_eq!(props.get("size"), Some(&Value::from(3)));
        assert_eq!(props.get("label"), Some(&Value::from("given")));
        assert_eq!(props.children(), &[VChild::from("c")]);
    }

    #[test]
    fn test_take_identity_strips_ref_and_key() {
        let node_ref = NodeRef::new(|_| {});
        let mut props = Props::new(attrs! { "key" => "k", "ref" => node_ref.clone(), "a" => 1 }, vec![]);
        let (taken_ref, key) = props.take_identity();
        assert!(taken_ref.is_some_and(|r| r.ptr_eq(&node_ref)));
        assert_eq!(key, Some(Key::from("k")));
        assert_eq!(props.len(), 1);
        assert!(props.get("a").is_some());
    }

    #[test]
    fn test_state_merge_later_wins() {
        let mut state = State::new(attrs! { "a" => 1, "b" => 2 });
        let before = state.clone();
        state.merge(attrs! { "b" => 3, "c" => 4 });
        assert_eq!(state.get("a"), Some(&Value::from(1)));
        assert_eq!(state.get("b"), Some(&Value::from(3)));
        assert_eq!(state.get("c"), Some(&Value::from(4)));
        // copy on write: earlier snapshots are untouched
        assert_eq!(before.get("b"), Some(&Value::from(2)));
    }

    #[test]
    fn test_context_extend_is_new_identity() {
        let root = Context::new(attrs! { "theme" => "dark" });
        let child = root.extend(attrs! { "lang" => "en" });
        assert!(!root.same(&child));
        assert!(root.same(&root.clone()));
        assert_eq!(child.get("theme"), Some(&Value::from("dark")));
        assert_eq!(child.get("lang"), Some(&Value::from("en")));
    }
}
