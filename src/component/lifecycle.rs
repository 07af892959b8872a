//! Component Lifecycle Manager.
//!
//! Drives instances through props application, rendering, nesting and
//! teardown. Everything here runs inside a render pass with the engine
//! borrowed; user code only ever sees cloned values and its own `&mut self`.
//!
//! # Higher-order chains
//!
//! A component whose render returns another component's node passes its
//! output through: it keeps the inner instance as `child`, the inner one
//! points back through `parent`, and every instance in the chain shares the
//! same `base`. The live root node is owned by the outermost instance.

use std::rc::Rc;

use log::{debug, trace};

use super::{ComponentType, Context, Instance, InstanceFlags, Props, RenderMode};
use crate::backend::Backend;
use crate::error::Result;
use crate::reconciler::Engine;
use crate::types::{NodeId, RefTarget};
use crate::vnode::{Tag, VChild, VNode};

impl<B: Backend> Engine<B> {
    /// New instance of `ty`, inheriting the root node of a pooled instance
    /// of the same type when one exists.
    pub(crate) fn create_component(&mut self, ty: &ComponentType, props: &Props, context: &Context) -> Rc<Instance> {
        let instance = Instance::new(ty, props, context, Rc::downgrade(&self.scheduler));
        if let Some(next_base) = self.recycler.take(ty.type_key()) {
            trace!("<{}> reuses a pooled root {next_base}", ty.name());
            instance.core_mut().next_base = Some(next_base);
        }
        instance
    }

    /// Hand new props and context to an instance, then render according to `mode`.
    pub(crate) fn set_component_props(
        &mut self,
        instance: &Rc<Instance>,
        mut props: Props,
        mode: RenderMode,
        context: &Context,
        mount_all: bool,
    ) -> Result<()> {
        if instance.is_disabled() {
            return Ok(());
        }

        instance.set_flag(InstanceFlags::DISABLED, true);
        let hooks = self.apply_props(instance, &mut props, context, mount_all);
        instance.set_flag(InstanceFlags::DISABLED, false);
        hooks?;

        match mode {
            RenderMode::None => {}
            RenderMode::Sync | RenderMode::Force => self.render_component(instance, RenderMode::Sync, mount_all, false)?,
            RenderMode::Scheduled => {
                if self.options.sync_component_updates || instance.base().is_none() {
                    self.render_component(instance, RenderMode::Sync, mount_all, false)?;
                } else {
                    self.scheduler.enqueue(instance);
                }
            }
        }

        let node_ref = instance.core().node_ref.clone();
        if let Some(node_ref) = node_ref {
            node_ref.call(Some(RefTarget::Component(instance.handle())));
        }
        Ok(())
    }

    fn apply_props(&mut self, instance: &Rc<Instance>, props: &mut Props, context: &Context, mount_all: bool) -> Result<()> {
        let (node_ref, key) = props.take_identity();
        let mounted = {
            let mut core = instance.core_mut();
            core.node_ref = node_ref;
            core.key = key;
            core.base.is_some()
        };

        if !mounted || mount_all {
            instance.call_will_mount()?;
        } else if *props != instance.core().props {
            instance.call_will_receive_props(props, context)?;
        }

        let mut core = instance.core_mut();
        if !context.same(&core.context) {
            if core.prev_context.is_none() {
                core.prev_context = Some(core.context.clone());
            }
            core.context = context.clone();
        }
        let previous = std::mem::replace(&mut core.props, props.clone());
        if core.prev_props.is_none() {
            core.prev_props = Some(previous);
        }
        Ok(())
    }

    /// Render an instance and commit its output.
    ///
    /// `is_child` marks the inner render of a newly created higher-order
    /// child; its caller propagates the base and flushes mounts.
    pub(crate) fn render_component(
        &mut self,
        instance: &Rc<Instance>,
        mode: RenderMode,
        mount_all: bool,
        is_child: bool,
    ) -> Result<()> {
        if instance.is_disabled() {
            return Ok(());
        }

        let next = instance.snapshot();
        let previous = instance.previous_snapshot();
        let (is_update, next_base, initial_child) = {
            let core = instance.core();
            (core.base.is_some(), core.next_base, core.child.clone())
        };
        let initial_base = instance.base().or(next_base);

        let skip = if is_update {
            let render = match mode {
                RenderMode::Force => Ok(true),
                _ => instance.call_should_update(&previous, &next),
            };
            let gate = render.and_then(|render| {
                if render {
                    instance.call_will_update(&previous, &next).map(|()| false)
                } else {
                    Ok(true)
                }
            });
            match gate {
                Ok(skip) => skip,
                Err(err) => {
                    // Nothing requeues a failed instance; later updates must be able to.
                    instance.set_flag(InstanceFlags::DIRTY, false);
                    instance.set_flag(InstanceFlags::FORCE, false);
                    return Err(err);
                }
            }
        } else {
            false
        };

        // will_update may have changed the state
        let current = instance.snapshot();
        {
            let mut core = instance.core_mut();
            core.prev_props = None;
            core.prev_state = None;
            core.prev_context = None;
            core.next_base = None;
        }
        instance.set_flag(InstanceFlags::DIRTY, false);
        instance.set_flag(InstanceFlags::FORCE, false);

        if !skip {
            trace!("render <{}>", instance.name());
            let rendered = instance.call_render(&current.props, &current.state, &current.context)?;
            let context = match instance.call_child_context(&current.props, &current.state, &current.context) {
                Some(extra) => current.context.extend(extra),
                None => current.context.clone(),
            };

            let inner_type = match &rendered {
                VChild::Node(VNode { tag: Tag::Component(ty), .. }) => Some(ty.clone()),
                _ => None,
            };

            let mut to_unmount: Option<Rc<Instance>> = None;
            let mut inner: Option<Rc<Instance>> = None;
            let base: Option<NodeId>;

            if let (Some(ty), VChild::Node(vnode)) = (inner_type, &rendered) {
                let child_props = ty.props_from_vnode(vnode);
                let child_key = child_props.key();

                match &initial_child {
                    Some(child) if *child.ty() == ty && child_key == child.key() => {
                        self.set_component_props(child, child_props, RenderMode::Sync, &context, false)?;
                        inner = Some(child.clone());
                    }
                    _ => {
                        to_unmount = initial_child.clone();
                        let child = self.create_component(&ty, &child_props, &context);
                        {
                            let mut core = child.core_mut();
                            core.next_base = core.next_base.or(next_base);
                            core.parent = Rc::downgrade(instance);
                        }
                        instance.core_mut().child = Some(child.clone());
                        self.set_component_props(&child, child_props, RenderMode::None, &context, false)?;
                        self.render_component(&child, RenderMode::Sync, mount_all, true)?;
                        inner = Some(child);
                    }
                }
                base = inner.as_ref().and_then(|c| c.base());
            } else {
                let mut cbase = initial_base;
                if let Some(previous_child) = initial_child.clone() {
                    to_unmount = Some(previous_child);
                    cbase = None;
                    instance.core_mut().child = None;
                }

                if initial_base.is_some() || mode == RenderMode::Sync {
                    if let Some(cbase) = cbase {
                        self.clear_owner(cbase);
                    }
                    let parent = initial_base.and_then(|b| self.backend.parent(b));
                    base = Some(self.diff(cbase, &rendered, &context, mount_all || !is_update, parent, true)?);
                } else {
                    base = None;
                }
            }

            if let (Some(initial), Some(new_base)) = (initial_base, base) {
                let same_inner = match (&inner, &initial_child) {
                    (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                    _ => false,
                };
                if new_base != initial && !same_inner {
                    match self.backend.parent(initial) {
                        Some(parent) if parent != new_base => {
                            self.backend.replace_child(parent, new_base, initial);
                            if to_unmount.is_none() {
                                self.clear_owner(initial);
                                self.recollect_node_tree(initial, false)?;
                            }
                        }
                        Some(_) => {}
                        // a pooled root handed down to a new inner component that had its own
                        None if inner.is_some() && to_unmount.is_none() => self.forget_tree(initial),
                        None => {}
                    }
                }
            }

            if let Some(stale) = to_unmount {
                self.unmount_component(&stale)?;
            }

            instance.core_mut().base = base;
            if let (Some(base), false) = (base, is_child) {
                let mut owner = instance.clone();
                let mut cursor = instance.parent();
                while let Some(parent) = cursor {
                    parent.core_mut().base = Some(base);
                    cursor = parent.parent();
                    owner = parent;
                }
                self.set_owner(base, &owner);
            }
        }

        if !is_update || mount_all {
            self.mounts.push_back(instance.clone());
        } else if !skip {
            let now = instance.snapshot();
            instance.call_did_update(&previous, &now)?;
            if let Some(observer) = &self.options.after_update {
                observer(&instance.handle());
            }
        }

        while let Some(callback) = instance.pop_callback() {
            callback();
        }

        if self.diff_level == 0 && !is_child {
            self.flush_mounts()?;
        }
        Ok(())
    }

    /// Reconcile a component-tagged virtual node against `dom`.
    pub(crate) fn build_component_from_vnode(
        &mut self,
        dom: Option<NodeId>,
        ty: &ComponentType,
        vnode: &VNode,
        context: &Context,
        mount_all: bool,
    ) -> Result<NodeId> {
        let original = dom.and_then(|d| self.owner(d));
        let is_direct_owner = original.is_some() && dom.and_then(|d| self.owner_type(d)).as_ref() == Some(ty);

        let mut is_owner = is_direct_owner;
        let mut found = original.clone();
        while !is_owner {
            let Some(current) = found else { break };
            found = current.parent();
            is_owner = found.as_ref().is_some_and(|p| p.ty() == ty);
        }

        let props = ty.props_from_vnode(vnode);
        let out = match found {
            Some(owner) if is_owner && (!mount_all || owner.child().is_some()) => {
                self.set_component_props(&owner, props, RenderMode::Scheduled, context, mount_all)?;
                owner.base()
            }
            _ => {
                let mut dom = dom;
                let mut old_dom = dom;
                if let Some(original) = original.filter(|_| !is_direct_owner) {
                    self.unmount_component(&original)?;
                    dom = None;
                    old_dom = None;
                }

                let instance = self.create_component(ty, &props, context);
                if let Some(node) = dom {
                    if instance.core().next_base.is_none() {
                        instance.core_mut().next_base = Some(node);
                        old_dom = None;
                    }
                }
                self.set_component_props(&instance, props, RenderMode::Sync, context, mount_all)?;

                let base = instance.base();
                if let Some(old) = old_dom {
                    if base != Some(old) {
                        self.clear_owner(old);
                        self.recollect_node_tree(old, false)?;
                    }
                }
                base
            }
        };

        match out {
            Some(node) => Ok(node),
            None => {
                debug!("<{}> has no committed root yet; using an empty placeholder", ty.name());
                let placeholder = self.backend.create_text("");
                self.meta_mut(placeholder).props = Some(Default::default());
                Ok(placeholder)
            }
        }
    }

    /// Tear down an instance and, through its child link or its base, the
    /// whole subtree it rendered.
    pub(crate) fn unmount_component(&mut self, instance: &Rc<Instance>) -> Result<()> {
        if let Some(observer) = &self.options.before_unmount {
            observer(&instance.handle());
        }
        trace!("unmount <{}>", instance.name());

        let base = instance.base();
        instance.set_flag(InstanceFlags::DISABLED, true);
        instance.set_flag(InstanceFlags::DIRTY, false);
        instance.call_will_unmount()?;
        instance.core_mut().base = None;

        if let Some(inner) = instance.child() {
            self.unmount_component(&inner)?;
        } else if let Some(base) = base {
            self.call_node_ref(base);
            self.clear_owner(base);
            self.backend.remove_node(base);
            self.recycler.collect(instance.ty().type_key(), base);
            self.release_children(base, false)?;
        }

        let node_ref = instance.core().node_ref.clone();
        if let Some(node_ref) = node_ref {
            node_ref.call(None);
        }
        Ok(())
    }
}
