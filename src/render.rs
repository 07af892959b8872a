//! Root entry point - the public face of the engine.
//!
//! A [`Renderer`] owns one backend and everything reconciliation needs. It is
//! a cheap handle: clones share the same engine.
//!
//! # Reentrancy
//!
//! User code never receives the engine. Component state changes go through
//! [`crate::Updater`], which queues work instead of rendering inside a pass.
//! Calling a `Renderer` method from inside a render pass (for example from a
//! lifecycle hook holding a renderer clone) returns [`Error::EngineBusy`].
//!
//! # Example
//!
//! ```
//! use spark_vdom::{attrs, children, h, MemoryBackend, Renderer};
//!
//! let mut backend = MemoryBackend::new();
//! let root = backend.create_container("root");
//! let renderer = Renderer::new(backend);
//!
//! renderer.mount(h("p", attrs! { "id" => "hello" }, children!["hi"]), root, None)?;
//! let markup = renderer.with_backend(|b| b.inner_markup(root))?;
//! assert_eq!(markup, r#"<p id="hello">hi</p>"#);
//! # Ok::<(), spark_vdom::Error>(())
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, trace};

use crate::backend::Backend;
use crate::component::{ComponentHandle, Context, Instance, RenderMode};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::reconciler::Engine;
use crate::scheduler::{Defer, FlushOrder, Host, MicrotaskQueue, Scheduler};
use crate::types::{Event, NodeId, Value};
use crate::vnode::VChild;

struct Shared<B> {
    engine: RefCell<Engine<B>>,
    scheduler: Rc<Scheduler>,
    microtasks: Rc<MicrotaskQueue>,
}

impl<B: Backend> Shared<B> {
    /// Run `f` on the engine, resetting pass state if it fails.
    fn run<R>(&self, f: impl FnOnce(&mut Engine<B>) -> Result<R>) -> Result<R> {
        let mut engine = self.engine.try_borrow_mut().map_err(|_| Error::EngineBusy)?;
        let result = f(&mut engine);
        if result.is_err() {
            engine.abort_pass();
        }
        result
    }
}

impl<B: Backend> Host for Shared<B> {
    fn flush(&self) -> Result<()> {
        let mut pending = self.scheduler.take().into_iter();
        while let Some(instance) = pending.next() {
            if !instance.is_dirty() {
                continue;
            }
            let mode = if instance.is_forced() { RenderMode::Force } else { RenderMode::Scheduled };
            let result = self.run(|engine| engine.render_component(&instance, mode, false, false));
            if let Err(err) = result {
                if matches!(err, Error::EngineBusy) {
                    self.scheduler.requeue(std::iter::once(instance));
                }
                self.scheduler.requeue(pending);
                return Err(err);
            }
        }
        Ok(())
    }

    fn force_render(&self, instance: &Rc<Instance>) -> Result<()> {
        self.run(|engine| engine.render_component(instance, RenderMode::Force, false, false))
    }
}

/// Handle to a reconciliation engine rendering into a backend.
pub struct Renderer<B> {
    shared: Rc<Shared<B>>,
}

impl<B> Clone for Renderer<B> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<B: Backend + 'static> Renderer<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, Options::default())
    }

    pub fn with_options(backend: B, options: Options) -> Self {
        let microtasks = Rc::new(MicrotaskQueue::new());
        let defer: Rc<dyn Defer> = match &options.defer {
            Some(defer) => defer.clone(),
            None => microtasks.clone() as Rc<dyn Defer>,
        };
        let scheduler = Rc::new(Scheduler::new(defer, options.flush_order));
        let shared = Rc::new(Shared {
            engine: RefCell::new(Engine::new(backend, options, scheduler.clone())),
            scheduler,
            microtasks,
        });

        let weak: Weak<Shared<B>> = Rc::downgrade(&shared);
        let host: Weak<dyn Host> = weak;
        shared.scheduler.attach(host);

        Self { shared }
    }

    /// Render `vnode` into `container`.
    ///
    /// With `existing`, that node (typically a previous return value of
    /// `mount`) is reconciled in place; a node the engine has never seen is
    /// adopted and its attributes are taken as already applied. Returns the
    /// root of the rendered tree. Every component first mounted by this call
    /// has received `did_mount` when it returns.
    pub fn mount(&self, vnode: impl Into<VChild>, container: NodeId, existing: Option<NodeId>) -> Result<NodeId> {
        let vnode = vnode.into();
        let root = self.shared.run(|engine| {
            engine.diff(existing, &vnode, &Context::default(), false, Some(container), false)
        })?;
        debug!("mounted {root} into {container}");
        Ok(root)
    }

    /// Tear down a tree previously returned by [`Renderer::mount`]: unmount
    /// its components and detach it from its parent.
    pub fn unmount(&self, root: NodeId) -> Result<()> {
        self.shared.run(|engine| {
            engine.recollect_node_tree(root, false)?;
            engine.backend.remove_node(root);
            Ok(())
        })
    }

    /// Render every queued component now instead of waiting for the
    /// scheduled flush.
    pub fn rerender(&self) -> Result<()> {
        self.shared.flush()
    }

    /// Drain the built-in microtask queue, running scheduled flushes.
    /// Returns the number of tasks run. Does nothing useful when a custom
    /// [`Defer`] is configured.
    pub fn tick(&self) -> Result<usize> {
        let ran = self.shared.microtasks.run_until_idle()?;
        if ran > 0 {
            trace!("tick ran {ran} task(s)");
        }
        Ok(ran)
    }

    /// Components waiting for the next flush.
    pub fn pending_renders(&self) -> usize {
        self.shared.scheduler.len()
    }

    pub fn flush_order(&self) -> FlushOrder {
        self.shared.scheduler.order()
    }

    /// Outermost component whose root is `node`.
    pub fn component_at(&self, node: NodeId) -> Result<Option<ComponentHandle>> {
        let engine = self.shared.engine.try_borrow().map_err(|_| Error::EngineBusy)?;
        Ok(engine.owner(node).map(|instance| instance.handle()))
    }

    /// Nodes the engine keeps metadata for: live managed nodes plus pooled
    /// component roots.
    pub fn tracked_nodes(&self) -> Result<usize> {
        let engine = self.shared.engine.try_borrow().map_err(|_| Error::EngineBusy)?;
        Ok(engine.tracked_nodes())
    }

    pub fn with_backend<R>(&self, f: impl FnOnce(&B) -> R) -> Result<R> {
        let engine = self.shared.engine.try_borrow().map_err(|_| Error::EngineBusy)?;
        Ok(f(&engine.backend))
    }

    /// Mutate the backend outside the reconciler, e.g. to simulate user
    /// input changing a live property.
    pub fn with_backend_mut<R>(&self, f: impl FnOnce(&mut B) -> R) -> Result<R> {
        let mut engine = self.shared.engine.try_borrow_mut().map_err(|_| Error::EngineBusy)?;
        Ok(f(&mut engine.backend))
    }

    /// Invoke the listener registered for `event` on `node`. Returns whether
    /// one was found. The engine is released before the listener runs, so
    /// listeners may update component state freely.
    pub fn dispatch_event(&self, node: NodeId, event: &str, detail: Value) -> Result<bool> {
        let Some(listener) = self.with_backend(|b| b.listener(node, event))? else {
            return Ok(false);
        };
        listener.call(&Event {
            name: event.to_string(),
            target: node,
            detail,
        });
        Ok(true)
    }
}

impl<B> fmt::Debug for Renderer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("pending_renders", &self.shared.scheduler.len())
            .field("pending_tasks", &self.shared.microtasks.len())
            .finish()
    }
}
