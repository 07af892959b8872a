//! Render Scheduler - batches component re-renders.
//!
//! Any number of state changes between two flushes collapse into one render
//! per component. The first request after a flush hands a flush task to the
//! configured [`Defer`] implementation; the flush renders every instance that
//! is still dirty when it runs.
//!
//! # Deferral
//!
//! ```text
//! set_state ──► enqueue ──► (first since last flush?) ──► Defer::defer(flush task)
//!                                                              │
//!                 Renderer::tick / host event loop  ◄──────────┘
//! ```
//!
//! The default [`MicrotaskQueue`] holds tasks until [`crate::Renderer::tick`]
//! drains it. A host may install its own [`Defer`] to hook flushes into an
//! event loop; it must run tasks after the current call returns, never inline.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use log::{debug, trace};

use crate::component::{Instance, InstanceFlags};
use crate::error::{Error, Result};

/// Deferred unit of work.
pub type Task = Box<dyn FnOnce() -> Result<()>>;

/// Runs a task later, after the current call stack unwinds.
pub trait Defer {
    fn defer(&self, task: Task);
}

/// Order in which queued components render during a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushOrder {
    /// Most recently queued first.
    #[default]
    LastRequestedFirst,
    /// Oldest request first.
    FirstRequestedFirst,
}

// =============================================================================
// MicrotaskQueue
// =============================================================================

/// FIFO task queue drained on demand.
#[derive(Default)]
pub struct MicrotaskQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run tasks until none are left, including tasks queued by the tasks
    /// themselves. Stops at the first failing task; later tasks stay queued.
    pub fn run_until_idle(&self) -> Result<usize> {
        let mut ran = 0;
        loop {
            let Some(task) = self.tasks.borrow_mut().pop_front() else {
                return Ok(ran);
            };
            ran += 1;
            task()?;
        }
    }
}

impl Defer for MicrotaskQueue {
    fn defer(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// What the scheduler needs from the renderer that owns it.
pub(crate) trait Host {
    /// Render every queued instance that is still dirty.
    fn flush(&self) -> Result<()>;

    /// Render one instance now with `should_update` bypassed.
    /// Returns `Error::EngineBusy` when a render pass is in progress.
    fn force_render(&self, instance: &Rc<Instance>) -> Result<()>;
}

pub(crate) struct Scheduler {
    items: RefCell<Vec<Rc<Instance>>>,
    flush_scheduled: Cell<bool>,
    order: FlushOrder,
    defer: Rc<dyn Defer>,
    host: RefCell<Option<Weak<dyn Host>>>,
}

impl Scheduler {
    pub fn new(defer: Rc<dyn Defer>, order: FlushOrder) -> Self {
        Self {
            items: RefCell::new(Vec::new()),
            flush_scheduled: Cell::new(false),
            order,
            defer,
            host: RefCell::new(None),
        }
    }

    pub fn attach(&self, host: Weak<dyn Host>) {
        *self.host.borrow_mut() = Some(host);
    }

    pub fn order(&self) -> FlushOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Mark `instance` dirty and queue it. No-op if it is already dirty.
    pub fn enqueue(&self, instance: &Rc<Instance>) {
        if instance.is_dirty() {
            return;
        }
        instance.set_flag(InstanceFlags::DIRTY, true);
        self.items.borrow_mut().push(instance.clone());
        trace!("queued <{}>", instance.name());
        self.schedule();
    }

    /// Put back instances a failed flush did not reach.
    pub fn requeue(&self, rest: impl IntoIterator<Item = Rc<Instance>>) {
        let mut items = self.items.borrow_mut();
        let before = items.len();
        items.extend(rest.into_iter().filter(|i| i.is_dirty()));
        let added = items.len() - before;
        drop(items);
        if added > 0 {
            debug!("{added} render(s) carried over to the next flush");
            self.schedule();
        }
    }

    /// Take the queue, in processing order.
    pub fn take(&self) -> Vec<Rc<Instance>> {
        self.flush_scheduled.set(false);
        let mut items = std::mem::take(&mut *self.items.borrow_mut());
        if self.order == FlushOrder::LastRequestedFirst {
            items.reverse();
        }
        items
    }

    /// Forced render on behalf of an updater. Deferred to the next flush if
    /// the engine is mid-pass.
    pub fn force(&self, instance: &Rc<Instance>) -> Result<()> {
        let host = self.host().ok_or(Error::Detached)?;
        match host.force_render(instance) {
            Err(Error::EngineBusy) => {
                debug!("forced render of <{}> deferred", instance.name());
                instance.set_flag(InstanceFlags::FORCE, true);
                self.enqueue(instance);
                Ok(())
            }
            other => other,
        }
    }

    fn host(&self) -> Option<Rc<dyn Host>> {
        self.host.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn schedule(&self) {
        if self.flush_scheduled.replace(true) {
            return;
        }
        let host = self.host.borrow().clone();
        self.defer.defer(Box::new(move || match host.and_then(|h| h.upgrade()) {
            Some(host) => host.flush(),
            None => Ok(()),
        }));
    }
}
