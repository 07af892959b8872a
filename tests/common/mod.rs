//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use spark_vdom::{MemoryBackend, Mutation, NodeId, Options, Props, Renderer, Value};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Renderer over a fresh in-memory document with one container node.
pub fn setup() -> (Renderer<MemoryBackend>, NodeId) {
    setup_with(Options::default())
}

pub fn setup_with(options: Options) -> (Renderer<MemoryBackend>, NodeId) {
    init_logging();
    let mut backend = MemoryBackend::new();
    let root = backend.create_container("root");
    (Renderer::with_options(backend, options), root)
}

pub fn markup(renderer: &Renderer<MemoryBackend>, node: NodeId) -> String {
    renderer.with_backend(|b| b.inner_markup(node)).unwrap()
}

pub fn take_mutations(renderer: &Renderer<MemoryBackend>) -> Vec<Mutation> {
    renderer.with_backend_mut(|b| b.take_mutations()).unwrap()
}

pub fn children_of(renderer: &Renderer<MemoryBackend>, node: NodeId) -> Vec<NodeId> {
    use spark_vdom::Backend;
    renderer.with_backend(|b| b.children(node).to_vec()).unwrap()
}

/// Event recorder passed to test components through their props.
#[derive(Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Return the entries and clear the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn from_props(props: &Props) -> Self {
        props
            .get("log")
            .and_then(|v| v.downcast::<Log>())
            .cloned()
            .unwrap_or_default()
    }
}

impl From<Log> for Value {
    fn from(log: Log) -> Self {
        Value::any(log)
    }
}

pub fn strings(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|s| s.to_string()).collect()
}
