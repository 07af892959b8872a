//! Batched re-renders: coalescing, flush order, deferral and forced renders.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pretty_assertions::assert_eq;
use spark_vdom::{
    attrs, children, h, Attributes, BoxError, Component, ComponentHandle, ComponentType, Context, Create, Defer,
    Error, FlushOrder, HookResult, Listener, MemoryBackend, NodeId, Options, Props, RenderResult, Renderer, Snapshot,
    State, Task, Updater, Value,
};

use common::{children_of, markup, setup, setup_with, strings, Log};

fn handle_at(r: &Renderer<MemoryBackend>, node: NodeId) -> ComponentHandle {
    r.component_at(node).unwrap().expect("component-owned node")
}

// =============================================================================
// Test components
// =============================================================================

/// `<button onClick={increment}>{count}</button>`
struct Counter {
    log: Log,
    updater: Updater,
}

impl Create for Counter {
    fn create(props: &Props, _: &Context, updater: Updater) -> Self {
        Self { log: Log::from_props(props), updater }
    }
}

fn count_of(state: &State) -> i64 {
    state.get("count").and_then(|v| v.as_int()).unwrap_or(0)
}

impl Component for Counter {
    fn initial_state(&self) -> Attributes {
        attrs! { "count" => 0 }
    }

    fn render(&mut self, _: &Props, state: &State, _: &Context) -> RenderResult {
        self.log.push("render");
        let updater = self.updater.clone();
        let increment = Listener::new(move |_| {
            updater.update_state(|state, _| attrs! { "count" => count_of(state) + 1 });
        });
        Ok(h("button", attrs! { "onClick" => increment }, children![count_of(state)]).into())
    }

    fn did_update(&mut self, _: &Snapshot, _: &Snapshot) -> HookResult {
        self.log.push("did_update");
        Ok(())
    }
}

fn counter(log: &Log) -> spark_vdom::VNode {
    h(ComponentType::of::<Counter>(), attrs! { "log" => log.clone() }, children![])
}

/// `<i>{name}</i>`, logging `render {name}`.
struct Named {
    log: Log,
}

impl Create for Named {
    fn create(props: &Props, _: &Context, _: Updater) -> Self {
        Self { log: Log::from_props(props) }
    }
}

impl Component for Named {
    fn render(&mut self, props: &Props, _: &State, _: &Context) -> RenderResult {
        let name = props.get("name").and_then(|v| v.as_str()).unwrap_or("");
        self.log.push(format!("render {name}"));
        Ok(h("i", attrs! {}, children![name.to_string()]).into())
    }
}

fn named(log: &Log, name: &str) -> spark_vdom::VNode {
    h(ComponentType::of::<Named>(), attrs! { "log" => log.clone(), "name" => name }, children![])
}

// =============================================================================
// Coalescing
// =============================================================================

#[test]
fn test_state_updates_coalesce() {
    let (r, root) = setup();
    let log = Log::new();
    let button = r.mount(counter(&log), root, None).unwrap();
    let handle = handle_at(&r, button);
    log.take();

    let updater = handle.updater();
    updater.set_state(attrs! { "count" => 1, "extra" => "a" });
    updater.set_state(attrs! { "count" => 2 });
    updater.set_state(attrs! { "extra" => "b" });

    assert_eq!(r.pending_renders(), 1);
    assert!(handle.is_dirty());
    // nothing renders before the flush
    assert!(log.entries().is_empty());

    assert_eq!(r.tick().unwrap(), 1);
    assert_eq!(log.take(), strings(&["render", "did_update"]));
    assert_eq!(markup(&r, root), "<button>2</button>");
    assert_eq!(handle.state().get("extra"), Some(&Value::from("b")));
    assert!(!handle.is_dirty());
    assert_eq!(r.pending_renders(), 0);
}

#[test]
fn test_set_state_is_visible_before_flush() {
    let (r, root) = setup();
    let log = Log::new();
    let button = r.mount(counter(&log), root, None).unwrap();
    let handle = handle_at(&r, button);
    log.take();

    handle.updater().set_state(attrs! { "count" => 5 });
    assert_eq!(count_of(&handle.state()), 5);
    handle.updater().update_state(|state, _| attrs! { "count" => count_of(state) * 2 });
    assert_eq!(count_of(&handle.state()), 10);

    // merged, but the live tree waits for the flush
    assert!(log.entries().is_empty());
    assert_eq!(markup(&r, root), "<button>0</button>");

    r.tick().unwrap();
    assert_eq!(log.take(), strings(&["render", "did_update"]));
    assert_eq!(markup(&r, root), "<button>10</button>");
}

#[test]
fn test_update_state_sees_earlier_updates() {
    let (r, root) = setup();
    let log = Log::new();
    let button = r.mount(counter(&log), root, None).unwrap();
    let updater = handle_at(&r, button).updater();

    for _ in 0..3 {
        updater.update_state(|state, _| attrs! { "count" => count_of(state) + 1 });
    }
    r.tick().unwrap();
    assert_eq!(markup(&r, root), "<button>3</button>");
}

#[test]
fn test_event_listener_drives_updates() {
    let (r, root) = setup();
    let log = Log::new();
    let button = r.mount(counter(&log), root, None).unwrap();

    assert!(r.dispatch_event(button, "click", Value::Null).unwrap());
    assert_eq!(r.pending_renders(), 1);
    r.tick().unwrap();
    assert_eq!(markup(&r, root), "<button>1</button>");

    r.dispatch_event(button, "click", Value::Null).unwrap();
    r.dispatch_event(button, "click", Value::Null).unwrap();
    r.tick().unwrap();
    assert_eq!(markup(&r, root), "<button>3</button>");
    assert_eq!(log.count("did_update"), 2);
}

// =============================================================================
// Flush order
// =============================================================================

fn three_named(options: Options) -> (Renderer<MemoryBackend>, Log, Vec<ComponentHandle>) {
    let (r, root) = setup_with(options);
    let log = Log::new();
    let div = r
        .mount(h("div", attrs! {}, children![named(&log, "A"), named(&log, "B"), named(&log, "C")]), root, None)
        .unwrap();
    let handles = children_of(&r, div).into_iter().map(|node| handle_at(&r, node)).collect();
    log.take();
    (r, log, handles)
}

#[test]
fn test_flush_renders_last_requested_first() {
    let (r, log, handles) = three_named(Options::default());
    assert_eq!(r.flush_order(), FlushOrder::LastRequestedFirst);

    for i in [0, 2, 1] {
        handles[i].updater().set_state(attrs! { "tick" => 1 });
    }
    assert_eq!(r.pending_renders(), 3);
    r.tick().unwrap();

    assert_eq!(log.take(), strings(&["render B", "render C", "render A"]));
}

#[test]
fn test_flush_renders_first_requested_first() {
    let (r, log, handles) = three_named(Options::default().with_flush_order(FlushOrder::FirstRequestedFirst));

    for i in [0, 2, 1] {
        handles[i].updater().set_state(attrs! { "tick" => 1 });
    }
    r.tick().unwrap();

    assert_eq!(log.take(), strings(&["render A", "render C", "render B"]));
}

#[test]
fn test_rerender_flushes_immediately() {
    let (r, log, handles) = three_named(Options::default());
    handles[1].updater().set_state(attrs! { "tick" => 1 });

    r.rerender().unwrap();
    assert_eq!(log.take(), strings(&["render B"]));
    assert_eq!(r.pending_renders(), 0);

    // the already scheduled task finds nothing left to do
    assert_eq!(r.tick().unwrap(), 1);
    assert!(log.take().is_empty());
}

// =============================================================================
// Deferral
// =============================================================================

/// Holds tasks until the test runs them.
#[derive(Default)]
struct Deferred(RefCell<Vec<Task>>);

impl Deferred {
    fn pending(&self) -> usize {
        self.0.borrow().len()
    }

    fn run(&self) {
        let tasks = std::mem::take(&mut *self.0.borrow_mut());
        for task in tasks {
            task().unwrap();
        }
    }
}

impl Defer for Deferred {
    fn defer(&self, task: Task) {
        self.0.borrow_mut().push(task);
    }
}

#[test]
fn test_custom_defer_gets_one_task_per_flush() {
    let deferred = Rc::new(Deferred::default());
    let (r, log, handles) = three_named(Options::default().with_defer(deferred.clone()));

    handles[0].updater().set_state(attrs! { "tick" => 1 });
    handles[0].updater().set_state(attrs! { "tick" => 2 });
    handles[2].updater().set_state(attrs! { "tick" => 1 });
    assert_eq!(deferred.pending(), 1);

    // the built-in queue is not used
    assert_eq!(r.tick().unwrap(), 0);
    assert!(log.entries().is_empty());

    deferred.run();
    assert_eq!(log.take(), strings(&["render C", "render A"]));

    // the next request schedules a fresh flush
    handles[1].updater().set_state(attrs! { "tick" => 1 });
    assert_eq!(deferred.pending(), 1);
    deferred.run();
    assert_eq!(log.take(), strings(&["render B"]));
}

#[test]
fn test_child_updates_queued_when_not_synchronous() {
    let (r, root) = setup_with(Options::default().with_sync_component_updates(false));
    let log = Log::new();

    let div = r.mount(h("div", attrs! {}, children![named(&log, "a")]), root, None).unwrap();
    assert_eq!(log.take(), strings(&["render a"]));

    r.mount(h("div", attrs! {}, children![named(&log, "b")]), root, Some(div)).unwrap();
    assert!(log.entries().is_empty());
    assert_eq!(r.pending_renders(), 1);
    assert_eq!(markup(&r, root), "<div><i>a</i></div>");

    r.tick().unwrap();
    assert_eq!(log.take(), strings(&["render b"]));
    assert_eq!(markup(&r, root), "<div><i>b</i></div>");
}

#[test]
fn test_unmounted_instance_is_skipped() {
    let (r, root) = setup();
    let log = Log::new();
    let div = r.mount(h("div", attrs! {}, children![counter(&log)]), root, None).unwrap();
    let handle = handle_at(&r, children_of(&r, div)[0]);
    log.take();

    handle.updater().set_state(attrs! { "count" => 5 });
    r.mount(h("div", attrs! {}, children![]), root, Some(div)).unwrap();
    assert!(!handle.is_mounted());
    assert!(!handle.is_dirty());

    r.tick().unwrap();
    assert_eq!(log.count("render"), 0);

    // late requests against a torn-down instance are ignored by the flush
    handle.updater().set_state(attrs! { "count" => 6 });
    r.tick().unwrap();
    assert_eq!(log.count("render"), 0);
    assert_eq!(markup(&r, root), "<div></div>");
}

// =============================================================================
// Callbacks and forced renders
// =============================================================================

#[test]
fn test_callbacks_run_most_recent_first() {
    let (r, root) = setup();
    let log = Log::new();
    let button = r.mount(counter(&log), root, None).unwrap();
    let updater = handle_at(&r, button).updater();

    let order: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let (first, second) = (order.clone(), order.clone());
    updater.set_state_then(attrs! { "count" => 1 }, move || first.borrow_mut().push("first"));
    updater.set_state_then(attrs! { "count" => 2 }, move || second.borrow_mut().push("second"));
    assert!(order.borrow().is_empty());

    r.tick().unwrap();
    assert_eq!(*order.borrow(), vec!["second", "first"]);
    assert_eq!(markup(&r, root), "<button>2</button>");
}

#[test]
fn test_force_render_then_runs_callback_after_commit() {
    let (r, root) = setup();
    let log = Log::new();
    let button = r.mount(counter(&log), root, None).unwrap();
    let handle = handle_at(&r, button);
    log.take();

    let seen = Rc::new(Cell::new(None));
    let sink = seen.clone();
    let renderer = r.clone();
    handle.updater().set_state(attrs! { "count" => 7 });
    handle
        .updater()
        .force_render_then(move || sink.set(Some(renderer.pending_renders())))
        .unwrap();

    assert_eq!(markup(&r, root), "<button>7</button>");
    assert_eq!(log.take(), strings(&["render", "did_update"]));
    // the earlier set_state is still queued but has been rendered
    assert_eq!(seen.get(), Some(1));
    r.tick().unwrap();
    assert!(log.take().is_empty());
}

/// Forces a re-render of itself from `did_mount`; refuses ordinary updates.
struct Eager {
    log: Log,
    updater: Updater,
    forced: bool,
}

impl Create for Eager {
    fn create(props: &Props, _: &Context, updater: Updater) -> Self {
        Self { log: Log::from_props(props), updater, forced: false }
    }
}

impl Component for Eager {
    fn render(&mut self, _: &Props, _: &State, _: &Context) -> RenderResult {
        self.log.push("render");
        Ok(h("em", attrs! {}, children!["eager"]).into())
    }

    fn should_update(&mut self, _: &Snapshot, _: &Snapshot) -> Result<bool, BoxError> {
        self.log.push("should_update");
        Ok(false)
    }

    fn did_mount(&mut self, _: &Snapshot) -> HookResult {
        self.log.push("did_mount");
        if !self.forced {
            self.forced = true;
            self.updater.force_render()?;
        }
        Ok(())
    }

    fn did_update(&mut self, _: &Snapshot, _: &Snapshot) -> HookResult {
        self.log.push("did_update");
        Ok(())
    }
}

#[test]
fn test_force_render_inside_pass_is_deferred() {
    let (r, root) = setup();
    let log = Log::new();
    let ty = ComponentType::of::<Eager>();

    let em = r.mount(h(&ty, attrs! { "log" => log.clone() }, children![]), root, None).unwrap();
    assert_eq!(log.take(), strings(&["render", "did_mount"]));
    assert_eq!(r.pending_renders(), 1);
    assert!(handle_at(&r, em).is_dirty());

    r.tick().unwrap();
    // forced: should_update is bypassed and did_mount does not repeat
    assert_eq!(log.take(), strings(&["render", "did_update"]));
    assert_eq!(markup(&r, root), "<em>eager</em>");
    assert_eq!(r.pending_renders(), 0);
}

#[test]
fn test_root_calls_inside_pass_report_busy() {
    let slot: Rc<RefCell<Option<Renderer<MemoryBackend>>>> = Rc::default();
    let busy = Rc::new(Cell::new(false));
    let (held, flag) = (slot.clone(), busy.clone());
    let options = Options::default().with_after_mount(move |_| {
        if let Some(r) = held.borrow().as_ref() {
            flag.set(matches!(r.with_backend(|_| ()), Err(Error::EngineBusy)));
        }
    });
    let (r, root) = setup_with(options);
    *slot.borrow_mut() = Some(r.clone());

    r.mount(named(&Log::new(), "x"), root, None).unwrap();
    assert!(busy.get());
    // outside a pass the same call succeeds
    assert!(r.with_backend(|_| ()).is_ok());
    slot.borrow_mut().take();
}

// =============================================================================
// Failures
// =============================================================================

/// `<b>{n}</b>`; its first `should_update` fails when created with `fail`.
struct Flaky {
    log: Log,
    fail_next: bool,
}

impl Create for Flaky {
    fn create(props: &Props, _: &Context, _: Updater) -> Self {
        let fail_next = props.get("fail").and_then(|v| v.as_bool()).unwrap_or(false);
        Self { log: Log::from_props(props), fail_next }
    }
}

impl Component for Flaky {
    fn initial_state(&self) -> Attributes {
        attrs! { "n" => 0 }
    }

    fn render(&mut self, props: &Props, state: &State, _: &Context) -> RenderResult {
        let name = props.get("name").and_then(|v| v.as_str()).unwrap_or("");
        self.log.push(format!("render {name}"));
        let n = state.get("n").and_then(|v| v.as_int()).unwrap_or(0);
        Ok(h("b", attrs! {}, children![n]).into())
    }

    fn should_update(&mut self, _: &Snapshot, _: &Snapshot) -> Result<bool, BoxError> {
        if std::mem::take(&mut self.fail_next) {
            return Err("boom".into());
        }
        Ok(true)
    }
}

fn flaky(log: &Log, name: &str, fail: bool) -> spark_vdom::VNode {
    h(ComponentType::of::<Flaky>(), attrs! { "log" => log.clone(), "name" => name, "fail" => fail }, children![])
}

#[test]
fn test_failed_should_update_leaves_instance_schedulable() {
    let (r, root) = setup();
    let log = Log::new();
    let b = r.mount(flaky(&log, "F", true), root, None).unwrap();
    let handle = handle_at(&r, b);
    log.take();

    handle.updater().set_state(attrs! { "n" => 1 });
    let err = r.tick().unwrap_err();
    assert!(matches!(err, Error::Hook { hook: "should_update", .. }));
    assert!(!handle.is_dirty());
    assert_eq!(r.pending_renders(), 0);
    assert!(log.entries().is_empty());
    assert_eq!(markup(&r, root), "<b>0</b>");

    handle.updater().set_state(attrs! { "n" => 2 });
    assert_eq!(r.pending_renders(), 1);
    assert_eq!(r.tick().unwrap(), 1);
    assert_eq!(log.take(), strings(&["render F"]));
    assert_eq!(markup(&r, root), "<b>2</b>");
}

#[test]
fn test_flush_failure_requeues_unreached_instances() {
    let (r, root) = setup();
    let log = Log::new();
    let list = h("div", attrs! {}, children![flaky(&log, "A", false), flaky(&log, "B", true), flaky(&log, "C", false)]);
    let div = r.mount(list, root, None).unwrap();
    let handles: Vec<ComponentHandle> = children_of(&r, div).into_iter().map(|node| handle_at(&r, node)).collect();
    log.take();

    for handle in &handles {
        handle.updater().set_state(attrs! { "n" => 1 });
    }
    let err = r.tick().unwrap_err();
    assert!(matches!(err, Error::Hook { component: "Flaky", hook: "should_update", .. }));

    // last requested first: C rendered, B failed, A was not reached
    assert_eq!(log.take(), strings(&["render C"]));
    assert_eq!(r.pending_renders(), 1);
    assert!(handles[0].is_dirty());
    assert!(!handles[1].is_dirty());

    assert_eq!(r.tick().unwrap(), 1);
    assert_eq!(log.take(), strings(&["render A"]));
    assert_eq!(markup(&r, root), "<div><b>1</b><b>0</b><b>1</b></div>");

    handles[1].updater().set_state(attrs! { "n" => 2 });
    r.tick().unwrap();
    assert_eq!(log.take(), strings(&["render B"]));
    assert_eq!(markup(&r, root), "<div><b>1</b><b>2</b><b>1</b></div>");
}
