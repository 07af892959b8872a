//! Core types for spark-vdom.
//!
//! These types flow through every layer: the builder produces them, the
//! reconciler compares them, and backends receive them when an attribute is
//! applied to a live node.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::component::ComponentHandle;

// =============================================================================
// Node handles
// =============================================================================

/// Opaque handle to a node living in a render target.
///
/// Backends allocate these; the reconciler only copies, hashes and compares
/// them. A handle stays valid for as long as the backend keeps the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Wrap a backend-specific index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The backend-specific index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Identity hint used to match children across renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Rc<str>);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a key from an attribute value. Null and callbacks carry no identity.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(Self(s.clone())),
            Value::Int(i) => Some(Self(i.to_string().into())),
            Value::Float(f) => Some(Self(f.to_string().into())),
            Value::Bool(b) => Some(Self(b.to_string().into())),
            _ => None,
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self(i.to_string().into())
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Self(i.to_string().into())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Events and callbacks
// =============================================================================

/// An event delivered to a listener attached through an `on*` attribute.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name without the `on` prefix, lowercased (`"click"`).
    pub name: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
    /// Backend-specific payload.
    pub detail: Value,
}

/// Event handler stored in an attribute map.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Listener(..)")
    }
}

/// What a `ref` callback is pointed at.
#[derive(Debug, Clone)]
pub enum RefTarget {
    /// An element or text node.
    Node(NodeId),
    /// A mounted component instance.
    Component(ComponentHandle),
}

impl RefTarget {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            Self::Component(handle) => handle.base(),
        }
    }
}

/// `ref` callback: called with the target on attach and `None` on detach.
#[derive(Clone)]
pub struct NodeRef(Rc<dyn Fn(Option<RefTarget>)>);

impl NodeRef {
    pub fn new(f: impl Fn(Option<RefTarget>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, target: Option<RefTarget>) {
        (self.0)(target)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodeRef(..)")
    }
}

// =============================================================================
// Value
// =============================================================================

/// Dynamic value held in attribute, prop, state and context maps.
///
/// Plain data compares structurally; callbacks and [`Value::Any`] compare by
/// pointer, so re-rendering with the same closure is not a change.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Listener(Listener),
    Ref(NodeRef),
    Any(Rc<dyn Any>),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_listener(&self) -> Option<&Listener> {
        match self {
            Self::Listener(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_ref_callback(&self) -> Option<&NodeRef> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Downcast an opaque value.
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Any(v) => v.downcast_ref(),
            _ => None,
        }
    }

    /// Wrap an arbitrary value.
    pub fn any<T: Any>(value: T) -> Self {
        Self::Any(Rc::new(value))
    }

    /// Text rendering used for attribute strings and text children.
    /// Callbacks and opaque values have no textual form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Str(s) => Some(s.to_string()),
            Self::Listener(_) | Self::Ref(_) | Self::Any(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Listener(a), Self::Listener(b)) => a.ptr_eq(b),
            (Self::Ref(a), Self::Ref(b)) => a.ptr_eq(b),
            (Self::Any(a), Self::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Listener(_) => f.write_str("Listener(..)"),
            Self::Ref(_) => f.write_str("Ref(..)"),
            Self::Any(_) => f.write_str("Any(..)"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Self::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<Listener> for Value {
    fn from(l: Listener) -> Self {
        Self::Listener(l)
    }
}

impl From<NodeRef> for Value {
    fn from(r: NodeRef) -> Self {
        Self::Ref(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// =============================================================================
// Attribute maps
// =============================================================================

/// Ordered attribute map. Order is preserved so backend calls are deterministic.
pub type Attributes = IndexMap<String, Value>;

/// Build an [`Attributes`] map from `name => value` pairs.
///
/// ```
/// use spark_vdom::attrs;
///
/// let a = attrs! { "id" => "main", "tabindex" => 2 };
/// assert_eq!(a.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => { $crate::Attributes::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Attributes::new();
        $( map.insert(::std::string::String::from($name), $crate::Value::from($value)); )+
        map
    }};
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::from("a"), Value::from(String::from("a")));
        assert_ne!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::from(None::<i64>), Value::Null);

        let l = Listener::new(|_| {});
        assert_eq!(Value::from(l.clone()), Value::from(l));
        assert_ne!(
            Value::from(Listener::new(|_| {})),
            Value::from(Listener::new(|_| {}))
        );
    }

    #[test]
    fn test_value_text() {
        assert_eq!(Value::from(3).to_text().as_deref(), Some("3"));
        assert_eq!(Value::from("x").to_text().as_deref(), Some("x"));
        assert_eq!(Value::Null.to_text(), None);
        assert_eq!(Value::any(5u8).to_text(), None);
    }

    #[test]
    fn test_value_downcast() {
        let v = Value::any(vec![1, 2, 3]);
        assert_eq!(v.downcast::<Vec<i32>>(), Some(&vec![1, 2, 3]));
        assert!(v.downcast::<String>().is_none());
    }

    #[test]
    fn test_key_from_value() {
        assert_eq!(Key::from_value(&Value::from(7)), Some(Key::from("7")));
        assert_eq!(Key::from_value(&Value::from("a")), Some(Key::from("a")));
        assert_eq!(Key::from_value(&Value::Null), None);
    }

    #[test]
    fn test_attrs_macro_preserves_order() {
        let a = attrs! { "b" => 1, "a" => 2 };
        let names: Vec<&str> = a.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
