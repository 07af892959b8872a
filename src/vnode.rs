//! Virtual nodes and the builder that produces them.
//!
//! A [`VNode`] is an immutable description of one node of the desired tree.
//! It is rebuilt on every render and carries no identity beyond its content
//! and optional [`Key`].
//!
//! # Example
//!
//! ```
//! use spark_vdom::{attrs, children, h};
//!
//! let list = h("ul", attrs! { "class" => "items" }, children![
//!     h("li", attrs! { "key" => "a" }, children!["first"]),
//!     h("li", attrs! { "key" => "b" }, children!["second", 2]),
//! ]);
//!
//! assert_eq!(list.children.len(), 2);
//! ```

use std::fmt;
use std::rc::Rc;

use crate::component::ComponentType;
use crate::types::{Attributes, Key, Value};

/// Attribute name carrying the child-matching identity hint.
pub const KEY: &str = "key";
/// Attribute name carrying a `ref` callback.
pub const REF: &str = "ref";
/// Reserved for children; never diffed as an attribute.
pub const CHILDREN: &str = "children";
/// Raw inner markup property; never diffed as an attribute.
pub const INNER_HTML: &str = "inner_html";
/// Raw markup passthrough handled by the backend. Its presence switches child
/// reconciliation into the mode that adopts foreign nodes.
pub const RAW_HTML: &str = "raw_html";

// =============================================================================
// Tag
// =============================================================================

/// What a virtual node renders as.
#[derive(Clone, PartialEq)]
pub enum Tag {
    /// A primitive element of the render target (`"div"`, `"svg"`, ...).
    Element(Rc<str>),
    /// A component factory; rendering it runs the component lifecycle.
    Component(ComponentType),
}

impl Tag {
    pub fn as_element(&self) -> Option<&str> {
        match self {
            Self::Element(name) => Some(name),
            Self::Component(_) => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentType> {
        match self {
            Self::Component(ty) => Some(ty),
            Self::Element(_) => None,
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(name) => write!(f, "<{name}>"),
            Self::Component(ty) => write!(f, "<{}/>", ty.name()),
        }
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self::Element(name.into())
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Self::Element(name.into())
    }
}

impl From<ComponentType> for Tag {
    fn from(ty: ComponentType) -> Self {
        Self::Component(ty)
    }
}

impl From<&ComponentType> for Tag {
    fn from(ty: &ComponentType) -> Self {
        Self::Component(ty.clone())
    }
}

// =============================================================================
// VNode / VChild
// =============================================================================

/// Declarative description of a desired node.
#[derive(Debug, Clone, PartialEq)]
pub struct VNode {
    pub tag: Tag,
    pub attributes: Attributes,
    pub children: Vec<VChild>,
    /// Copied out of `attributes["key"]` by the builder.
    pub key: Option<Key>,
}

impl VNode {
    pub fn is_component(&self) -> bool {
        matches!(self.tag, Tag::Component(_))
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// One entry of a children sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum VChild {
    Node(VNode),
    Text(Rc<str>),
    /// Null or boolean children. Reconciled as an empty text node.
    #[default]
    Empty,
}

impl VChild {
    pub fn key(&self) -> Option<&Key> {
        match self {
            Self::Node(node) => node.key.as_ref(),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&VNode> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Text, number and empty children are all rendered as text nodes.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Node(_))
    }
}

impl From<VNode> for VChild {
    fn from(node: VNode) -> Self {
        Self::Node(node)
    }
}

impl From<&str> for VChild {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl From<String> for VChild {
    fn from(text: String) -> Self {
        Self::Text(text.into())
    }
}

impl From<i64> for VChild {
    fn from(n: i64) -> Self {
        Self::Text(n.to_string().into())
    }
}

impl From<i32> for VChild {
    fn from(n: i32) -> Self {
        Self::Text(n.to_string().into())
    }
}

impl From<usize> for VChild {
    fn from(n: usize) -> Self {
        Self::Text(n.to_string().into())
    }
}

impl From<f64> for VChild {
    fn from(n: f64) -> Self {
        Self::Text(n.to_string().into())
    }
}

impl From<bool> for VChild {
    fn from(_: bool) -> Self {
        Self::Empty
    }
}

impl From<()> for VChild {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl<T: Into<VChild>> From<Option<T>> for VChild {
    fn from(child: Option<T>) -> Self {
        child.map_or(Self::Empty, Into::into)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Build a virtual node.
///
/// For element tags, adjacent primitive children are merged into a single text
/// child and empty children become empty text. Component children are passed
/// through untouched so the component sees exactly what it was given.
pub fn h(
    tag: impl Into<Tag>,
    attributes: Attributes,
    children: impl IntoIterator<Item = VChild>,
) -> VNode {
    let tag = tag.into();
    let key = attributes.get(KEY).and_then(Key::from_value);

    let children = match tag {
        Tag::Element(_) => merge_text_runs(children),
        Tag::Component(_) => children.into_iter().collect(),
    };

    VNode { tag, attributes, children, key }
}

/// Shorthand for an element without attributes whose only child is text.
pub fn text(tag: &str, content: impl Into<VChild>) -> VNode {
    h(tag, Attributes::new(), [content.into()])
}

/// Rebuild `vnode` with `overrides` merged over its attributes and, when
/// given, a replacement children list.
pub fn clone_element(vnode: &VNode, overrides: Attributes, children: Option<Vec<VChild>>) -> VNode {
    let mut attributes = vnode.attributes.clone();
    attributes.extend(overrides);
    let children = children.unwrap_or_else(|| vnode.children.clone());
    h(vnode.tag.clone(), attributes, children)
}

fn merge_text_runs(children: impl IntoIterator<Item = VChild>) -> Vec<VChild> {
    let mut out: Vec<VChild> = Vec::new();
    let mut last_simple = false;

    for child in children {
        let text = match child {
            VChild::Node(node) => {
                out.push(VChild::Node(node));
                last_simple = false;
                continue;
            }
            VChild::Text(text) => text,
            VChild::Empty => Rc::from(""),
        };

        match out.last_mut() {
            Some(VChild::Text(prev)) if last_simple => {
                let mut joined = String::with_capacity(prev.len() + text.len());
                joined.push_str(prev);
                joined.push_str(&text);
                *prev = joined.into();
            }
            _ => out.push(VChild::Text(text)),
        }
        last_simple = true;
    }

    out
}

/// Build a `Vec<VChild>` from heterogeneous values.
#[macro_export]
macro_rules! children {
    () => { ::std::vec::Vec::<$crate::VChild>::new() };
    ($($child:expr),+ $(,)?) => {
        ::std::vec![$($crate::VChild::from($child)),+]
    };
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attrs, children};

    #[test]
    fn test_h_extracts_key() {
        let node = h("li", attrs! { "key" => 4, "class" => "x" }, children![]);
        assert_eq!(node.key, Some(Key::from("4")));
        // key stays in the attribute map; the reconciler skips it
        assert!(node.attributes.contains_key("key"));
    }

    #[test]
    fn test_h_merges_adjacent_text() {
        let node = h("p", attrs! {}, children!["a", 1, (), "b", text("i", "x"), "c"]);
        assert_eq!(
            node.children,
            vec![
                VChild::Text("a1b".into()),
                VChild::Node(text("i", "x")),
                VChild::Text("c".into()),
            ]
        );
    }

    #[test]
    fn test_component_children_untouched() {
        fn noop(_: &crate::Props, _: &crate::Context) -> crate::RenderResult {
            Ok(VChild::Empty)
        }
        let ty = ComponentType::function("Noop", noop);
        let node = h(&ty, attrs! {}, children!["a", "b", None::<VNode>]);
        assert_eq!(node.children.len(), 3);
        assert_eq!(node.children[2], VChild::Empty);
    }

    #[test]
    fn test_clone_element_overrides() {
        let base = h("a", attrs! { "href" => "/x", "id" => "l" }, children!["go"]);
        let cloned = clone_element(&base, attrs! { "href" => "/y" }, None);
        assert_eq!(cloned.attr("href"), Some(&Value::from("/y")));
        assert_eq!(cloned.attr("id"), Some(&Value::from("l")));
        assert_eq!(cloned.children, base.children);

        let replaced = clone_element(&base, attrs! {}, Some(children!["stop"]));
        assert_eq!(replaced.children, children!["stop"]);
    }
}
