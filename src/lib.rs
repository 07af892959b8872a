//! # spark-vdom
//!
//! Virtual tree reconciliation with a stateful component lifecycle.
//!
//! Describe the tree you want with [`h`]; a [`Renderer`] makes the live tree
//! of a [`Backend`] match it with the fewest structural changes it can find.
//! Components keep state between renders and batch their re-renders through
//! a deferred scheduler.
//!
//! ## Architecture
//!
//! ```text
//! h() → VNode tree → Renderer::mount → diff → Backend mutations
//!                                        │
//!                     components ◄───────┘ (props → render → diff → did_mount)
//!                         │
//!        Updater::set_state → Scheduler → deferred flush → render
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Node handles, keys, dynamic values, attribute maps
//! - [`vnode`] - Virtual nodes and the `h` builder
//! - [`backend`] - The render-target trait and an in-memory implementation
//! - [`component`] - Component trait, types, props/state/context, updaters
//! - [`scheduler`] - Deferred flush of queued re-renders
//! - [`options`] - Renderer configuration
//! - [`render`] - The `Renderer` entry point

pub mod backend;
pub mod component;
pub mod error;
pub mod options;
mod reconciler;
pub mod render;
pub mod scheduler;
pub mod types;
pub mod vnode;

// Re-export commonly used items
pub use types::*;

pub use backend::{Backend, MemoryBackend, Mutation};

pub use component::{
    AsAny, Component, ComponentHandle, ComponentType, Context, Create, HookResult, Props, RenderFn,
    RenderResult, Snapshot, State, TypeKey, Updater,
};

pub use error::{BoxError, Error, Result};

pub use options::{Observer, Options};

pub use render::Renderer;

pub use scheduler::{Defer, FlushOrder, MicrotaskQueue, Task};

pub use vnode::{clone_element, h, text, Tag, VChild, VNode};
