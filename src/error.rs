//! Error types.
//!
//! User render functions and lifecycle hooks return [`BoxError`]; the engine
//! wraps them with the component and hook that failed and propagates them to
//! whoever started the pass (mount, flush or forced render). Backend attribute
//! failures never reach this type.

use thiserror::Error;

/// Error type returned by user code.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A component's render function failed.
    #[error("render of <{component}> failed: {source}")]
    Render {
        component: &'static str,
        #[source]
        source: BoxError,
    },

    /// A lifecycle hook failed.
    #[error("{hook} hook of <{component}> failed: {source}")]
    Hook {
        component: &'static str,
        hook: &'static str,
        #[source]
        source: BoxError,
    },

    /// A root operation was called from inside a render pass.
    #[error("renderer is busy with another render pass")]
    EngineBusy,

    /// The renderer owning a component was dropped.
    #[error("renderer was dropped")]
    Detached,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
