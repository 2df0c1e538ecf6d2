//! Structured error handling for the dispatch core.
//!
//! Configuration-time errors (`SelectorError`, `CycleError`, `ConfigError`)
//! are fail-fast: the delivery table is never partially published. Dispatch
//! errors occur per document execution and are either fatal or recoverable
//! depending on the `terminate_on_handler_error` policy.

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::selector::SelectorError;
pub use crate::sorter::CycleError;

/// Top-level error for the crate. Per-domain errors live next to the modules
/// that raise them and convert into this via `From`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeftError {
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, WeftError>;

/// Errors raised while dispatching a single document execution.
///
/// `HandlerFailed` wraps the original handler error with the matched selector
/// and element context, as seen by callers in fatal mode. The bridge variants
/// cover marker nodes that cannot be redirected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// Raw error produced inside a handler body.
    #[error("Handler error: {0}")]
    Handler(String),

    /// A handler failure wrapped with its dispatch context.
    #[error("Handler '{handler}' failed during {phase} on selector '{selector}' at <{element}>: {reason}")]
    HandlerFailed {
        handler: String,
        phase: String,
        selector: String,
        element: String,
        reason: String,
    },

    /// A bridge marker referenced a `source` key with no stored value.
    #[error("Bridge source key '{key}' not found in execution value store")]
    BridgeSourceMissing { key: String },

    /// The bridge `visit` attribute carried an unrecognized value.
    #[error("Unrecognized bridge visit mode '{value}'")]
    BridgeVisitUnrecognized { value: String },

    /// A child-text bridge redirect resolved to a non-textual stored value.
    #[error("Bridge child-text redirect for source key '{key}' requires character data")]
    BridgeSourceNotText { key: String },

    /// Traversal exceeded the configured nesting depth guard.
    #[error("Traversal depth limit {limit} exceeded")]
    DepthLimitExceeded { limit: usize },

    /// The dispatcher was driven after its execution finished.
    #[error("Execution already finished; dispatchers are single-use per document")]
    ExecutionFinished,
}

pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
