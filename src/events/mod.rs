//! # Execution Lifecycle Events
//!
//! Broadcast stream of dispatch lifecycle events: execution start and finish
//! plus every handler invocation with its outcome. Observation only; the
//! dispatch outcome never depends on whether anyone is subscribed.

pub mod publisher;

pub use publisher::{EventPublisher, ExecutionEvent, ExecutionEventKind, InvocationOutcome};
