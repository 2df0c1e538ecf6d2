#![allow(clippy::doc_markdown)] // Allow technical terms like XPath, YAML in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Weft Core
//!
//! Dispatch core of a streaming document-transformation engine: selector
//! compilation, handler dependency ordering, and the per-document dispatch
//! runtime that drives content handlers over a tree-walk of the input.
//!
//! ## Overview
//!
//! Configuration binds named content handlers to document fragments through
//! path-like selector expressions. At build time the selectors are compiled
//! and each handler chain is dependency-sorted into an immutable
//! [`delivery::DeliveryTable`]; at run time one [`runtime::Dispatcher`] per
//! document walks the tree and fires the element protocol (before,
//! child-text, child-element, after) for every matched binding.
//!
//! ## Key Features
//!
//! - **Compiled selectors**: a restricted XPath dialect with descendant
//!   wildcards, attribute targets and namespace prefixes, matched
//!   right-to-left against element ancestor chains
//! - **Capability-driven ordering**: producers/consumers declared by the
//!   handlers themselves, topologically sorted with exact cycle diagnostics
//! - **Immutable delivery tables**: built fail-fast, then shared lock-free
//!   across any number of concurrent executions
//! - **Bridging and bypass**: marker elements redirect stored values into an
//!   outer pipeline's table; single whole-document bindings can skip
//!   traversal entirely
//!
//! ## Module Organization
//!
//! - [`selector`] - Selector compilation and path matching
//! - [`sorter`] - Producer/consumer dependency ordering
//! - [`delivery`] - Immutable selector-to-handler-chain tables
//! - [`runtime`] - Per-document dispatch runtime, bridging, bypass
//! - [`handler`] - Handler capability traits and binding configuration
//! - [`tree`] - Tree-walk source abstraction
//! - [`events`] - Execution lifecycle event stream
//! - [`config`] - YAML-driven dispatch policy
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use weft_core::config::DispatchConfig;
//! use weft_core::delivery::DeliveryTable;
//! use weft_core::handler::{BindingConfig, Fragment, FragmentHandler, HandlerBinding};
//! use weft_core::runtime::{Dispatcher, ExecutionContext};
//! use weft_core::tree::{DocumentTree, NodeTree};
//!
//! struct ItemPrinter;
//!
//! impl FragmentHandler for ItemPrinter {
//!     fn visit_child_text(
//!         &self,
//!         fragment: &Fragment<'_>,
//!         text: &str,
//!         ctx: &mut ExecutionContext,
//!     ) -> weft_core::error::DispatchResult<()> {
//!         ctx.output.push_str(text);
//!         ctx.output.push('\n');
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> weft_core::error::Result<()> {
//! let config = DispatchConfig::default();
//! let table = DeliveryTable::build(
//!     vec![(
//!         "order/item".to_string(),
//!         HandlerBinding::new(
//!             Arc::new(ItemPrinter),
//!             BindingConfig::new("order/item", "default", "ItemPrinter"),
//!         ),
//!     )],
//!     &config,
//! )?;
//!
//! let mut tree = DocumentTree::new("order");
//! let item = tree.append_element(tree.root(), "item");
//! tree.append_text(item, "socks");
//!
//! let mut ctx = ExecutionContext::new();
//! Dispatcher::new(&table, &config).execute(&tree, tree.root(), &mut ctx)?;
//! assert_eq!(ctx.output, "socks\n");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod events;
pub mod handler;
pub mod logging;
pub mod runtime;
pub mod selector;
pub mod sorter;
pub mod tree;

pub use config::DispatchConfig;
pub use delivery::{DeliveryTable, TargetChain};
pub use error::{DispatchError, DispatchResult, Result, WeftError};
pub use events::{EventPublisher, ExecutionEvent, ExecutionEventKind, InvocationOutcome};
pub use handler::{
    BindingConfig, DocumentBypass, Fragment, FragmentHandler, HandlerBinding, VisitPhase,
};
pub use runtime::{Dispatcher, ExecutionContext, ExecutionState, StoredValue};
pub use selector::{compile, CompiledSelector, SelectorError};
pub use sorter::{CycleError, SortOrder};
pub use tree::{DocumentTree, NodeId, NodeKind, NodeTree, QName};
