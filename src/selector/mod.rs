//! # Selector Compilation and Matching
//!
//! Turns path-like selector expressions (a restricted XPath dialect) into
//! ordered match steps, and evaluates them against element ancestor chains.
//!
//! ## Grammar
//!
//! `/`-separated segments; each segment is an element name (optionally
//! namespace-prefixed), optionally followed by `[predicate]` (passed through,
//! not interpreted) and by `@attributeName` on the last segment only. `**`
//! denotes descendant-or-self, a leading `/` an absolute selector, and the
//! tokens `#document` / `$document` the whole-document fragment. Whitespace
//! between segments is equivalent to `/`.

pub mod compiler;
pub mod matcher;
pub mod step;

pub use compiler::{compile, SelectorError};
pub use matcher::{matches, matches_attribute};
pub use step::{
    Axis, CompiledSelector, SelectorStep, SelectorStepBuilder, DOCUMENT_FRAGMENT,
    DOCUMENT_FRAGMENT_LEGACY,
};
