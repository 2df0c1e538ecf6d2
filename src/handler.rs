//! # Handler Capability Interfaces
//!
//! Handlers expose zero or more visit entry points (before, child-text,
//! child-element, after), optional produces/consumes capability sets used by
//! the dependency sorter, and an optional single-shot bypass capability.
//! Capabilities are explicit trait methods queried via capability checks,
//! never runtime type inspection.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::DispatchResult;
use crate::runtime::ExecutionContext;
use crate::tree::{NodeTree, QName};

/// The four dispatch points of the element protocol, plus the whole-document
/// bypass shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitPhase {
    Before,
    ChildText,
    ChildElement,
    After,
    Bypass,
}

impl fmt::Display for VisitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VisitPhase::Before => "before",
            VisitPhase::ChildText => "child-text",
            VisitPhase::ChildElement => "child-element",
            VisitPhase::After => "after",
            VisitPhase::Bypass => "bypass",
        };
        write!(f, "{name}")
    }
}

/// Borrowed view of the fragment a handler is invoked against. The dispatch
/// core never owns tree nodes; handlers see names and attributes only.
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    pub name: &'a QName,
    pub attributes: &'a [(QName, String)],
}

impl<'a> Fragment<'a> {
    pub fn new(name: &'a QName, attributes: &'a [(QName, String)]) -> Self {
        Self { name, attributes }
    }

    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name.local == local)
            .map(|(_, value)| value.as_str())
    }
}

/// A content handler bound to document fragments through a selector.
///
/// All entry points default to no-ops; implementations override the ones they
/// care about. Handlers must be shareable across concurrently executing
/// documents: per-execution state belongs in the [`ExecutionContext`].
pub trait FragmentHandler: Send + Sync {
    /// Invoked when the traversal enters a matched element.
    fn visit_before(
        &self,
        fragment: &Fragment<'_>,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        let _ = (fragment, ctx);
        Ok(())
    }

    /// Invoked for each text child of a matched element, in document order.
    fn visit_child_text(
        &self,
        fragment: &Fragment<'_>,
        text: &str,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        let _ = (fragment, text, ctx);
        Ok(())
    }

    /// Invoked for each element child of a matched element, before the
    /// traversal recurses into that child.
    fn visit_child_element(
        &self,
        fragment: &Fragment<'_>,
        child: &Fragment<'_>,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        let _ = (fragment, child, ctx);
        Ok(())
    }

    /// Invoked once all children of a matched element have been processed.
    fn visit_after(
        &self,
        fragment: &Fragment<'_>,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        let _ = (fragment, ctx);
        Ok(())
    }

    /// Named values this handler emits into the execution value store.
    fn produces(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Named values this handler requires other handlers to have produced.
    fn consumes(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Single-shot whole-document capability; `Some` makes the handler
    /// eligible for the traversal bypass shortcut.
    fn as_bypass(&self) -> Option<&dyn DocumentBypass> {
        None
    }
}

/// Whole-document processing without per-node traversal. A pure optimization:
/// output must be identical to what full dispatch would produce.
pub trait DocumentBypass: Send + Sync {
    fn bypass(&self, tree: &dyn NodeTree, ctx: &mut ExecutionContext) -> DispatchResult<()>;
}

/// The configuration that attached a handler to a selector.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingConfig {
    /// Selector text, as declared.
    pub selector: String,
    /// Target profile the binding was declared under.
    pub target_profile: String,
    /// Handler name, for diagnostics and reporting.
    pub handler_name: String,
    /// Free-form handler parameters.
    pub parameters: HashMap<String, serde_json::Value>,
}

impl BindingConfig {
    pub fn new(
        selector: impl Into<String>,
        target_profile: impl Into<String>,
        handler_name: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            target_profile: target_profile.into(),
            handler_name: handler_name.into(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// A handler instance paired with its originating configuration and the
/// capability sets captured at configuration-load time. Immutable thereafter.
#[derive(Clone)]
pub struct HandlerBinding {
    pub handler: Arc<dyn FragmentHandler>,
    pub config: BindingConfig,
    pub produces: BTreeSet<String>,
    pub consumes: BTreeSet<String>,
}

impl HandlerBinding {
    pub fn new(handler: Arc<dyn FragmentHandler>, config: BindingConfig) -> Self {
        let produces = handler.produces();
        let consumes = handler.consumes();
        Self {
            handler,
            config,
            produces,
            consumes,
        }
    }

    pub fn is_producer(&self) -> bool {
        !self.produces.is_empty()
    }

    pub fn is_consumer(&self) -> bool {
        !self.consumes.is_empty()
    }

    /// Whether this binding consumes anything `other` produces.
    pub fn depends_on(&self, other: &HandlerBinding) -> bool {
        !self.consumes.is_disjoint(&other.produces)
    }

    /// Stable one-line rendering used in dependency-chain diagnostics.
    pub fn render(&self) -> String {
        format!(
            "{}:{}[handler={}, params={}]",
            self.config.target_profile,
            self.config.selector,
            self.config.handler_name,
            self.config.parameters.len()
        )
    }
}

impl fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("config", &self.config)
            .field("produces", &self.produces)
            .field("consumes", &self.consumes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    impl FragmentHandler for Plain {}

    struct ProducerConsumer;
    impl FragmentHandler for ProducerConsumer {
        fn produces(&self) -> BTreeSet<String> {
            ["a".to_string()].into_iter().collect()
        }
        fn consumes(&self) -> BTreeSet<String> {
            ["b".to_string()].into_iter().collect()
        }
    }

    #[test]
    fn test_capability_capture() {
        let binding = HandlerBinding::new(
            Arc::new(ProducerConsumer),
            BindingConfig::new("order", "default", "ProducerConsumer"),
        );
        assert!(binding.is_producer());
        assert!(binding.is_consumer());

        let plain = HandlerBinding::new(Arc::new(Plain), BindingConfig::new("order", "default", "Plain"));
        assert!(!plain.is_producer());
        assert!(!plain.is_consumer());
        assert!(!plain.depends_on(&binding));
    }

    #[test]
    fn test_dependency_check() {
        let producer = HandlerBinding::new(
            Arc::new(ProducerConsumer),
            BindingConfig::new("order", "default", "P"),
        );
        struct ConsumerOfA;
        impl FragmentHandler for ConsumerOfA {
            fn consumes(&self) -> BTreeSet<String> {
                ["a".to_string()].into_iter().collect()
            }
        }
        let consumer = HandlerBinding::new(
            Arc::new(ConsumerOfA),
            BindingConfig::new("order", "default", "C"),
        );
        assert!(consumer.depends_on(&producer));
        assert!(!producer.depends_on(&consumer));
    }

    #[test]
    fn test_render_format() {
        let binding = HandlerBinding::new(
            Arc::new(Plain),
            BindingConfig::new("order/item", "default", "PlainHandler")
                .with_parameter("key", serde_json::json!("value")),
        );
        assert_eq!(
            binding.render(),
            "default:order/item[handler=PlainHandler, params=1]"
        );
    }
}
