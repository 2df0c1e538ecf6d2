//! # Delivery Table
//!
//! Build-time component that compiles every distinct selector and
//! dependency-sorts the handlers bound to it into an immutable lookup
//! structure. Built once per configuration, single-threaded, fail-fast;
//! after publication the table is read concurrently, without locks, by any
//! number of dispatch runtimes. No dispatch step ever mutates it.

use std::collections::HashMap;

use tracing::debug;

use crate::config::DispatchConfig;
use crate::handler::HandlerBinding;
use crate::logging::log_table_operation;
use crate::selector::{compile, CompiledSelector};
use crate::sorter;

/// A compiled selector and its dependency-ordered handler chain.
#[derive(Debug, Clone)]
pub struct TargetChain {
    pub selector: CompiledSelector,
    pub bindings: Vec<HandlerBinding>,
}

/// Immutable mapping from selector text to its ordered handler chain.
#[derive(Debug)]
pub struct DeliveryTable {
    targets: Vec<TargetChain>,
    index: HashMap<String, usize>,
    bypass: Option<usize>,
}

impl DeliveryTable {
    /// Build the table from declared `(selector text, binding)` pairs.
    ///
    /// Grouping preserves first-seen selector order and declared binding
    /// order within each group; each group is then dependency-sorted unless
    /// sorting is disabled. A malformed selector or a dependency cycle aborts
    /// the build; no partial table is ever published.
    pub fn build(
        pairs: Vec<(String, HandlerBinding)>,
        config: &DispatchConfig,
    ) -> crate::error::Result<Self> {
        let mut targets: Vec<(String, Vec<HandlerBinding>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (selector_text, binding) in pairs {
            match index.get(&selector_text) {
                Some(&i) => targets[i].1.push(binding),
                None => {
                    index.insert(selector_text.clone(), targets.len());
                    targets.push((selector_text, vec![binding]));
                }
            }
        }

        let mut compiled_targets = Vec::with_capacity(targets.len());
        for (selector_text, mut bindings) in targets {
            let selector = match compile(&selector_text) {
                Ok(selector) => selector,
                Err(err) => {
                    log_table_operation(
                        "compile",
                        Some(&selector_text),
                        "failed",
                        Some(&err.to_string()),
                    );
                    return Err(err.into());
                }
            };
            if config.sort_handlers {
                if let Err(err) = sorter::sort(&mut bindings, config.sort_order) {
                    log_table_operation(
                        "sort",
                        Some(&selector_text),
                        "failed",
                        Some(&err.to_string()),
                    );
                    return Err(err.into());
                }
            }
            debug!(
                selector = %selector_text,
                bindings = bindings.len(),
                sorted = config.sort_handlers,
                "resolved handler chain"
            );
            compiled_targets.push(TargetChain { selector, bindings });
        }

        let bypass = detect_bypass(&compiled_targets);
        log_table_operation(
            "build",
            None,
            "complete",
            Some(&format!(
                "targets={}, bypass={}",
                compiled_targets.len(),
                bypass.is_some()
            )),
        );

        Ok(Self {
            targets: compiled_targets,
            index,
            bypass,
        })
    }

    /// Target chains in first-seen selector order.
    pub fn targets(&self) -> &[TargetChain] {
        &self.targets
    }

    /// Look up the chain for an exact selector text.
    pub fn lookup(&self, selector_text: &str) -> Option<&TargetChain> {
        self.index.get(selector_text).map(|&i| &self.targets[i])
    }

    /// The recorded bypass binding, when the table's only binding targets the
    /// whole-document fragment and its handler is bypass-capable.
    pub fn bypass(&self) -> Option<&HandlerBinding> {
        self.bypass.map(|i| &self.targets[i].bindings[0])
    }

    /// Iteration-ordered introspection view: selector text to the resolved,
    /// ordered handler names.
    pub fn report(&self) -> Vec<(String, Vec<String>)> {
        self.targets
            .iter()
            .map(|target| {
                (
                    target.selector.text().to_string(),
                    target
                        .bindings
                        .iter()
                        .map(|b| b.config.handler_name.clone())
                        .collect(),
                )
            })
            .collect()
    }
}

/// Bypass applies only when the table holds exactly one binding, it targets
/// the whole-document fragment, and the handler declares the capability.
fn detect_bypass(targets: &[TargetChain]) -> Option<usize> {
    if targets.len() != 1 {
        return None;
    }
    let target = &targets[0];
    if target.bindings.len() != 1 || !target.selector.is_document_target() {
        return None;
    }
    if target.bindings[0].handler.as_bypass().is_some() {
        Some(0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DispatchResult, WeftError};
    use crate::handler::{BindingConfig, DocumentBypass, FragmentHandler};
    use crate::runtime::ExecutionContext;
    use crate::tree::NodeTree;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    struct Plain;
    impl FragmentHandler for Plain {}

    struct Producer(&'static str);
    impl FragmentHandler for Producer {
        fn produces(&self) -> BTreeSet<String> {
            [self.0.to_string()].into_iter().collect()
        }
    }

    struct Consumer(&'static str);
    impl FragmentHandler for Consumer {
        fn consumes(&self) -> BTreeSet<String> {
            [self.0.to_string()].into_iter().collect()
        }
    }

    struct WholeDocument;
    impl FragmentHandler for WholeDocument {
        fn as_bypass(&self) -> Option<&dyn DocumentBypass> {
            Some(self)
        }
    }
    impl DocumentBypass for WholeDocument {
        fn bypass(&self, _tree: &dyn NodeTree, _ctx: &mut ExecutionContext) -> DispatchResult<()> {
            Ok(())
        }
    }

    fn pair(selector: &str, name: &str, handler: Arc<dyn FragmentHandler>) -> (String, HandlerBinding) {
        (
            selector.to_string(),
            HandlerBinding::new(handler, BindingConfig::new(selector, "default", name)),
        )
    }

    #[test]
    fn test_grouping_preserves_first_seen_order() {
        let table = DeliveryTable::build(
            vec![
                pair("order/item", "one", Arc::new(Plain)),
                pair("order", "two", Arc::new(Plain)),
                pair("order/item", "three", Arc::new(Plain)),
            ],
            &DispatchConfig::default(),
        )
        .expect("should build");

        let report = table.report();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].0, "order/item");
        assert_eq!(report[0].1, vec!["one", "three"]);
        assert_eq!(report[1].0, "order");
    }

    #[test]
    fn test_groups_are_dependency_sorted() {
        let table = DeliveryTable::build(
            vec![
                pair("order", "consumer", Arc::new(Consumer("x"))),
                pair("order", "producer", Arc::new(Producer("x"))),
            ],
            &DispatchConfig::default(),
        )
        .expect("should build");
        assert_eq!(table.report()[0].1, vec!["producer", "consumer"]);
    }

    #[test]
    fn test_sorting_can_be_disabled() {
        let config = DispatchConfig {
            sort_handlers: false,
            ..DispatchConfig::default()
        };
        let table = DeliveryTable::build(
            vec![
                pair("order", "consumer", Arc::new(Consumer("x"))),
                pair("order", "producer", Arc::new(Producer("x"))),
            ],
            &config,
        )
        .expect("should build");
        assert_eq!(table.report()[0].1, vec!["consumer", "producer"]);
    }

    #[test]
    fn test_malformed_selector_aborts_build() {
        let result = DeliveryTable::build(
            vec![pair("a/@id/b", "bad", Arc::new(Plain))],
            &DispatchConfig::default(),
        );
        assert!(matches!(result, Err(WeftError::Selector(_))));
    }

    #[test]
    fn test_cycle_aborts_build() {
        struct TwoWay(&'static str, &'static str);
        impl FragmentHandler for TwoWay {
            fn produces(&self) -> BTreeSet<String> {
                [self.0.to_string()].into_iter().collect()
            }
            fn consumes(&self) -> BTreeSet<String> {
                [self.1.to_string()].into_iter().collect()
            }
        }
        let result = DeliveryTable::build(
            vec![
                pair("order", "A", Arc::new(TwoWay("a", "b"))),
                pair("order", "B", Arc::new(TwoWay("b", "a"))),
            ],
            &DispatchConfig::default(),
        );
        assert!(matches!(result, Err(WeftError::Cycle(_))));
    }

    #[test]
    fn test_bypass_detection() {
        let table = DeliveryTable::build(
            vec![pair("#document", "whole", Arc::new(WholeDocument))],
            &DispatchConfig::default(),
        )
        .expect("should build");
        assert!(table.bypass().is_some());

        // A second binding disqualifies the shortcut.
        let table = DeliveryTable::build(
            vec![
                pair("#document", "whole", Arc::new(WholeDocument)),
                pair("order", "plain", Arc::new(Plain)),
            ],
            &DispatchConfig::default(),
        )
        .expect("should build");
        assert!(table.bypass().is_none());

        // A non-bypass-capable whole-document handler does not qualify.
        let table = DeliveryTable::build(
            vec![pair("#document", "plain", Arc::new(Plain))],
            &DispatchConfig::default(),
        )
        .expect("should build");
        assert!(table.bypass().is_none());
    }

    #[test]
    fn test_lookup_by_text() {
        let table = DeliveryTable::build(
            vec![pair("order/item", "one", Arc::new(Plain))],
            &DispatchConfig::default(),
        )
        .expect("should build");
        assert!(table.lookup("order/item").is_some());
        assert!(table.lookup("other").is_none());
    }
}
