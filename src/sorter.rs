//! # Handler Dependency Sorter
//!
//! Topologically orders the handler bindings sharing a match target
//! according to their declared produces/consumes capability sets. Invoked
//! once per distinct selector at configuration-build time, never during
//! document execution.
//!
//! A binding depends on another when its consumes set intersects the other's
//! produces set. Sorting is depth-first with dependencies emitted first;
//! bindings declaring neither set keep their declared order, and with no
//! dependencies anywhere the output equals the input for both sort orders.
//! Cycles are detected during the walk and reported with the full dependency
//! chain; the chain format is stable and relied on by downstream tooling.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::handler::HandlerBinding;

/// Direction of the dependency sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Every producer is ordered before the bindings consuming its products.
    #[default]
    ProducersFirst,
    /// Every consumer is ordered before the bindings producing its inputs.
    ConsumersFirst,
}

/// Circular producer/consumer dependency, carrying the rendered chain from
/// the point of re-entry. Configuration-time, fail-fast.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Circular handler dependency detected:\n{chain}")]
pub struct CycleError {
    pub chain: String,
}

/// Sort `bindings` in place according to `order`.
///
/// The sorted output keeps three ordered sections: bindings participating as
/// leaders for the given order (producers for [`SortOrder::ProducersFirst`],
/// consumers for [`SortOrder::ConsumersFirst`]) in dependency order, then
/// bindings with no declared capabilities in input order, then the remaining
/// pure followers in input order.
pub fn sort(bindings: &mut Vec<HandlerBinding>, order: SortOrder) -> Result<(), CycleError> {
    let n = bindings.len();
    if n <= 1 {
        return Ok(());
    }

    // Dependency edges in input order: for producers-first, i depends on the
    // producers of what it consumes; for consumers-first, on the consumers of
    // what it produces.
    let deps: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| {
                    j != i
                        && match order {
                            SortOrder::ProducersFirst => bindings[i].depends_on(&bindings[j]),
                            SortOrder::ConsumersFirst => bindings[j].depends_on(&bindings[i]),
                        }
                })
                .collect()
        })
        .collect();

    let leads: Vec<bool> = bindings
        .iter()
        .map(|b| match order {
            SortOrder::ProducersFirst => b.is_producer(),
            SortOrder::ConsumersFirst => b.is_consumer(),
        })
        .collect();
    let tails: Vec<bool> = bindings
        .iter()
        .map(|b| match order {
            SortOrder::ProducersFirst => b.is_consumer() && !b.is_producer(),
            SortOrder::ConsumersFirst => b.is_producer() && !b.is_consumer(),
        })
        .collect();

    let mut walk = Walk {
        bindings: bindings.as_slice(),
        deps: &deps,
        leads: &leads,
        done: vec![false; n],
        visiting: vec![false; n],
        stack: Vec::new(),
        emitted: Vec::new(),
    };
    for i in 0..n {
        walk.visit(i)?;
    }
    let mut permutation = walk.emitted;

    permutation.extend((0..n).filter(|&i| !leads[i] && !tails[i]));
    permutation.extend((0..n).filter(|&i| tails[i]));
    debug_assert_eq!(permutation.len(), n);

    debug!(
        order = ?order,
        bindings = n,
        permutation = ?permutation,
        "sorted handler chain"
    );

    let sorted: Vec<HandlerBinding> = permutation.iter().map(|&i| bindings[i].clone()).collect();
    *bindings = sorted;
    Ok(())
}

struct Walk<'a> {
    bindings: &'a [HandlerBinding],
    deps: &'a [Vec<usize>],
    leads: &'a [bool],
    done: Vec<bool>,
    visiting: Vec<bool>,
    stack: Vec<usize>,
    emitted: Vec<usize>,
}

impl Walk<'_> {
    fn visit(&mut self, i: usize) -> Result<(), CycleError> {
        if self.done[i] {
            return Ok(());
        }
        if self.visiting[i] {
            return Err(self.cycle_error(i));
        }
        self.visiting[i] = true;
        self.stack.push(i);
        for d in 0..self.deps[i].len() {
            let dep = self.deps[i][d];
            self.visit(dep)?;
        }
        self.stack.pop();
        self.visiting[i] = false;
        self.done[i] = true;
        if self.leads[i] {
            self.emitted.push(i);
        }
        Ok(())
    }

    /// Render the dependency chain by walking the active recursion stack from
    /// the point of re-entry, one binding per line, with indentation
    /// proportional to depth.
    fn cycle_error(&self, reentry: usize) -> CycleError {
        let start = self
            .stack
            .iter()
            .position(|&s| s == reentry)
            .unwrap_or(0);
        let mut chain = String::new();
        for (depth, &idx) in self.stack[start..]
            .iter()
            .chain(std::iter::once(&reentry))
            .enumerate()
        {
            if depth > 0 {
                chain.push('\n');
                for _ in 0..depth {
                    chain.push('\t');
                }
                chain.push_str("depends-on: ");
            }
            chain.push_str(&self.bindings[idx].render());
        }
        CycleError { chain }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BindingConfig, FragmentHandler};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    struct Declared {
        produces: BTreeSet<String>,
        consumes: BTreeSet<String>,
    }

    impl FragmentHandler for Declared {
        fn produces(&self) -> BTreeSet<String> {
            self.produces.clone()
        }
        fn consumes(&self) -> BTreeSet<String> {
            self.consumes.clone()
        }
    }

    fn binding(name: &str, produces: &[&str], consumes: &[&str]) -> HandlerBinding {
        HandlerBinding::new(
            Arc::new(Declared {
                produces: produces.iter().map(|s| s.to_string()).collect(),
                consumes: consumes.iter().map(|s| s.to_string()).collect(),
            }),
            BindingConfig::new("order", "default", name),
        )
    }

    fn names(bindings: &[HandlerBinding]) -> Vec<String> {
        bindings
            .iter()
            .map(|b| b.config.handler_name.clone())
            .collect()
    }

    #[test]
    fn test_no_dependencies_keeps_input_order() {
        for order in [SortOrder::ProducersFirst, SortOrder::ConsumersFirst] {
            let mut bindings = vec![
                binding("one", &[], &[]),
                binding("two", &[], &[]),
                binding("three", &[], &[]),
            ];
            sort(&mut bindings, order).expect("should sort");
            assert_eq!(names(&bindings), vec!["one", "two", "three"]);
        }
    }

    #[test]
    fn test_producers_before_consumers() {
        let mut bindings = vec![
            binding("consumer", &[], &["x"]),
            binding("producer", &["x"], &[]),
        ];
        sort(&mut bindings, SortOrder::ProducersFirst).expect("should sort");
        assert_eq!(names(&bindings), vec!["producer", "consumer"]);
    }

    #[test]
    fn test_consumers_first_reverses_direction() {
        let mut bindings = vec![
            binding("producer", &["x"], &[]),
            binding("consumer", &[], &["x"]),
        ];
        sort(&mut bindings, SortOrder::ConsumersFirst).expect("should sort");
        assert_eq!(names(&bindings), vec!["consumer", "producer"]);
    }

    #[test]
    fn test_fixture_permutation_producers_first() {
        let mut bindings = vec![
            binding("h0", &[], &["e", "f"]),
            binding("h1", &["h"], &["g"]),
            binding("h2", &["a", "b", "c"], &[]),
            binding("h3", &[], &[]),
            binding("h4", &[], &["d", "g"]),
            binding("h5", &["d", "e"], &[]),
            binding("h6", &[], &["b"]),
            binding("h7", &[], &[]),
            binding("h8", &["g"], &["c"]),
        ];
        sort(&mut bindings, SortOrder::ProducersFirst).expect("should sort");
        assert_eq!(
            names(&bindings),
            vec!["h5", "h2", "h8", "h1", "h3", "h7", "h0", "h4", "h6"]
        );
    }

    #[test]
    fn test_direct_cycle_chain_message() {
        let mut bindings = vec![
            binding("A", &["a"], &["b"]),
            binding("B", &["b"], &["a"]),
        ];
        let err = sort(&mut bindings, SortOrder::ProducersFirst).expect_err("should cycle");
        let expected = "Circular handler dependency detected:\n\
                        default:order[handler=A, params=0]\n\
                        \tdepends-on: default:order[handler=B, params=0]\n\
                        \t\tdepends-on: default:order[handler=A, params=0]";
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_four_node_cycle_chain_message() {
        let mut bindings = vec![
            binding("A", &["a"], &["b"]),
            binding("B", &["b"], &["c"]),
            binding("C", &["c"], &["d"]),
            binding("D", &["d"], &["a"]),
        ];
        let err = sort(&mut bindings, SortOrder::ProducersFirst).expect_err("should cycle");
        let expected = "Circular handler dependency detected:\n\
                        default:order[handler=A, params=0]\n\
                        \tdepends-on: default:order[handler=B, params=0]\n\
                        \t\tdepends-on: default:order[handler=C, params=0]\n\
                        \t\t\tdepends-on: default:order[handler=D, params=0]\n\
                        \t\t\t\tdepends-on: default:order[handler=A, params=0]";
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_cycle_detected_under_consumers_first() {
        let mut bindings = vec![
            binding("A", &["a"], &["b"]),
            binding("B", &["b"], &["a"]),
        ];
        assert!(sort(&mut bindings, SortOrder::ConsumersFirst).is_err());
    }

    #[test]
    fn test_dag_ordering_holds_for_every_consumer() {
        let mut bindings = vec![
            binding("c_ab", &[], &["a", "b"]),
            binding("p_a", &["a"], &[]),
            binding("pc", &["b"], &["a"]),
            binding("plain", &[], &[]),
        ];
        sort(&mut bindings, SortOrder::ProducersFirst).expect("should sort");
        let sorted = names(&bindings);
        let pos = |n: &str| sorted.iter().position(|s| s == n).expect("present");
        assert!(pos("p_a") < pos("c_ab"));
        assert!(pos("p_a") < pos("pc"));
        assert!(pos("pc") < pos("c_ab"));
    }

    mod stability_properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sort_without_capabilities_is_identity(count in 0usize..24) {
                for order in [SortOrder::ProducersFirst, SortOrder::ConsumersFirst] {
                    let mut bindings: Vec<HandlerBinding> = (0..count)
                        .map(|i| binding(&format!("handler-{i}"), &[], &[]))
                        .collect();
                    let before = names(&bindings);
                    sort(&mut bindings, order).expect("should sort");
                    prop_assert_eq!(before, names(&bindings));
                }
            }
        }
    }
}
