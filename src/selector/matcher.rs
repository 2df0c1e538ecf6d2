//! Path matcher: evaluates a compiled selector against an element's ancestor
//! chain. Pure predicates over shared immutable data, callable concurrently
//! from any number of dispatch runtimes.
//!
//! Matching walks right to left: the deepest ancestor must satisfy the last
//! non-wildcard step, and `DescendantOrSelf` steps greedily consume
//! intervening levels until the next concrete step matches. Rooted selectors
//! additionally require the whole chain to be consumed.

use crate::selector::step::{Axis, CompiledSelector};
use crate::tree::QName;

/// Whether `selector` matches an element whose ancestor chain (outermost
/// first, the element itself last) is `chain`.
///
/// Attribute-terminated selectors never match through this entry point; use
/// [`matches_attribute`].
pub fn matches(selector: &CompiledSelector, chain: &[QName]) -> bool {
    if selector.targets_attribute() {
        return false;
    }
    match_steps(selector, chain)
}

/// Whether `selector` matches the attribute `attribute` of the element at the
/// end of `chain`. Only meaningful for attribute-terminated selectors.
pub fn matches_attribute(selector: &CompiledSelector, chain: &[QName], attribute: &str) -> bool {
    if selector.last_step().attribute() != Some(attribute) {
        return false;
    }
    match_steps(selector, chain)
}

fn match_steps(selector: &CompiledSelector, chain: &[QName]) -> bool {
    // Exclusive upper bound of the unconsumed chain portion.
    let mut upper = chain.len();
    // Set when a descendant-or-self step separates us from the next concrete
    // step, allowing it to match at any remaining depth.
    let mut skipping = false;

    for step in selector.steps().iter().rev() {
        match step.axis() {
            Axis::DescendantOrSelf => {
                skipping = true;
            }
            // A standalone attribute step has no element part to consume; the
            // attribute name itself was checked by the caller.
            Axis::Attribute => {}
            Axis::Child => {
                if step.is_document_root() {
                    if upper != 0 {
                        return false;
                    }
                    skipping = false;
                    continue;
                }
                if skipping {
                    loop {
                        if upper == 0 {
                            return false;
                        }
                        upper -= 1;
                        if step.name().selects(&chain[upper]) {
                            break;
                        }
                    }
                    skipping = false;
                } else {
                    if upper == 0 {
                        return false;
                    }
                    upper -= 1;
                    if !step.name().selects(&chain[upper]) {
                        return false;
                    }
                }
            }
        }
    }

    // A wildcard still pending after the walk consumes whatever remains of
    // the chain.
    if skipping {
        upper = 0;
    }
    if selector.is_rooted() && upper != 0 {
        return false;
    }
    true
}
