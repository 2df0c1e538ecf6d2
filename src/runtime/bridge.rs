//! Bridge marker recognition.
//!
//! An element carrying both the `source` and `visit` marker attributes is a
//! bridge node: it is never dispatched as an ordinary element. The stored
//! value named by `source` becomes the event subject and the `visit` mode
//! selects the dispatch point the redirect feeds.

use crate::error::{DispatchError, DispatchResult};
use crate::tree::{NodeId, NodeTree};

/// Marker attribute naming the stored value that becomes the event subject.
pub const BRIDGE_SOURCE_ATTR: &str = "source";
/// Marker attribute selecting the redirected dispatch point.
pub const BRIDGE_VISIT_ATTR: &str = "visit";

/// The dispatch point a bridge redirect feeds. The node attribute wire
/// format (`visitBefore` / `visitChildText` / `visitAfter`) is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeVisit {
    Before,
    ChildText,
    After,
}

impl BridgeVisit {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "visitBefore" => Some(BridgeVisit::Before),
            "visitChildText" => Some(BridgeVisit::ChildText),
            "visitAfter" => Some(BridgeVisit::After),
            _ => None,
        }
    }
}

/// A recognized bridge marker.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeMarker {
    pub source_key: String,
    pub visit: BridgeVisit,
}

/// Recognize a bridge marker on `node`. `None` when the node is not a bridge
/// (one or both marker attributes absent); `Some(Err)` when the markers are
/// present but the `visit` value is unrecognized.
pub fn detect(tree: &dyn NodeTree, node: NodeId) -> Option<DispatchResult<BridgeMarker>> {
    let source_key = tree.attribute(node, BRIDGE_SOURCE_ATTR)?;
    let visit_value = tree.attribute(node, BRIDGE_VISIT_ATTR)?;
    Some(match BridgeVisit::parse(visit_value) {
        Some(visit) => Ok(BridgeMarker {
            source_key: source_key.to_string(),
            visit,
        }),
        None => Err(DispatchError::BridgeVisitUnrecognized {
            value: visit_value.to_string(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DocumentTree;

    #[test]
    fn test_plain_element_is_not_a_bridge() {
        let mut tree = DocumentTree::new("order");
        let item = tree.append_element(tree.root(), "item");
        tree.set_attribute(item, "source", "key");
        assert!(detect(&tree, tree.root()).is_none());
        // `source` without `visit` is still an ordinary element.
        assert!(detect(&tree, item).is_none());
    }

    #[test]
    fn test_marker_detection() {
        let mut tree = DocumentTree::new("order");
        let marker = tree.append_element(tree.root(), "redirect");
        tree.set_attribute(marker, "source", "total");
        tree.set_attribute(marker, "visit", "visitAfter");

        let detected = detect(&tree, marker).expect("is a bridge").expect("valid");
        assert_eq!(detected.source_key, "total");
        assert_eq!(detected.visit, BridgeVisit::After);
    }

    #[test]
    fn test_unrecognized_visit_value_is_error() {
        let mut tree = DocumentTree::new("order");
        let marker = tree.append_element(tree.root(), "redirect");
        tree.set_attribute(marker, "source", "total");
        tree.set_attribute(marker, "visit", "visitChildElement");

        let err = detect(&tree, marker)
            .expect("is a bridge")
            .expect_err("should be rejected");
        assert_eq!(
            err,
            DispatchError::BridgeVisitUnrecognized {
                value: "visitChildElement".to_string()
            }
        );
    }
}
