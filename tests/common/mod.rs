//! Shared handlers and document builders for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use weft_core::error::DispatchResult;
use weft_core::handler::{BindingConfig, Fragment, FragmentHandler, HandlerBinding};
use weft_core::runtime::{ExecutionContext, StoredValue};
use weft_core::tree::{DocumentTree, NodeTree};

/// Appends one line per invocation to the context output, in the shape
/// `label:phase:element[=payload];`.
pub struct Recorder {
    pub label: &'static str,
}

impl FragmentHandler for Recorder {
    fn visit_before(
        &self,
        fragment: &Fragment<'_>,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        ctx.output
            .push_str(&format!("{}:before:{};", self.label, fragment.name.local));
        Ok(())
    }

    fn visit_child_text(
        &self,
        fragment: &Fragment<'_>,
        text: &str,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        ctx.output.push_str(&format!(
            "{}:text:{}={};",
            self.label, fragment.name.local, text
        ));
        Ok(())
    }

    fn visit_child_element(
        &self,
        fragment: &Fragment<'_>,
        child: &Fragment<'_>,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        ctx.output.push_str(&format!(
            "{}:child:{}>{};",
            self.label, fragment.name.local, child.name.local
        ));
        Ok(())
    }

    fn visit_after(
        &self,
        fragment: &Fragment<'_>,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        ctx.output
            .push_str(&format!("{}:after:{};", self.label, fragment.name.local));
        Ok(())
    }
}

/// Captures the matched element (chain and attributes) into the value store
/// under a fixed key during `visit_before`.
pub struct ElementCapture {
    pub key: &'static str,
    pub chain: Vec<&'static str>,
}

impl FragmentHandler for ElementCapture {
    fn visit_before(
        &self,
        fragment: &Fragment<'_>,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        ctx.store_value(
            self.key,
            StoredValue::Element {
                chain: self
                    .chain
                    .iter()
                    .map(|n| weft_core::tree::QName::parse(n))
                    .collect(),
                attributes: fragment.attributes.to_vec(),
            },
        );
        Ok(())
    }
}

/// Captures each text child into the value store under a fixed key.
pub struct TextCapture {
    pub key: &'static str,
    pub chain: Vec<&'static str>,
}

impl FragmentHandler for TextCapture {
    fn visit_child_text(
        &self,
        _fragment: &Fragment<'_>,
        text: &str,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        ctx.store_value(
            self.key,
            StoredValue::Text {
                chain: self
                    .chain
                    .iter()
                    .map(|n| weft_core::tree::QName::parse(n))
                    .collect(),
                text: text.to_string(),
            },
        );
        Ok(())
    }
}

pub fn recorder(selector: &str, label: &'static str) -> (String, HandlerBinding) {
    bind(selector, label, Arc::new(Recorder { label }))
}

pub fn bind(
    selector: &str,
    name: &str,
    handler: Arc<dyn FragmentHandler>,
) -> (String, HandlerBinding) {
    (
        selector.to_string(),
        HandlerBinding::new(handler, BindingConfig::new(selector, "default", name)),
    )
}

/// `<order><header date="2020-01-01"/><item id="1">socks</item>
/// <item id="2">shoes</item></order>`
pub fn order_document() -> DocumentTree {
    let mut tree = DocumentTree::new("order");
    let root = tree.root();
    let header = tree.append_element(root, "header");
    tree.set_attribute(header, "date", "2020-01-01");
    let first = tree.append_element(root, "item");
    tree.set_attribute(first, "id", "1");
    tree.append_text(first, "socks");
    let second = tree.append_element(root, "item");
    tree.set_attribute(second, "id", "2");
    tree.append_text(second, "shoes");
    tree
}
