//! # Dispatch Runtime
//!
//! ## Overview
//!
//! One [`Dispatcher`] per document execution. It borrows the shared,
//! immutable [`DeliveryTable`] and drives the element protocol over a
//! [`NodeTree`]: Enter (match targets against the ancestor chain) → Before →
//! Children (text and element notifications in document order, recursing into
//! element children) → After (optionally reversed) → Exit. All per-execution
//! state lives in the dispatcher's frame stack and the caller's
//! [`ExecutionContext`]; nothing is written back to the table.
//!
//! ## Key Features
//!
//! - **Fatal vs recoverable failures**: under `terminate_on_handler_error`
//!   a handler failure aborts the execution wrapped with its dispatch
//!   context; otherwise it is recorded on the context and dispatch continues.
//! - **Bridging**: elements carrying `source` + `visit` marker attributes
//!   redirect a stored value to the outer pipeline's table instead of being
//!   dispatched themselves.
//! - **Bypass**: a single whole-document binding with a bypass-capable
//!   handler skips traversal entirely, with observably identical output.

pub mod bridge;
pub mod context;

pub use bridge::{BridgeMarker, BridgeVisit, BRIDGE_SOURCE_ATTR, BRIDGE_VISIT_ATTR};
pub use context::{ExecutionContext, StoredValue};

use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::delivery::{DeliveryTable, TargetChain};
use crate::error::{DispatchError, DispatchResult};
use crate::events::{EventPublisher, ExecutionEventKind, InvocationOutcome};
use crate::handler::{Fragment, HandlerBinding, VisitPhase};
use crate::logging::log_dispatch_operation;
use crate::selector::{matches, matches_attribute, DOCUMENT_FRAGMENT};
use crate::tree::{NodeId, NodeKind, NodeTree, QName};

static NO_ATTRIBUTES: &[(QName, String)] = &[];

/// Lifecycle of a dispatcher. Dispatchers are single-use per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    NotStarted,
    Traversing,
    Finished,
}

/// Per-element traversal frame. Matched targets are recorded on entry and
/// drive the element's After phase when the frame is popped.
#[derive(Debug)]
pub struct ElementFrame {
    pub node: NodeId,
    pub depth: usize,
    /// Indices into the table's target list that matched this element.
    pub matched: Vec<usize>,
}

/// Drives one document execution against a delivery table.
#[derive(Debug)]
pub struct Dispatcher<'a> {
    table: &'a DeliveryTable,
    outer_table: Option<&'a DeliveryTable>,
    config: &'a DispatchConfig,
    publisher: Option<&'a EventPublisher>,
    state: ExecutionState,
    frames: Vec<ElementFrame>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(table: &'a DeliveryTable, config: &'a DispatchConfig) -> Self {
        Self {
            table,
            outer_table: None,
            config,
            publisher: None,
            state: ExecutionState::NotStarted,
            frames: Vec::new(),
        }
    }

    /// Register the outer pipeline's table as the bridge redirect target.
    /// Without one, redirects resolve against the dispatcher's own table.
    pub fn with_outer_table(mut self, outer_table: &'a DeliveryTable) -> Self {
        self.outer_table = Some(outer_table);
        self
    }

    pub fn with_publisher(mut self, publisher: &'a EventPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Execute the document rooted at `root`.
    ///
    /// Emits `ExecutionStarted`/`ExecutionFinished` around the run. A second
    /// call on the same dispatcher is an error.
    pub fn execute(
        &mut self,
        tree: &dyn NodeTree,
        root: NodeId,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        if self.state == ExecutionState::Finished {
            return Err(DispatchError::ExecutionFinished);
        }
        self.state = ExecutionState::Traversing;
        self.publish(ctx, ExecutionEventKind::ExecutionStarted);
        let execution_id = ctx.execution_id.to_string();
        log_dispatch_operation("execute", Some(&execution_id), None, "started", None);

        let result = match self.bypass_binding() {
            Some(binding) => self.run_bypass(tree, binding, ctx),
            None => self.dispatch_document(tree, root, ctx),
        };

        self.state = ExecutionState::Finished;
        self.publish(ctx, ExecutionEventKind::ExecutionFinished);
        let status = if result.is_ok() { "complete" } else { "failed" };
        log_dispatch_operation(
            "execute",
            Some(&execution_id),
            None,
            status,
            Some(&format!("recoverable_errors={}", ctx.errors().len())),
        );
        result
    }

    fn bypass_binding(&self) -> Option<&'a HandlerBinding> {
        if self.config.allow_bypass {
            self.table.bypass()
        } else {
            None
        }
    }

    fn run_bypass(
        &mut self,
        tree: &dyn NodeTree,
        binding: &HandlerBinding,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        let Some(handler) = binding.handler.as_bypass() else {
            return Ok(());
        };
        debug!(handler = %binding.config.handler_name, "taking whole-document bypass");
        let result = handler.bypass(tree, ctx);
        self.report(
            result,
            VisitPhase::Bypass,
            &binding.config.selector,
            DOCUMENT_FRAGMENT,
            &binding.config.handler_name,
            ctx,
        )
    }

    /// Dispatch the whole-document fragment around the root traversal.
    ///
    /// Document-target bindings fire here: bypass-capable handlers run their
    /// whole-document pass before the root is traversed, plain ones get
    /// before/after around it. The bypass shortcut in [`Self::execute`] skips
    /// only the traversal this path would run anyway; output is identical.
    fn dispatch_document(
        &mut self,
        tree: &dyn NodeTree,
        root: NodeId,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        let table = self.table;
        let doc_targets: Vec<usize> = table
            .targets()
            .iter()
            .enumerate()
            .filter(|(_, target)| target.selector.is_document_target())
            .map(|(i, _)| i)
            .collect();

        let doc_name = QName::new(DOCUMENT_FRAGMENT);
        let fragment = Fragment::new(&doc_name, NO_ATTRIBUTES);

        for &target_index in &doc_targets {
            let target = &table.targets()[target_index];
            for binding in &target.bindings {
                if let Some(handler) = binding.handler.as_bypass() {
                    let result = handler.bypass(tree, ctx);
                    self.report(
                        result,
                        VisitPhase::Bypass,
                        target.selector.text(),
                        DOCUMENT_FRAGMENT,
                        &binding.config.handler_name,
                        ctx,
                    )?;
                } else {
                    let result = binding.handler.visit_before(&fragment, ctx);
                    self.report(
                        result,
                        VisitPhase::Before,
                        target.selector.text(),
                        DOCUMENT_FRAGMENT,
                        &binding.config.handler_name,
                        ctx,
                    )?;
                }
            }
        }

        let mut chain: Vec<QName> = Vec::new();
        self.dispatch_element(tree, root, &mut chain, ctx)?;

        let mut after_pairs: Vec<(&TargetChain, &HandlerBinding)> = doc_targets
            .iter()
            .flat_map(|&target_index| {
                let target = &table.targets()[target_index];
                target
                    .bindings
                    .iter()
                    .filter(|binding| binding.handler.as_bypass().is_none())
                    .map(move |binding| (target, binding))
            })
            .collect();
        if self.config.reverse_visit_order_on_after {
            after_pairs.reverse();
        }
        for (target, binding) in after_pairs {
            let result = binding.handler.visit_after(&fragment, ctx);
            self.report(
                result,
                VisitPhase::After,
                target.selector.text(),
                DOCUMENT_FRAGMENT,
                &binding.config.handler_name,
                ctx,
            )?;
        }
        Ok(())
    }

    fn dispatch_element(
        &mut self,
        tree: &dyn NodeTree,
        node: NodeId,
        chain: &mut Vec<QName>,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        // Bridge markers redirect instead of dispatching; their subtree is
        // never traversed.
        if let Some(marker) = bridge::detect(tree, node) {
            return match marker {
                Ok(marker) => self.redirect(&marker, ctx),
                Err(err) => self.recover(err, ctx),
            };
        }

        let Some(name) = tree.name(node) else {
            return Ok(());
        };
        chain.push(name.clone());
        if chain.len() > self.config.max_depth {
            return Err(DispatchError::DepthLimitExceeded {
                limit: self.config.max_depth,
            });
        }

        let table = self.table;
        let attributes = tree.attributes(node);
        let matched: Vec<usize> = table
            .targets()
            .iter()
            .enumerate()
            .filter(|(_, target)| {
                if target.selector.targets_attribute() {
                    attributes
                        .iter()
                        .any(|(attr, _)| matches_attribute(&target.selector, chain, &attr.local))
                } else {
                    matches(&target.selector, chain)
                }
            })
            .map(|(i, _)| i)
            .collect();

        self.frames.push(ElementFrame {
            node,
            depth: chain.len(),
            matched: matched.clone(),
        });

        let fragment = Fragment::new(name, attributes);
        let element_label = name.to_string();

        for &target_index in &matched {
            let target = &table.targets()[target_index];
            for binding in &target.bindings {
                let result = binding.handler.visit_before(&fragment, ctx);
                self.report(
                    result,
                    VisitPhase::Before,
                    target.selector.text(),
                    &element_label,
                    &binding.config.handler_name,
                    ctx,
                )?;
            }
        }

        for child in tree.children(node) {
            match tree.kind(child) {
                NodeKind::Text => {
                    let Some(text) = tree.text(child) else {
                        continue;
                    };
                    for &target_index in &matched {
                        let target = &table.targets()[target_index];
                        for binding in &target.bindings {
                            let result = binding.handler.visit_child_text(&fragment, text, ctx);
                            self.report(
                                result,
                                VisitPhase::ChildText,
                                target.selector.text(),
                                &element_label,
                                &binding.config.handler_name,
                                ctx,
                            )?;
                        }
                    }
                }
                NodeKind::Element => {
                    // Bridge markers are not ordinary children; they get no
                    // child-element notification.
                    if bridge::detect(tree, child).is_none() {
                        if let Some(child_name) = tree.name(child) {
                            let child_fragment =
                                Fragment::new(child_name, tree.attributes(child));
                            for &target_index in &matched {
                                let target = &table.targets()[target_index];
                                for binding in &target.bindings {
                                    let result = binding.handler.visit_child_element(
                                        &fragment,
                                        &child_fragment,
                                        ctx,
                                    );
                                    self.report(
                                        result,
                                        VisitPhase::ChildElement,
                                        target.selector.text(),
                                        &element_label,
                                        &binding.config.handler_name,
                                        ctx,
                                    )?;
                                }
                            }
                        }
                    }
                    self.dispatch_element(tree, child, chain, ctx)?;
                }
            }
        }

        let Some(frame) = self.frames.pop() else {
            chain.pop();
            return Ok(());
        };
        let mut after_pairs: Vec<(&TargetChain, &HandlerBinding)> = frame
            .matched
            .iter()
            .flat_map(|&target_index| {
                let target = &table.targets()[target_index];
                target.bindings.iter().map(move |binding| (target, binding))
            })
            .collect();
        if self.config.reverse_visit_order_on_after {
            after_pairs.reverse();
        }
        for (target, binding) in after_pairs {
            let result = binding.handler.visit_after(&fragment, ctx);
            self.report(
                result,
                VisitPhase::After,
                target.selector.text(),
                &element_label,
                &binding.config.handler_name,
                ctx,
            )?;
        }
        debug!(
            node = ?frame.node,
            depth = frame.depth,
            matched = frame.matched.len(),
            "element dispatched"
        );

        chain.pop();
        Ok(())
    }

    /// Dispatch a stored value to the redirect target table in place of the
    /// bridge marker element.
    fn redirect(&mut self, marker: &BridgeMarker, ctx: &mut ExecutionContext) -> DispatchResult<()> {
        let table = self.outer_table.unwrap_or(self.table);

        let Some(value) = ctx.value(&marker.source_key).cloned() else {
            return self.recover(
                DispatchError::BridgeSourceMissing {
                    key: marker.source_key.clone(),
                },
                ctx,
            );
        };

        let (attributes, text) = match &value {
            StoredValue::Element { attributes, .. } => (attributes.as_slice(), None),
            StoredValue::Text { text, .. } => (NO_ATTRIBUTES, Some(text.as_str())),
        };

        // A textual value downgrades an after-redirect to child-text; a
        // child-text redirect of an element value cannot be represented.
        let mode = match marker.visit {
            BridgeVisit::Before => BridgeVisit::Before,
            BridgeVisit::ChildText => {
                if text.is_none() {
                    return self.recover(
                        DispatchError::BridgeSourceNotText {
                            key: marker.source_key.clone(),
                        },
                        ctx,
                    );
                }
                BridgeVisit::ChildText
            }
            BridgeVisit::After => {
                if text.is_some() {
                    BridgeVisit::ChildText
                } else {
                    BridgeVisit::After
                }
            }
        };

        let Some(name) = value.chain().last() else {
            return Ok(());
        };
        let fragment = Fragment::new(name, attributes);
        let element_label = name.to_string();

        let mut matched_pairs: Vec<(&TargetChain, &HandlerBinding)> = table
            .targets()
            .iter()
            .filter(|target| matches(&target.selector, value.chain()))
            .flat_map(|target| target.bindings.iter().map(move |binding| (target, binding)))
            .collect();

        debug!(
            source = %marker.source_key,
            visit = ?marker.visit,
            subject = %element_label,
            bindings = matched_pairs.len(),
            "bridge redirect"
        );

        match mode {
            BridgeVisit::Before => {
                for (target, binding) in matched_pairs {
                    let result = binding.handler.visit_before(&fragment, ctx);
                    self.report(
                        result,
                        VisitPhase::Before,
                        target.selector.text(),
                        &element_label,
                        &binding.config.handler_name,
                        ctx,
                    )?;
                }
            }
            BridgeVisit::ChildText => {
                let Some(text) = text else {
                    return Ok(());
                };
                for (target, binding) in matched_pairs {
                    let result = binding.handler.visit_child_text(&fragment, text, ctx);
                    self.report(
                        result,
                        VisitPhase::ChildText,
                        target.selector.text(),
                        &element_label,
                        &binding.config.handler_name,
                        ctx,
                    )?;
                }
            }
            BridgeVisit::After => {
                if self.config.reverse_visit_order_on_after {
                    matched_pairs.reverse();
                }
                for (target, binding) in matched_pairs {
                    let result = binding.handler.visit_after(&fragment, ctx);
                    self.report(
                        result,
                        VisitPhase::After,
                        target.selector.text(),
                        &element_label,
                        &binding.config.handler_name,
                        ctx,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Publish the invocation outcome and apply the failure policy.
    fn report(
        &self,
        result: DispatchResult<()>,
        phase: VisitPhase,
        selector: &str,
        element: &str,
        handler: &str,
        ctx: &mut ExecutionContext,
    ) -> DispatchResult<()> {
        match result {
            Ok(()) => {
                self.publish(
                    ctx,
                    ExecutionEventKind::HandlerInvoked {
                        phase,
                        selector: selector.to_string(),
                        element: element.to_string(),
                        handler: handler.to_string(),
                        outcome: InvocationOutcome::Success,
                    },
                );
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                self.publish(
                    ctx,
                    ExecutionEventKind::HandlerInvoked {
                        phase,
                        selector: selector.to_string(),
                        element: element.to_string(),
                        handler: handler.to_string(),
                        outcome: InvocationOutcome::Failure(reason.clone()),
                    },
                );
                self.recover(
                    DispatchError::HandlerFailed {
                        handler: handler.to_string(),
                        phase: phase.to_string(),
                        selector: selector.to_string(),
                        element: element.to_string(),
                        reason,
                    },
                    ctx,
                )
            }
        }
    }

    /// Fatal mode propagates; recoverable mode records and continues.
    fn recover(&self, error: DispatchError, ctx: &mut ExecutionContext) -> DispatchResult<()> {
        if self.config.terminate_on_handler_error {
            Err(error)
        } else {
            warn!(error = %error, "recoverable dispatch error");
            ctx.record_error(error);
            Ok(())
        }
    }

    fn publish(&self, ctx: &ExecutionContext, kind: ExecutionEventKind) {
        if let Some(publisher) = self.publisher {
            publisher.publish(ctx.execution_id, kind);
        }
    }
}
