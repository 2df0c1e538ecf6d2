//! Selector compiler: restricted-XPath text in, ordered match steps out.
//!
//! Compilation happens once per distinct selector at configuration-build
//! time. Normalization runs before structural parsing, in a fixed order:
//! whitespace collapsing, legacy whole-document tokens, `**` wildcard
//! rewriting, rooted-flag detection, encoded leading tokens, and trailing
//! descendant wildcards. Errors are fail-fast and carry the original text.

use thiserror::Error;

use crate::selector::step::{
    Axis, CompiledSelector, SelectorStep, DOCUMENT_FRAGMENT, DOCUMENT_FRAGMENT_LEGACY,
};
use crate::tree::QName;

/// Selector compilation failures. All variants carry the original selector
/// text; step-level variants also name the offending segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("Empty selector expression: '{selector}'")]
    EmptyExpression { selector: String },

    #[error("Unsupported axis in selector '{selector}' at step '{step}'")]
    UnsupportedAxis { selector: String, step: String },

    #[error("Attribute step must be the final step in selector '{selector}': step '{step}'")]
    AttributeNotLast { selector: String, step: String },
}

/// Compile a selector expression into an ordered list of match steps.
pub fn compile(text: &str) -> Result<CompiledSelector, SelectorError> {
    let original = text.trim().to_string();
    if original.is_empty() {
        return Err(SelectorError::EmptyExpression {
            selector: text.to_string(),
        });
    }

    let mut expr = collapse_whitespace(&original);
    expr = strip_document_token(&expr);
    expr = normalize_descendant_markers(&expr);

    let mut rooted = false;
    if let Some(rest) = expr.strip_prefix('/') {
        rooted = true;
        expr = rest.to_string();
    }

    let mut steps: Vec<SelectorStep> = Vec::new();
    let mut remainder = expr.as_str();

    // A leading reserved-sigil token that survived document-token stripping
    // is an encoded token: its first segment becomes a pre-built literal step.
    if remainder.starts_with('#') || remainder.starts_with('$') {
        let (first, rest) = match remainder.split_once('/') {
            Some((first, rest)) => (first, rest),
            None => (remainder, ""),
        };
        steps.push(SelectorStep::element(QName::new(first)));
        remainder = rest;
    }

    let segments: Vec<&str> = remainder.split('/').filter(|s| !s.is_empty()).collect();
    let count = segments.len();

    for (i, segment) in segments.iter().enumerate() {
        let is_last = i + 1 == count;

        if *segment == "**" {
            steps.push(SelectorStep::descendant_or_self());
            continue;
        }

        if let Some(attr) = segment.strip_prefix('@') {
            if !is_last {
                return Err(SelectorError::AttributeNotLast {
                    selector: original,
                    step: (*segment).to_string(),
                });
            }
            push_attribute_step(&mut steps, attr);
            continue;
        }

        if let Some((axis, rest)) = segment.split_once("::") {
            match axis {
                "child" => steps.push(element_step(rest)),
                "attribute" => {
                    if !is_last {
                        return Err(SelectorError::AttributeNotLast {
                            selector: original,
                            step: (*segment).to_string(),
                        });
                    }
                    push_attribute_step(&mut steps, rest);
                }
                _ => {
                    return Err(SelectorError::UnsupportedAxis {
                        selector: original,
                        step: (*segment).to_string(),
                    });
                }
            }
            continue;
        }

        steps.push(element_step(segment));
    }

    if steps.is_empty() {
        if rooted {
            steps.push(SelectorStep::document_root());
        } else {
            return Err(SelectorError::EmptyExpression { selector: original });
        }
    }
    if rooted {
        steps[0].mark_rooted();
    }

    Ok(CompiledSelector::new(original, steps, rooted))
}

/// Collapse whitespace runs outside `[...]` predicates into single `/`
/// separators. Bracket contents pass through verbatim.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut in_run = false;
    for c in text.chars() {
        match c {
            '[' => {
                depth += 1;
                out.push(c);
                in_run = false;
            }
            ']' => {
                depth = depth.saturating_sub(1);
                out.push(c);
                in_run = false;
            }
            c if c.is_whitespace() && depth == 0 => {
                if !in_run {
                    out.push('/');
                    in_run = true;
                }
            }
            c => {
                out.push(c);
                in_run = false;
            }
        }
    }
    out
}

/// Replace the legacy whole-document tokens: an exact token becomes an
/// absolute root reference, a token prefix is stripped down to one.
fn strip_document_token(expr: &str) -> String {
    for token in [DOCUMENT_FRAGMENT, DOCUMENT_FRAGMENT_LEGACY] {
        if expr == token {
            return "/".to_string();
        }
        if let Some(rest) = expr.strip_prefix(token) {
            if let Some(rest) = rest.strip_prefix('/') {
                return format!("/{rest}");
            }
        }
    }
    expr.to_string()
}

/// Rewrite `//` descendant markers into explicit `**` segments so structural
/// parsing sees a uniform wildcard form.
fn normalize_descendant_markers(expr: &str) -> String {
    let mut out = expr.to_string();
    while out.contains("//") {
        out = out.replace("//", "/**/");
    }
    out
}

fn element_step(segment: &str) -> SelectorStep {
    let (name, predicate) = split_predicate(segment);
    let mut step = SelectorStep::element(QName::parse(name));
    if let Some(pred) = predicate {
        step = step.with_predicate(pred);
    }
    step
}

/// Split `name[predicate]` into its parts. Predicates pass through verbatim;
/// this core does not interpret them.
fn split_predicate(segment: &str) -> (&str, Option<&str>) {
    if let Some(open) = segment.find('[') {
        if segment.ends_with(']') {
            return (&segment[..open], Some(&segment[open + 1..segment.len() - 1]));
        }
    }
    (segment, None)
}

/// Merge a final attribute segment into the preceding element step, falling
/// back to a standalone attribute-axis step. The merged `element/@attr` tail
/// is what lets the matcher evaluate both with one step.
fn push_attribute_step(steps: &mut Vec<SelectorStep>, attribute: &str) {
    match steps.last_mut() {
        Some(step) if step.axis() == Axis::Child && !step.targets_attribute() => {
            *step = step.clone().with_attribute(attribute);
        }
        _ => steps.push(SelectorStep::attribute_only(attribute)),
    }
}
