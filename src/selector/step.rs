//! Compiled selector data model: match steps, axes, and the builder used to
//! assemble selectors programmatically. Steps are immutable once compiled and
//! shared read-only across concurrent executions.

use std::fmt;

use crate::tree::QName;

/// Reserved token naming the whole-document fragment.
pub const DOCUMENT_FRAGMENT: &str = "#document";

/// Legacy alias for [`DOCUMENT_FRAGMENT`], accepted on input.
pub const DOCUMENT_FRAGMENT_LEGACY: &str = "$document";

/// Match axis of a single selector step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    DescendantOrSelf,
    Attribute,
}

/// One path segment of a compiled selector.
///
/// An attribute-carrying step (either `Axis::Attribute` or a merged
/// `element/@attr` tail) is always the final step of its selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorStep {
    name: QName,
    attribute: Option<String>,
    predicate: Option<String>,
    axis: Axis,
    rooted: bool,
}

impl SelectorStep {
    /// Step matching a child element by name.
    pub fn element(name: QName) -> Self {
        Self {
            name,
            attribute: None,
            predicate: None,
            axis: Axis::Child,
            rooted: false,
        }
    }

    /// Wildcard step consuming zero or more ancestor levels.
    pub fn descendant_or_self() -> Self {
        Self {
            name: QName::new("*"),
            attribute: None,
            predicate: None,
            axis: Axis::DescendantOrSelf,
            rooted: false,
        }
    }

    /// Standalone attribute step (`@attr` with no element part).
    pub fn attribute_only(attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        Self {
            name: QName::new("*"),
            attribute: Some(attribute),
            predicate: None,
            axis: Axis::Attribute,
            rooted: false,
        }
    }

    /// Step representing the whole-document fragment.
    pub fn document_root() -> Self {
        Self {
            name: QName::new(DOCUMENT_FRAGMENT),
            attribute: None,
            predicate: None,
            axis: Axis::Child,
            rooted: true,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub(crate) fn mark_rooted(&mut self) {
        self.rooted = true;
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn is_rooted(&self) -> bool {
        self.rooted
    }

    pub fn is_document_root(&self) -> bool {
        self.axis == Axis::Child && self.name.local == DOCUMENT_FRAGMENT
    }

    /// Whether this step targets an attribute rather than an element.
    pub fn targets_attribute(&self) -> bool {
        self.attribute.is_some()
    }
}

impl fmt::Display for SelectorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.axis {
            Axis::DescendantOrSelf => write!(f, "**"),
            Axis::Attribute => match &self.attribute {
                Some(attr) => write!(f, "@{attr}"),
                None => write!(f, "@"),
            },
            Axis::Child => {
                if self.is_document_root() {
                    return write!(f, "{DOCUMENT_FRAGMENT}");
                }
                write!(f, "{}", self.name)?;
                if let Some(pred) = &self.predicate {
                    write!(f, "[{pred}]")?;
                }
                if let Some(attr) = &self.attribute {
                    write!(f, "/@{attr}")?;
                }
                Ok(())
            }
        }
    }
}

/// An ordered, non-empty sequence of match steps plus the original selector
/// text for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSelector {
    text: String,
    steps: Vec<SelectorStep>,
    rooted: bool,
}

impl CompiledSelector {
    pub(crate) fn new(text: String, steps: Vec<SelectorStep>, rooted: bool) -> Self {
        debug_assert!(!steps.is_empty());
        Self {
            text,
            steps,
            rooted,
        }
    }

    /// Original selector text, as supplied at configuration time.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn steps(&self) -> &[SelectorStep] {
        &self.steps
    }

    pub fn is_rooted(&self) -> bool {
        self.rooted
    }

    pub fn last_step(&self) -> &SelectorStep {
        // Invariant: steps is non-empty.
        &self.steps[self.steps.len() - 1]
    }

    /// Whether this selector targets the whole-document fragment.
    pub fn is_document_target(&self) -> bool {
        self.steps.len() == 1 && self.steps[0].is_document_root()
    }

    /// Whether the final step targets an attribute.
    pub fn targets_attribute(&self) -> bool {
        self.last_step().targets_attribute()
    }
}

impl fmt::Display for CompiledSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_document_target() {
            return write!(f, "/");
        }
        if self.rooted {
            write!(f, "/")?;
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Programmatic selector assembly, mirroring what the compiler produces from
/// text. `build()` renders the canonical text form.
#[derive(Debug, Default)]
pub struct SelectorStepBuilder {
    steps: Vec<SelectorStep>,
    rooted: bool,
}

impl SelectorStepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rooted(mut self) -> Self {
        self.rooted = true;
        self
    }

    pub fn child(mut self, name: &str) -> Self {
        self.steps.push(SelectorStep::element(QName::parse(name)));
        self
    }

    pub fn child_with_predicate(mut self, name: &str, predicate: &str) -> Self {
        self.steps
            .push(SelectorStep::element(QName::parse(name)).with_predicate(predicate));
        self
    }

    pub fn descendant_or_self(mut self) -> Self {
        self.steps.push(SelectorStep::descendant_or_self());
        self
    }

    /// Attach a target attribute. Merges into the preceding element step when
    /// one exists, otherwise produces a standalone attribute step.
    pub fn attribute(mut self, name: &str) -> Self {
        match self.steps.last_mut() {
            Some(step) if step.axis() == Axis::Child && !step.targets_attribute() => {
                *step = step.clone().with_attribute(name);
            }
            _ => self.steps.push(SelectorStep::attribute_only(name)),
        }
        self
    }

    pub fn build(mut self) -> CompiledSelector {
        if self.steps.is_empty() {
            self.steps.push(SelectorStep::document_root());
            self.rooted = true;
        }
        if self.rooted {
            self.steps[0].mark_rooted();
        }
        let mut selector = CompiledSelector::new(String::new(), self.steps, self.rooted);
        selector.text = selector.to_string();
        selector
    }
}
