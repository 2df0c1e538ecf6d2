//! Per-execution mutable state: the shared value store handlers communicate
//! through, the accumulated output, and the recoverable-error record.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::DispatchError;
use crate::tree::QName;

/// A value a handler deposited into the execution store. Each entry snapshots
/// the full ancestor chain of its subject so selector matching keeps working
/// when the value later becomes a bridge redirect subject.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// An element subject: its chain and the attributes captured at store time.
    Element {
        chain: Vec<QName>,
        attributes: Vec<(QName, String)>,
    },
    /// A character-data subject: the chain of its parent element and the text.
    Text { chain: Vec<QName>, text: String },
}

impl StoredValue {
    /// The ancestor chain of the subject, outermost first.
    pub fn chain(&self) -> &[QName] {
        match self {
            StoredValue::Element { chain, .. } => chain,
            StoredValue::Text { chain, .. } => chain,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, StoredValue::Text { .. })
    }
}

/// State owned by a single document execution. Never shared between
/// executions; handlers reach it only through `&mut` during their own
/// invocation.
#[derive(Debug)]
pub struct ExecutionContext {
    /// Correlation id carried on every lifecycle event of this execution.
    pub execution_id: Uuid,
    values: HashMap<String, StoredValue>,
    /// Output accumulated by handlers.
    pub output: String,
    errors: Vec<DispatchError>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            values: HashMap::new(),
            output: String::new(),
            errors: Vec::new(),
        }
    }

    /// Deposit a named value, replacing any previous entry under `key`.
    pub fn store_value(&mut self, key: impl Into<String>, value: StoredValue) {
        self.values.insert(key.into(), value);
    }

    pub fn value(&self, key: &str) -> Option<&StoredValue> {
        self.values.get(key)
    }

    /// Record a recoverable dispatch error and continue.
    pub fn record_error(&mut self, error: DispatchError) {
        self.errors.push(error);
    }

    /// Errors recorded in recoverable mode, in occurrence order.
    pub fn errors(&self) -> &[DispatchError] {
        &self.errors
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
