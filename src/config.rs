//! # Dispatch Configuration
//!
//! YAML-driven runtime policy for table construction and document dispatch,
//! with environment-specific overrides. All knobs have explicit defaults; a
//! missing configuration file is not an error, a malformed one is.
//!
//! ```yaml
//! sort_handlers: true
//! sort_order: producers_first
//! terminate_on_handler_error: true
//! environments:
//!   production:
//!     terminate_on_handler_error: false
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::sorter::SortOrder;

/// Configuration loading and validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration YAML: {0}")]
    InvalidYaml(String),
    #[error("Failed to read configuration file '{path}': {reason}")]
    FileRead { path: String, reason: String },
}

/// Runtime policy for the dispatch core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Whether handler chains are dependency-sorted at table build time.
    /// Disabled, declared insertion order is preserved verbatim.
    #[serde(default = "default_true")]
    pub sort_handlers: bool,

    /// Direction of the dependency sort.
    #[serde(default)]
    pub sort_order: SortOrder,

    /// Fatal mode: a handler failure aborts the current execution. Disabled,
    /// failures are recorded and dispatch continues (best effort).
    #[serde(default = "default_true")]
    pub terminate_on_handler_error: bool,

    /// Run after-handlers in reverse of before-handler order, for balanced
    /// nesting semantics (innermost produced last).
    #[serde(default)]
    pub reverse_visit_order_on_after: bool,

    /// Allow the whole-document bypass shortcut when the table records one.
    #[serde(default = "default_true")]
    pub allow_bypass: bool,

    /// Traversal nesting depth guard.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    256
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sort_handlers: true,
            sort_order: SortOrder::ProducersFirst,
            terminate_on_handler_error: true,
            reverse_visit_order_on_after: false,
            allow_bypass: true,
            max_depth: default_max_depth(),
        }
    }
}

/// Environment-specific overrides applied over the base document. Only the
/// fields present in the override section replace base values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfigOverride {
    pub sort_handlers: Option<bool>,
    pub sort_order: Option<SortOrder>,
    pub terminate_on_handler_error: Option<bool>,
    pub reverse_visit_order_on_after: Option<bool>,
    pub allow_bypass: Option<bool>,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct DispatchConfigDocument {
    #[serde(flatten)]
    base: DispatchConfig,
    #[serde(default)]
    environments: HashMap<String, DispatchConfigOverride>,
}

impl DispatchConfig {
    /// Load configuration from YAML content, resolved for `environment`.
    pub fn from_yaml(yaml_content: &str, environment: &str) -> Result<Self, ConfigError> {
        let document: DispatchConfigDocument = serde_yaml::from_str(yaml_content)
            .map_err(|e| ConfigError::InvalidYaml(e.to_string()))?;

        let mut config = document.base;
        if let Some(overrides) = document.environments.get(environment) {
            config.apply_override(overrides);
        }
        debug!(environment = %environment, ?config, "dispatch configuration resolved");
        Ok(config)
    }

    /// Load configuration from a YAML file, resolved for `environment`.
    pub fn from_yaml_file(path: &Path, environment: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&content, environment)
    }

    /// Load configuration with environment auto-detection (`WEFT_ENV`, then
    /// `APP_ENV`, defaulting to `development`). When `WEFT_CONFIG_PATH` is
    /// unset, defaults apply.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = detect_environment();
        match std::env::var("WEFT_CONFIG_PATH") {
            Ok(path) => Self::from_yaml_file(Path::new(&path), &environment),
            Err(_) => Ok(Self::default()),
        }
    }

    fn apply_override(&mut self, overrides: &DispatchConfigOverride) {
        if let Some(sort_handlers) = overrides.sort_handlers {
            self.sort_handlers = sort_handlers;
        }
        if let Some(sort_order) = overrides.sort_order {
            self.sort_order = sort_order;
        }
        if let Some(terminate) = overrides.terminate_on_handler_error {
            self.terminate_on_handler_error = terminate;
        }
        if let Some(reverse) = overrides.reverse_visit_order_on_after {
            self.reverse_visit_order_on_after = reverse;
        }
        if let Some(allow_bypass) = overrides.allow_bypass {
            self.allow_bypass = allow_bypass;
        }
        if let Some(max_depth) = overrides.max_depth {
            self.max_depth = max_depth;
        }
    }
}

fn detect_environment() -> String {
    std::env::var("WEFT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}
