//! Error types for kobserve.
//!
//! Observation itself never fails: reads, writes and deletes through an
//! observable always succeed. Errors only surface from document tree edits
//! and from configuration parsing, and are strongly typed using thiserror.

use thiserror::Error;

/// Errors raised by document tree operations.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("Hierarchy request error: {reason}")]
    HierarchyRequest {
        reason: String,
    },

    #[error("Node not found: {context}")]
    NotFound {
        context: String,
    },

    #[error("Invalid attribute name '{name}'")]
    InvalidAttributeName {
        name: String,
    },

    #[error("Invalid tag name '{name}'")]
    InvalidTagName {
        name: String,
    },

    #[error("Operation '{operation}' is not supported on {node_name} nodes")]
    InvalidNodeType {
        operation: String,
        node_name: String,
    },

    #[error("Invalid mutation observer options: {reason}")]
    InvalidObserverInit {
        reason: String,
    },

    #[error("Owner document has been dropped")]
    DocumentGone,
}

/// Errors raised while loading configuration.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {message}")]
    Parse {
        message: String,
    },

    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidField {
        field: String,
        reason: String,
    },
}

/// Top-level error type for kobserve.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ObserveError {
    /// Returns true if this is a document tree error.
    #[must_use]
    pub const fn is_dom(&self) -> bool {
        matches!(self, Self::Dom(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for document tree operations.
pub type DomResult<T> = Result<T, DomError>;

/// Result type alias for kobserve operations.
pub type ObserveResult<T> = Result<T, ObserveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_error_hierarchy() {
        let err = DomError::HierarchyRequest {
            reason: "node is an ancestor of the parent".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Hierarchy request"));
        assert!(msg.contains("ancestor"));
    }

    #[test]
    fn test_dom_error_attribute_name() {
        let err = DomError::InvalidAttributeName { name: "1bad".to_string() };
        assert!(format!("{err}").contains("'1bad'"));
    }

    #[test]
    fn test_config_error_parse() {
        let err = ConfigError::Parse {
            message: "expected value".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("parse configuration"));
        assert!(msg.contains("expected value"));
    }

    #[test]
    fn test_observe_error_from_dom() {
        let err: ObserveError = DomError::DocumentGone.into();
        assert!(err.is_dom());
        assert!(!err.is_config());
    }

    #[test]
    fn test_observe_error_from_config() {
        let err: ObserveError = ConfigError::InvalidField {
            field: "silent_keys".to_string(),
            reason: "empty key".to_string(),
        }
        .into();
        assert!(err.is_config());
        let msg = format!("{err}");
        assert!(msg.contains("silent_keys"));
    }
}
