//! Observation options and their JSON loading.

use serde::{Deserialize, Serialize};

use crate::dom::MutationObserverInit;
use crate::error::{ConfigError, ObserveResult};

/// Options for [`crate::observe_with`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserveConfig {
    /// Observe an independent copy instead of aliasing the root.
    pub copy: bool,
    /// Snapshot the removed value with a copy on delete, like writes do.
    /// When false the delete event carries the live value.
    pub clone_deleted_value: bool,
    /// Keys whose reads never emit an event.
    pub silent_keys: Vec<String>,
    /// Options for the structural watcher on document nodes.
    pub mutation: MutationObserverInit,
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            copy: false,
            clone_deleted_value: true,
            silent_keys: vec!["length".to_string()],
            mutation: MutationObserverInit::structural(),
        }
    }
}

impl ObserveConfig {
    /// Default options with the given copy flag.
    #[must_use]
    pub fn with_copy(copy: bool) -> Self {
        Self {
            copy,
            ..Self::default()
        }
    }

    /// Parses options from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed JSON or invalid fields.
    pub fn from_json_str(json: &str) -> ObserveResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks field invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidField` for empty silent keys or mutation
    /// options that observe nothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.silent_keys.iter().any(|k| k.is_empty()) {
            return Err(ConfigError::InvalidField {
                field: "silent_keys".to_string(),
                reason: "keys must not be empty".to_string(),
            });
        }
        self.mutation
            .clone()
            .normalized()
            .map_err(|e| ConfigError::InvalidField {
                field: "mutation".to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub(crate) fn is_silent(&self, key: &crate::value::Key) -> bool {
        self.silent_keys.iter().any(|k| key.is_named(k))
    }
}
