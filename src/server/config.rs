//! Batch server configuration.

use crate::error::{BatchError, Result};
use crate::protocol::constants::{BATCH_BOUNDARY_PREFIX, CHANGE_SET_BOUNDARY_PREFIX};
use crate::protocol::validate_boundary;
use serde::Deserialize;
use uuid::Uuid;

/// Configuration for the batch endpoint.
///
/// # Configuration Options
///
/// | Option | Default | Description |
/// |--------|---------|-------------|
/// | `strict` | `true` | Strict grammar validation of request bodies |
/// | `continue_on_error` | `false` | Keep executing parts after a failure when the client sent no `Prefer` |
/// | `enable_logging` | `true` | Log every dispatched sub-request |
/// | `response_boundary_prefix` | `batch_` | Prefix of generated batch response boundaries |
/// | `change_set_boundary_prefix` | `changeset_` | Prefix of generated change-set boundaries |
///
/// Missing fields take their defaults when loading from JSON:
///
/// ```
/// use odata_batch_axum::BatchConfig;
///
/// let config = BatchConfig::from_json(r#"{"continue_on_error": true}"#).unwrap();
/// assert!(config.continue_on_error);
/// assert!(config.strict);
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub strict: bool,
    pub continue_on_error: bool,
    pub enable_logging: bool,
    pub response_boundary_prefix: String,
    pub change_set_boundary_prefix: String,
}

impl BatchConfig {
    /// Load a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// `BatchError::Config` for malformed JSON and for values rejected by
    /// [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BatchConfig =
            serde_json::from_str(json).map_err(|err| BatchError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that both boundary prefixes yield RFC 2046 boundaries.
    ///
    /// A prefix is tried with a UUID suffix, the longest token the default
    /// generator appends.
    pub fn validate(&self) -> Result<()> {
        for (name, prefix) in [
            ("response_boundary_prefix", &self.response_boundary_prefix),
            ("change_set_boundary_prefix", &self.change_set_boundary_prefix),
        ] {
            let sample = format!("{}{}", prefix, Uuid::nil());
            validate_boundary(&sample)
                .map_err(|_| BatchError::Config(format!("{} '{}' cannot start a boundary", name, prefix.escape_debug())))?;
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            strict: true,
            continue_on_error: false,
            enable_logging: true,
            response_boundary_prefix: BATCH_BOUNDARY_PREFIX.to_string(),
            change_set_boundary_prefix: CHANGE_SET_BOUNDARY_PREFIX.to_string(),
        }
    }
}
