//! Provider Configuration
//!
//! Settings shared by every bucket operation: default project, provider-wide
//! default labels, API endpoints and retry behaviour.

use crate::gcp::client::Endpoints;
use crate::labels::LabelSet;
use crate::retry::RetryConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry settings for transient failures on bucket creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 16_000,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            ..RetryConfig::default()
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// Project used when a bucket does not pin one
    pub project: Option<String>,
    /// Labels applied to every bucket managed by this provider
    pub default_labels: LabelSet,
    pub endpoints: Endpoints,
    pub retry: RetrySettings,
    /// Concurrent object deletions during force-destroy; defaults to the
    /// available parallelism minus one
    pub delete_parallelism: Option<usize>,
}

impl ProviderConfig {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gcs-bucket").join("config.json"))
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable provider config {:?}: {:#}", path, e);
                Self::default()
            },
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read provider config {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse provider config {:?}", path))
    }

    /// Get effective project (CLI > config > gcloud default)
    pub fn effective_project(&self) -> Option<String> {
        self.project
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(crate::gcp::auth::get_default_project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{"project": "my-project", "default_labels": {"env": "prod"}}"#,
        )
        .unwrap();

        assert_eq!(config.project.as_deref(), Some("my-project"));
        assert_eq!(config.default_labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(config.endpoints, Endpoints::default());
        assert_eq!(config.retry, RetrySettings::default());
        assert_eq!(config.delete_parallelism, None);
    }

    #[test]
    fn test_effective_project_prefers_explicit() {
        let config = ProviderConfig {
            project: Some("explicit-project".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_project().as_deref(), Some("explicit-project"));
    }

    #[test]
    fn test_retry_settings_never_zero_attempts() {
        let settings = RetrySettings {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(settings.to_retry_config().max_attempts, 1);
    }
}
