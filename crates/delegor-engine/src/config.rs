use crate::delegator::DelegatorConfig;
use delegor_core::{DelegorError, DelegorResult};
use delegor_session::{CoordinatorConfig, LifecycleConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for a Delegor deployment.
///
/// Every section has serde defaults, so an empty TOML document yields the
/// default configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegorConfig {
    /// Delegator execution settings.
    #[serde(default)]
    pub delegator: DelegatorConfig,
    /// Session coordinator settings.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// Lifecycle reaper settings.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl DelegorConfig {
    /// Parses a configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> DelegorResult<Self> {
        toml::from_str(content)
            .map_err(|e| DelegorError::Config(format!("invalid configuration: {e}")))
    }

    /// Loads a configuration from a TOML file.
    pub async fn load(path: &std::path::Path) -> DelegorResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegator::ExecutionMode;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = DelegorConfig::from_toml_str("").unwrap();
        assert_eq!(config.delegator.execution, ExecutionMode::Awaited);
        assert_eq!(config.delegator.worker_timeout_ms, 300_000);
        assert_eq!(config.lifecycle.max_sessions, 100);
    }

    #[test]
    fn test_partial_overrides() {
        let config = DelegorConfig::from_toml_str(
            r#"
            [delegator]
            execution = "detached"
            worker_timeout_ms = 5000

            [lifecycle]
            max_sessions = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.delegator.execution, ExecutionMode::Detached);
        assert_eq!(config.delegator.worker_timeout_ms, 5000);
        assert_eq!(config.lifecycle.max_sessions, 10);
        // Untouched sections keep their defaults.
        assert_eq!(config.coordinator.default_ttl_ms, 3_600_000);
    }

    #[test]
    fn test_invalid_document_is_a_config_error() {
        let err = DelegorConfig::from_toml_str("delegator = 3").unwrap_err();
        assert!(matches!(err, DelegorError::Config(_)));
    }
}
