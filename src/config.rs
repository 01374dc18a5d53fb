use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// PostgreSQL connection URL; the in-memory store is used when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Transaction coordinator and issuance tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Upper bound on batches minted by one issuance
    pub max_batches_per_issuance: usize,
    /// Preferred credits per batch before the cap kicks in
    pub batch_size: u64,
    /// Version-conflict retries before `Conflict` reaches the caller
    pub max_conflict_retries: u32,
    /// Max wait for a project's lock
    pub lock_timeout_ms: u64,
    /// Registry prefix in batch serial numbers
    pub serial_prefix: String,
    /// Ledger listing page-size ceiling
    pub max_page_size: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_batches_per_issuance: 10,
            batch_size: 1_000,
            max_conflict_retries: 3,
            lock_timeout_ms: 2_000,
            serial_prefix: "CCR".to_string(),
            max_page_size: 100,
        }
    }
}

impl RegistryConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: registry.log
use_json: false
rotation: daily
gateway:
  host: 127.0.0.1
  port: 8080
"#;

    #[test]
    fn test_registry_section_defaults_when_absent() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert!(config.postgres_url.is_none());
        assert_eq!(config.registry.max_batches_per_issuance, 10);
        assert_eq!(config.registry.lock_timeout(), Duration::from_millis(2_000));
    }

    #[test]
    fn test_registry_section_overrides() {
        let yaml = format!(
            "{}registry:\n  max_batches_per_issuance: 4\n  batch_size: 250\n  max_conflict_retries: 5\n  lock_timeout_ms: 50\n  serial_prefix: VCS\n  max_page_size: 20\npostgres_url: postgres://localhost/registry\n",
            MINIMAL
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.registry.max_batches_per_issuance, 4);
        assert_eq!(config.registry.serial_prefix, "VCS");
        assert_eq!(
            config.postgres_url.as_deref(),
            Some("postgres://localhost/registry")
        );
    }

    #[test]
    fn test_missing_gateway_is_an_error() {
        assert!(AppConfig::from_yaml("log_level: info\n").is_err());
    }
}
