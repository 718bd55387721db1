use anyhow::{Context, Result};
use argon2::password_hash::PasswordHash;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::persist;
use crate::validation;

/// Longest allowed gap between background expiration checks
const MAX_CHECK_INTERVAL_SECS: u64 = 3600;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub admin: AdminConfig,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Administrator credentials
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    pub username: String,

    /// Argon2 PHC string
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessConfig {
    /// Access window given on registration
    #[serde(default = "default_trial_days")]
    pub trial_days: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            trial_days: default_trial_days(),
        }
    }
}

fn default_trial_days() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
        }
    }
}

fn default_check_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MaintenanceConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.session.check_interval_secs)
    }

    /// Document store location, defaulting to the platform data directory
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.storage.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(persist::data_dir()?.join("store.json")),
        }
    }

    /// Local session cache location
    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.storage.cache_path {
            Some(path) => Ok(path.clone()),
            None => Ok(persist::data_dir()?.join("session-cache.json")),
        }
    }
}

/// Default config file location
pub fn get_config_path() -> Result<PathBuf> {
    Ok(persist::config_dir()?.join("config.toml"))
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

    validate_config(&config)?;

    Ok(config)
}

/// Save configuration to a TOML file
pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    validate_config(config)?;

    let content = toml::to_string_pretty(config).context("Failed to serialize config to TOML")?;

    persist::atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    validation::validate_username(&config.admin.username)
        .map_err(|e| anyhow::anyhow!("Invalid admin username '{}': {}", config.admin.username, e))?;

    PasswordHash::new(&config.admin.password_hash).map_err(|e| {
        anyhow::anyhow!(
            "Invalid admin password_hash ({}). Generate one with: finance-access hash-password",
            e
        )
    })?;

    if config.access.trial_days == 0 {
        anyhow::bail!("access.trial_days must be greater than zero");
    }

    let interval = config.session.check_interval_secs;
    if interval == 0 || interval > MAX_CHECK_INTERVAL_SECS {
        anyhow::bail!(
            "session.check_interval_secs must be between 1 and {}, got {}",
            MAX_CHECK_INTERVAL_SECS,
            interval
        );
    }

    Ok(())
}

/// Example configuration file with documentation
pub const EXAMPLE_CONFIG: &str = include_str!("../example-config.toml");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::CredentialHasher;
    use std::io::Write;

    fn create_temp_toml_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn valid_hash() -> String {
        CredentialHasher::fast().hash("admin-secret").unwrap()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let toml = format!(
            "[admin]\nusername = \"admin\"\npassword_hash = \"{}\"\n",
            valid_hash()
        );
        let file = create_temp_toml_config(&toml);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.admin.username, "admin");
        assert_eq!(config.access.trial_days, 30);
        assert_eq!(config.check_interval(), Duration::from_secs(60));
        assert!(!config.maintenance.enabled);
        assert!(config.storage.store_path.is_none());
    }

    #[test]
    fn full_config_is_parsed() {
        let toml = format!(
            r#"
[admin]
username = "gestor"
password_hash = "{}"

[access]
trial_days = 7

[session]
check_interval_secs = 300

[maintenance]
enabled = true

[storage]
store_path = "/tmp/fa/store.json"
cache_path = "/tmp/fa/cache.json"
"#,
            valid_hash()
        );
        let file = create_temp_toml_config(&toml);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.access.trial_days, 7);
        assert_eq!(config.session.check_interval_secs, 300);
        assert!(config.maintenance.enabled);
        assert_eq!(config.store_path().unwrap(), PathBuf::from("/tmp/fa/store.json"));
        assert_eq!(config.cache_path().unwrap(), PathBuf::from("/tmp/fa/cache.json"));
    }

    #[test]
    fn placeholder_hash_fails_validation() {
        let toml = "[admin]\nusername = \"admin\"\npassword_hash = \"changeme\"\n";
        let file = create_temp_toml_config(toml);

        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("hash-password"));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut config: AppConfig = toml::from_str(&format!(
            "[admin]\nusername = \"admin\"\npassword_hash = \"{}\"\n",
            valid_hash()
        ))
        .unwrap();
        assert!(validate_config(&config).is_ok());

        config.access.trial_days = 0;
        assert!(validate_config(&config).is_err());

        config.access.trial_days = 30;
        config.session.check_interval_secs = 7200;
        assert!(validate_config(&config).is_err());

        config.session.check_interval_secs = 60;
        config.admin.username = "ad min".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn example_config_parses() {
        let config: AppConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.admin.username, "admin");
        assert_eq!(config.access.trial_days, 30);
        // Shipped with a placeholder hash the admin must replace
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn save_then_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let mut config: AppConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        config.admin.password_hash = valid_hash();
        config.maintenance.enabled = true;

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();

        assert!(loaded.maintenance.enabled);
        assert_eq!(loaded.admin.password_hash, config.admin.password_hash);
    }
}
