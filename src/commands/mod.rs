pub mod account;
pub mod admin;
pub mod session;
pub mod setup;
pub mod utils;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::access::{AccessGrantManager, AuthService, Clock, SessionGuard, SystemClock};
use crate::cache::LocalCache;
use crate::config::{AppConfig, get_config_path, load_config};
use crate::models::UserAccount;
use crate::routing::{MaintenanceSwitch, Router};
use crate::store::DocumentStore;

/// Everything a command needs, built from the config file
pub struct AppContext {
    pub config: AppConfig,
    pub config_path: PathBuf,
    pub store: Arc<DocumentStore>,
    pub clock: Arc<dyn Clock>,
    pub cache: LocalCache,
}

impl AppContext {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => get_config_path()?,
        };

        let config = load_config(&config_path).with_context(|| {
            format!(
                "Failed to load configuration from {}\nCreate one with: finance-access init",
                config_path.display()
            )
        })?;

        let store_path = config.store_path()?;
        let store = DocumentStore::open(&store_path)
            .with_context(|| format!("Failed to open document store: {}", store_path.display()))?;
        let cache = LocalCache::new(config.cache_path()?);
        debug!("Session cache at {}", cache.path().display());

        Ok(Self {
            config,
            config_path,
            store: Arc::new(store),
            clock: Arc::new(SystemClock),
            cache,
        })
    }

    pub fn auth_service(&self) -> AuthService<DocumentStore> {
        AuthService::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.admin.clone(),
            self.config.access.trial_days,
        )
    }

    pub fn grant_manager(&self) -> AccessGrantManager<DocumentStore> {
        AccessGrantManager::new(self.store.clone(), self.clock.clone())
    }

    pub fn guard(&self) -> SessionGuard<DocumentStore> {
        SessionGuard::new(self.store.clone(), self.clock.clone())
            .with_cache(self.cache.clone())
            .with_check_interval(self.config.check_interval())
    }

    pub fn router(&self) -> Router {
        Router::new(MaintenanceSwitch::from_env_or(self.config.maintenance.enabled))
    }

    /// Account of the local session, from the cache
    pub fn signed_in_account(&self) -> Result<UserAccount> {
        self.cache
            .load_account()?
            .context("Not signed in. Run: finance-access login")
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::access::CredentialHasher;
    use assert_fs::prelude::*;

    /// Config, store and cache inside a temp dir
    pub struct TestApp {
        pub temp: assert_fs::TempDir,
        pub ctx: AppContext,
    }

    pub fn test_app() -> TestApp {
        let temp = assert_fs::TempDir::new().unwrap();
        let hash = CredentialHasher::fast().hash("admin-secret").unwrap();
        let config = temp.child("config.toml");
        config
            .write_str(&format!(
                r#"
[admin]
username = "admin"
password_hash = "{}"

[storage]
store_path = "{}"
cache_path = "{}"
"#,
                hash,
                temp.child("store.json").path().display(),
                temp.child("cache.json").path().display(),
            ))
            .unwrap();

        let ctx = AppContext::load(Some(config.path().to_path_buf())).unwrap();
        TestApp { temp, ctx }
    }
}
