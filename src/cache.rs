use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::models::{UserAccount, UserData};
use crate::persist;

/// Current cache file version
const CACHE_VERSION: &str = "1.0";

pub const USER_KEY: &str = "user";
pub const USER_DATA_KEY: &str = "userData";

#[derive(Debug, Clone, Deserialize, Serialize)]
struct CacheFile {
    version: String,
    entries: BTreeMap<String, serde_json::Value>,
}

impl CacheFile {
    fn new() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            entries: BTreeMap::new(),
        }
    }
}

/// Local mirror of the signed-in session's documents
///
/// Read on startup to paint before the backend answers. Never the source
/// of truth: overwritten on every authoritative update, cleared on sign-out.
///
/// Clones share one write lock, so concurrent writers never drop each
/// other's entries.
#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store_account(&self, account: &UserAccount) -> Result<()> {
        self.put(USER_KEY, account)
    }

    pub fn store_user_data(&self, data: &UserData) -> Result<()> {
        self.put(USER_DATA_KEY, data)
    }

    pub fn load_account(&self) -> Result<Option<UserAccount>> {
        self.get(USER_KEY)
    }

    pub fn load_user_data(&self) -> Result<Option<UserData>> {
        self.get(USER_DATA_KEY)
    }

    /// Drop every cached entry
    pub fn clear(&self) -> Result<()> {
        debug!("Clearing local cache at {}", self.path.display());
        let _lock = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        persist::remove_file(&self.path)
    }

    fn load(&self) -> Result<CacheFile> {
        match persist::load_json::<CacheFile>(&self.path) {
            Ok(Some(file)) if file.version == CACHE_VERSION => Ok(file),
            Ok(Some(file)) => {
                warn!(
                    "Cache version mismatch (expected {}, got {}). Starting empty.",
                    CACHE_VERSION, file.version
                );
                Ok(CacheFile::new())
            }
            Ok(None) => Ok(CacheFile::new()),
            Err(e) => {
                warn!("Discarding unreadable cache: {:#}", e);
                Ok(CacheFile::new())
            }
        }
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let _lock = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = self.load()?;
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize cache entry '{}'", key))?;
        file.entries.insert(key.to_string(), value);
        persist::save_json(&self.path, &file)
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let file = self.load()?;
        match file.entries.get(key) {
            Some(value) => {
                let parsed = serde_json::from_value(value.clone())
                    .with_context(|| format!("Failed to parse cache entry '{}'", key))?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }
}
