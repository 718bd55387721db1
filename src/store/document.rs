use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Backend, BackendResult};
use crate::access::auth::CredentialHasher;
use crate::error::AccessError;
use crate::models::{AccountPatch, Company, UserAccount, UserData};
use crate::persist;

/// Current document file version
const STORE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Deserialize, Serialize)]
struct IdentityRecord {
    uid: String,
    password_hash: String,
}

/// Everything the store persists, keyed like the backend collections
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct Documents {
    version: String,
    /// Keyed by identity email
    #[serde(default)]
    identities: BTreeMap<String, IdentityRecord>,
    /// Keyed by uid
    #[serde(default)]
    users: BTreeMap<String, UserAccount>,
    /// Keyed by uid
    #[serde(default)]
    user_data: BTreeMap<String, UserData>,
    /// Keyed by company id
    #[serde(default)]
    companies: BTreeMap<String, Company>,
}

impl Default for Documents {
    fn default() -> Self {
        Self {
            version: STORE_VERSION.to_string(),
            identities: BTreeMap::new(),
            users: BTreeMap::new(),
            user_data: BTreeMap::new(),
            companies: BTreeMap::new(),
        }
    }
}

/// Document store backed by a JSON file, or purely in memory
///
/// Writes are last-write-wins. The lock only keeps the file consistent
/// within this process.
pub struct DocumentStore {
    path: Option<PathBuf>,
    documents: RwLock<Documents>,
    watchers: Mutex<HashMap<String, watch::Sender<Option<UserData>>>>,
    hasher: CredentialHasher,
}

impl DocumentStore {
    /// Open (or start) a store persisted at `path`
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let documents = match persist::load_json::<Documents>(path)? {
            Some(docs) if docs.version == STORE_VERSION => docs,
            Some(docs) => {
                anyhow::bail!(
                    "Store file version mismatch (expected {}, got {}): {}",
                    STORE_VERSION,
                    docs.version,
                    path.display()
                );
            }
            None => {
                info!("Starting new document store at {}", path.display());
                Documents::default()
            }
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            documents: RwLock::new(documents),
            watchers: Mutex::new(HashMap::new()),
            hasher: CredentialHasher::new(),
        })
    }

    /// Store that never touches the filesystem
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            documents: RwLock::new(Documents::default()),
            watchers: Mutex::new(HashMap::new()),
            hasher: CredentialHasher::new(),
        }
    }

    #[cfg(test)]
    pub fn with_hasher(mut self, hasher: CredentialHasher) -> Self {
        self.hasher = hasher;
        self
    }

    fn persist(&self, documents: &Documents) -> BackendResult<()> {
        if let Some(path) = &self.path {
            persist::save_json(path, documents)?;
        }
        Ok(())
    }

    /// Hash on the blocking pool, off the async workers
    async fn hash_password(&self, password: &str) -> BackendResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))??;
        Ok(hash)
    }

    async fn verify_password(&self, password: &str, hash: String) -> BackendResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let valid = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))??;
        Ok(valid)
    }

    #[cfg(test)]
    fn watcher_count(&self) -> usize {
        self.watchers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn notify(&self, uid: &str, data: Option<UserData>) {
        let watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sender) = watchers.get(uid) {
            // send_replace never fails, even with no receivers left
            sender.send_replace(data);
        }
    }
}

#[async_trait]
impl Backend for DocumentStore {
    async fn create_identity(&self, email: &str, password: &str) -> BackendResult<String> {
        let password_hash = self.hash_password(password).await?;
        let mut docs = self.documents.write().await;

        if docs.identities.contains_key(email) {
            return Err(AccessError::DuplicateIdentifier {
                kind: crate::error::IdentifierKind::Email,
                value: email.to_string(),
            });
        }

        let uid = Uuid::new_v4().to_string();
        docs.identities.insert(
            email.to_string(),
            IdentityRecord {
                uid: uid.clone(),
                password_hash,
            },
        );
        self.persist(&docs)?;

        debug!("Created identity {} for {}", uid, email);
        Ok(uid)
    }

    async fn verify_identity(&self, email: &str, password: &str) -> BackendResult<String> {
        let record = self
            .documents
            .read()
            .await
            .identities
            .get(email)
            .cloned()
            .ok_or(AccessError::InvalidCredentials)?;

        if self.verify_password(password, record.password_hash).await? {
            Ok(record.uid)
        } else {
            Err(AccessError::InvalidCredentials)
        }
    }

    async fn delete_identity(&self, uid: &str) -> BackendResult<()> {
        let mut docs = self.documents.write().await;

        let before = docs.identities.len();
        docs.identities.retain(|_, record| record.uid != uid);
        if docs.identities.len() == before {
            return Err(AccessError::AccountNotFound);
        }

        self.persist(&docs)
    }

    async fn get_user_account(&self, uid: &str) -> BackendResult<Option<UserAccount>> {
        Ok(self.documents.read().await.users.get(uid).cloned())
    }

    async fn set_user_account(&self, account: &UserAccount) -> BackendResult<()> {
        let mut docs = self.documents.write().await;
        docs.users.insert(account.uid.clone(), account.clone());
        self.persist(&docs)
    }

    async fn update_user_account(
        &self,
        uid: &str,
        patch: AccountPatch,
    ) -> BackendResult<UserAccount> {
        let mut docs = self.documents.write().await;

        let account = docs.users.get_mut(uid).ok_or(AccessError::AccountNotFound)?;
        patch.apply(account);
        let updated = account.clone();

        self.persist(&docs)?;
        Ok(updated)
    }

    async fn list_user_accounts(&self) -> BackendResult<Vec<UserAccount>> {
        Ok(self.documents.read().await.users.values().cloned().collect())
    }

    async fn get_user_data(&self, uid: &str) -> BackendResult<Option<UserData>> {
        Ok(self.documents.read().await.user_data.get(uid).cloned())
    }

    async fn set_user_data(&self, uid: &str, data: &UserData) -> BackendResult<()> {
        {
            let mut docs = self.documents.write().await;
            docs.user_data.insert(uid.to_string(), data.clone());
            self.persist(&docs)?;
        }

        self.notify(uid, Some(data.clone()));
        Ok(())
    }

    async fn subscribe_user_data(
        &self,
        uid: &str,
    ) -> BackendResult<watch::Receiver<Option<UserData>>> {
        let current = self.documents.read().await.user_data.get(uid).cloned();

        let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        watchers.retain(|_, sender| sender.receiver_count() > 0);
        let receiver = match watchers.get(uid) {
            Some(sender) => {
                sender.send_replace(current);
                sender.subscribe()
            }
            None => {
                let (sender, receiver) = watch::channel(current);
                watchers.insert(uid.to_string(), sender);
                receiver
            }
        };

        Ok(receiver)
    }

    async fn delete_account(&self, uid: &str) -> BackendResult<()> {
        {
            let mut docs = self.documents.write().await;

            if docs.users.remove(uid).is_none() {
                warn!("Deleting account {} with no account record", uid);
            }
            docs.user_data.remove(uid);
            docs.companies.retain(|_, company| company.user_id != uid);

            self.persist(&docs)?;
        }

        self.notify(uid, None);
        self.watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(uid);
        Ok(())
    }

    async fn list_companies(&self) -> BackendResult<Vec<Company>> {
        Ok(self.documents.read().await.companies.values().cloned().collect())
    }

    async fn add_company(&self, company: &Company) -> BackendResult<()> {
        let mut docs = self.documents.write().await;
        docs.companies.insert(company.id.clone(), company.clone());
        self.persist(&docs)
    }
}
