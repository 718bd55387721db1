// Identity and document backend
//
// The access core only talks to the backend through the `Backend` trait:
// identity sign-up/sign-in keyed by the synthetic email, per-document
// account and data records, and a watch subscription on the data record.
// `DocumentStore` is the concrete store used by the CLI and the tests.

mod document;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::AccessError;
use crate::models::{AccountPatch, Company, UserAccount, UserData};

pub use document::DocumentStore;

pub type BackendResult<T> = std::result::Result<T, AccessError>;

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Create an identity credential, returning the new uid
    async fn create_identity(&self, email: &str, password: &str) -> BackendResult<String>;

    /// Check a credential, returning the uid it belongs to
    async fn verify_identity(&self, email: &str, password: &str) -> BackendResult<String>;

    async fn delete_identity(&self, uid: &str) -> BackendResult<()>;

    async fn get_user_account(&self, uid: &str) -> BackendResult<Option<UserAccount>>;

    async fn set_user_account(&self, account: &UserAccount) -> BackendResult<()>;

    /// Apply a partial update and return the updated document
    async fn update_user_account(&self, uid: &str, patch: AccountPatch)
    -> BackendResult<UserAccount>;

    async fn list_user_accounts(&self) -> BackendResult<Vec<UserAccount>>;

    async fn get_user_data(&self, uid: &str) -> BackendResult<Option<UserData>>;

    async fn set_user_data(&self, uid: &str, data: &UserData) -> BackendResult<()>;

    /// Real-time view of a user's data record (`None` once deleted)
    async fn subscribe_user_data(&self, uid: &str)
    -> BackendResult<watch::Receiver<Option<UserData>>>;

    /// Remove the account and data records (and the user's companies)
    async fn delete_account(&self, uid: &str) -> BackendResult<()>;

    async fn list_companies(&self) -> BackendResult<Vec<Company>>;

    async fn add_company(&self, company: &Company) -> BackendResult<()>;
}
