use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::clock::Clock;
use crate::error::{AccessError, ValidationError};
use crate::models::{AccountPatch, UserAccount};
use crate::store::Backend;

/// Label shown for each account in the admin listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Administrator,
    /// Not approved (never granted, or revoked)
    Pending,
    /// Approved but the access window has closed
    Blocked,
    Active { remaining_days: i64 },
}

impl AccountStatus {
    pub fn of(account: &UserAccount, now: DateTime<Utc>) -> Self {
        if account.is_admin {
            return AccountStatus::Administrator;
        }
        if !account.is_approved {
            return AccountStatus::Pending;
        }

        let entitlement = account.entitlement(now);
        if entitlement.is_expired() {
            AccountStatus::Blocked
        } else {
            AccountStatus::Active {
                remaining_days: entitlement.remaining_days(),
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            AccountStatus::Administrator => "Administrador".to_string(),
            AccountStatus::Pending => "Pendente".to_string(),
            AccountStatus::Blocked => "Bloqueado".to_string(),
            AccountStatus::Active { remaining_days } => {
                format!("{} dias restantes", remaining_days)
            }
        }
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessStats {
    pub total: usize,
    pub active: usize,
    pub blocked: usize,
    pub pending: usize,
}

/// An account paired with its computed status
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub account: UserAccount,
    pub status: AccountStatus,
}

/// Admin operations on access windows
pub struct AccessGrantManager<B: Backend> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
}

impl<B: Backend> AccessGrantManager<B> {
    pub fn new(backend: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Grant or extend access by `duration_days`
    ///
    /// An unexpired window (the sign-up trial included) is extended from
    /// its current end. A missing or already-past end restarts the window
    /// from now. Extensions past the representable date range are rejected.
    pub async fn grant(&self, uid: &str, duration_days: u32) -> Result<UserAccount, AccessError> {
        if duration_days == 0 {
            return Err(ValidationError::InvalidDuration.into());
        }

        let account = self
            .backend
            .get_user_account(uid)
            .await?
            .ok_or(AccessError::AccountNotFound)?;

        let now = self.clock.now();
        let expiration = next_expiration(account.window_end(), now, duration_days)
            .ok_or(ValidationError::InvalidDuration)?;

        let updated = self
            .backend
            .update_user_account(
                uid,
                AccountPatch {
                    is_approved: Some(true),
                    access_duration: Some(Some((expiration - now).num_seconds())),
                    access_granted_at: Some(Some(now)),
                    access_expiration_date: Some(Some(expiration)),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            "Granted {} days to {} (expires {})",
            duration_days,
            updated.username,
            expiration.format("%Y-%m-%d %H:%M:%S %Z")
        );
        Ok(updated)
    }

    /// Revoke access: unapproved, no window
    pub async fn revoke(&self, uid: &str) -> Result<UserAccount, AccessError> {
        let updated = self
            .backend
            .update_user_account(
                uid,
                AccountPatch {
                    is_approved: Some(false),
                    access_duration: Some(None),
                    access_granted_at: Some(None),
                    access_expiration_date: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        info!("Revoked access for {}", updated.username);
        Ok(updated)
    }

    /// Delete an account and its data
    ///
    /// The identity credential is only removed when `uid` is the caller's
    /// own identity. The two steps are not atomic; a failure after the
    /// records are gone is reported, not rolled back.
    pub async fn delete(&self, uid: &str, current_identity: Option<&str>) -> Result<(), AccessError> {
        self.backend.delete_account(uid).await?;
        info!("Deleted account records for {}", uid);

        if current_identity == Some(uid) {
            if let Err(e) = self.backend.delete_identity(uid).await {
                error!("Account records for {} deleted but identity removal failed: {}", uid, e);
                return Err(e);
            }
            info!("Deleted identity credential for {}", uid);
        } else {
            warn!("Identity credential for {} left in place (not the signed-in identity)", uid);
        }

        Ok(())
    }

    /// All accounts with status, optionally filtered by username substring
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<AccountSummary>, AccessError> {
        let now = self.clock.now();
        let needle = search.map(|s| s.to_lowercase());

        let mut summaries: Vec<AccountSummary> = self
            .backend
            .list_user_accounts()
            .await?
            .into_iter()
            .filter(|a| match &needle {
                Some(needle) => a.username.to_lowercase().contains(needle),
                None => true,
            })
            .map(|account| AccountSummary {
                status: AccountStatus::of(&account, now),
                account,
            })
            .collect();

        summaries.sort_by(|a, b| a.account.username.cmp(&b.account.username));
        Ok(summaries)
    }

    pub async fn stats(&self) -> Result<AccessStats, AccessError> {
        let summaries = self.list(None).await?;

        let mut stats = AccessStats {
            total: summaries.len(),
            ..Default::default()
        };
        for summary in &summaries {
            match summary.status {
                AccountStatus::Pending => stats.pending += 1,
                AccountStatus::Blocked => stats.blocked += 1,
                AccountStatus::Active { .. } => stats.active += 1,
                AccountStatus::Administrator => {}
            }
        }

        Ok(stats)
    }

    /// Look up an account by username (admin commands address users by name)
    pub async fn find_by_username(&self, username: &str) -> Result<UserAccount, AccessError> {
        self.backend
            .list_user_accounts()
            .await?
            .into_iter()
            .find(|a| a.username == username)
            .ok_or(AccessError::AccountNotFound)
    }
}

/// Additive while the current window is open, reset from `now` otherwise
///
/// `None` when the new expiration falls outside the supported date range.
pub fn next_expiration(
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    duration_days: u32,
) -> Option<DateTime<Utc>> {
    let extension = Duration::try_days(duration_days as i64)?;
    match current {
        Some(expiration) if expiration > now => expiration.checked_add_signed(extension),
        _ => now.checked_add_signed(extension),
    }
}
