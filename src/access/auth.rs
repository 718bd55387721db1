use anyhow::Result;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::entitlement::SECONDS_PER_DAY;
use crate::config::AdminConfig;
use crate::error::{AccessError, IdentifierKind};
use crate::models::{AccountPatch, Company, UserAccount, UserData, synthetic_email};
use crate::store::Backend;
use crate::validation;

/// Argon2id password hashing into PHC strings
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Cheap parameters so tests don't spend seconds per hash
    #[cfg(test)]
    pub fn fast() -> Self {
        let params = argon2::Params::new(8, 1, 1, None).expect("valid argon2 params");
        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a PHC hash; parameters come from the hash itself
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Sliding-window limiter for sign-in attempts
pub struct RateLimiter {
    attempts: Vec<Instant>,
    max_attempts: usize,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window_seconds: u64) -> Self {
        Self {
            attempts: Vec::new(),
            max_attempts,
            window_duration: Duration::from_secs(window_seconds),
        }
    }

    /// Record an attempt if the window still has room
    pub fn is_allowed(&mut self) -> bool {
        let now = Instant::now();

        self.attempts
            .retain(|&attempt| now.duration_since(attempt) < self.window_duration);

        if self.attempts.len() < self.max_attempts {
            self.attempts.push(now);
            true
        } else {
            false
        }
    }

    /// Time until the oldest attempt leaves the window
    pub fn time_until_allowed(&self) -> Option<Duration> {
        if self.attempts.len() < self.max_attempts {
            return None;
        }

        let oldest = self.attempts.first()?;
        let elapsed = Instant::now().duration_since(*oldest);

        if elapsed < self.window_duration {
            Some(self.window_duration - elapsed)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.attempts.clear();
    }
}

/// Limits applied per username to sign-in attempts
#[derive(Debug, Clone, Copy)]
pub struct SignInLimits {
    pub max_attempts: usize,
    pub window_secs: u64,
}

impl Default for SignInLimits {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_secs: 60,
        }
    }
}

/// Profile fields submitted by the user; only missing ones are required
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// The configured administrator after a successful sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub username: String,
}

/// Sign-up, sign-in and profile operations against the backend
pub struct AuthService<B: Backend> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    admin: AdminConfig,
    trial_secs: i64,
    hasher: CredentialHasher,
    limits: SignInLimits,
    limiters: Mutex<HashMap<String, RateLimiter>>,
}

impl<B: Backend> AuthService<B> {
    pub fn new(backend: Arc<B>, clock: Arc<dyn Clock>, admin: AdminConfig, trial_days: u32) -> Self {
        Self {
            backend,
            clock,
            admin,
            trial_secs: trial_days as i64 * SECONDS_PER_DAY,
            hasher: CredentialHasher::new(),
            limits: SignInLimits::default(),
            limiters: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn with_limits(mut self, limits: SignInLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Register a user with the trial access window
    pub async fn sign_up(&self, username: &str, password: &str) -> Result<UserAccount, AccessError> {
        let username = validation::validate_username(username)?;
        validation::validate_password(password)?;

        self.ensure_username_free(&username).await?;

        let uid = self
            .backend
            .create_identity(&synthetic_email(&username), password)
            .await?;

        let account = UserAccount {
            uid: uid.clone(),
            username: username.clone(),
            is_admin: false,
            is_approved: true,
            access_duration: Some(self.trial_secs),
            created_at: self.clock.now(),
            access_granted_at: None,
            access_expiration_date: None,
            profile: None,
        };

        self.backend.set_user_account(&account).await?;
        self.backend.set_user_data(&uid, &UserData::default()).await?;

        info!("Registered user {} ({})", username, uid);
        Ok(account)
    }

    /// Authenticate a regular user and check the access window
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<UserAccount, AccessError> {
        let username = username.trim();
        self.check_rate_limit(username)?;

        let uid = self
            .backend
            .verify_identity(&synthetic_email(username), password)
            .await?;

        let account = self
            .backend
            .get_user_account(&uid)
            .await?
            .ok_or(AccessError::AccountNotFound)?;

        let entitlement = account.entitlement(self.clock.now());
        if entitlement.is_expired() {
            warn!("Sign-in refused for {}: access window closed", username);
            return Err(if account.is_approved {
                AccessError::AccountExpired
            } else {
                AccessError::AccountPendingApproval
            });
        }

        self.reset_rate_limit(username);
        debug!("{} signed in with {}", username, entitlement);
        Ok(account)
    }

    /// Authenticate the configured administrator
    pub fn admin_sign_in(&self, username: &str, password: &str) -> Result<AdminIdentity, AccessError> {
        self.check_rate_limit(username)?;

        if username != self.admin.username {
            return Err(AccessError::InvalidCredentials);
        }

        if !self.hasher.verify(password, &self.admin.password_hash)? {
            return Err(AccessError::InvalidCredentials);
        }

        self.reset_rate_limit(username);
        info!("Administrator {} signed in", username);
        Ok(AdminIdentity {
            username: username.to_string(),
        })
    }

    /// Fill in the missing profile fields
    pub async fn complete_profile(
        &self,
        uid: &str,
        input: ProfileInput,
    ) -> Result<UserAccount, AccessError> {
        let account = self
            .backend
            .get_user_account(uid)
            .await?
            .ok_or(AccessError::AccountNotFound)?;

        let mut profile = account.profile.clone().unwrap_or_default();

        if let Some(cpf) = input.cpf.as_deref() {
            profile.cpf = Some(validation::validate_cpf(cpf)?);
        }
        if let Some(phone) = input.phone.as_deref() {
            profile.phone = Some(validation::validate_phone(phone)?);
        }
        if let Some(email) = input.email.as_deref() {
            let email = validation::validate_email(email)?;
            self.ensure_email_free(&email, uid).await?;
            profile.email = Some(email);
        }

        let updated = self
            .backend
            .update_user_account(
                uid,
                AccountPatch {
                    profile: Some(profile),
                    ..Default::default()
                },
            )
            .await?;

        Ok(updated)
    }

    /// Register a company for a user; CNPJ must be unique among their companies
    pub async fn add_company(&self, uid: &str, name: &str, cnpj: &str) -> Result<Company, AccessError> {
        let cnpj = validation::validate_cnpj(cnpj)?;

        let taken = self
            .backend
            .list_companies()
            .await?
            .iter()
            .any(|c| c.user_id == uid && validation::digits_only(&c.cnpj) == cnpj);
        if taken {
            return Err(AccessError::DuplicateIdentifier {
                kind: IdentifierKind::Cnpj,
                value: cnpj,
            });
        }

        let company = Company {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            cnpj,
            user_id: uid.to_string(),
            created_at: self.clock.now(),
        };
        self.backend.add_company(&company).await?;

        Ok(company)
    }

    pub async fn companies(&self, uid: &str) -> Result<Vec<Company>, AccessError> {
        let mut companies: Vec<Company> = self
            .backend
            .list_companies()
            .await?
            .into_iter()
            .filter(|c| c.user_id == uid)
            .collect();
        companies.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(companies)
    }

    /// Full scan; concurrent sign-ups can both pass
    async fn ensure_username_free(&self, username: &str) -> Result<(), AccessError> {
        let taken = self
            .backend
            .list_user_accounts()
            .await?
            .iter()
            .any(|a| a.username == username);

        if taken || username == self.admin.username {
            return Err(AccessError::DuplicateIdentifier {
                kind: IdentifierKind::Username,
                value: username.to_string(),
            });
        }
        Ok(())
    }

    async fn ensure_email_free(&self, email: &str, except_uid: &str) -> Result<(), AccessError> {
        let taken = self.backend.list_user_accounts().await?.iter().any(|a| {
            a.uid != except_uid
                && a.profile.as_ref().and_then(|p| p.email.as_deref()) == Some(email)
        });

        if taken {
            return Err(AccessError::DuplicateIdentifier {
                kind: IdentifierKind::Email,
                value: email.to_string(),
            });
        }
        Ok(())
    }

    fn check_rate_limit(&self, username: &str) -> Result<(), AccessError> {
        let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());
        let limiter = limiters
            .entry(username.to_string())
            .or_insert_with(|| RateLimiter::new(self.limits.max_attempts, self.limits.window_secs));

        if limiter.is_allowed() {
            Ok(())
        } else {
            let retry_after_secs = limiter
                .time_until_allowed()
                .map(|d| d.as_secs().max(1))
                .unwrap_or(1);
            Err(AccessError::RateLimited { retry_after_secs })
        }
    }

    fn reset_rate_limit(&self, username: &str) {
        let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(limiter) = limiters.get_mut(username) {
            limiter.reset();
        }
    }
}
