use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use crate::cache::LocalCache;
use crate::error::AccessError;
use crate::models::{UserAccount, UserData};
use crate::routing::Route;
use crate::store::Backend;

/// Default period between background expiration checks
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Who is signed in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub uid: String,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Active(SessionUser),
    /// Signed out because the access window closed
    Expired { uid: String },
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    /// Page this state should land on
    pub fn route(&self) -> Route {
        match self {
            SessionState::Unauthenticated => Route::Login,
            SessionState::Expired { .. } => Route::LoginExpired,
            SessionState::Active(user) if user.is_admin => Route::Admin,
            SessionState::Active(_) => Route::Dashboard,
        }
    }
}

/// Background tasks of one session; aborted together when dropped
struct SessionTasks {
    checker: Option<JoinHandle<()>>,
    data: Option<JoinHandle<()>>,
}

impl Drop for SessionTasks {
    fn drop(&mut self) {
        if let Some(handle) = self.checker.take() {
            handle.abort();
        }
        if let Some(handle) = self.data.take() {
            handle.abort();
        }
    }
}

#[derive(Default)]
struct SessionSlot {
    generation: u64,
    tasks: Option<SessionTasks>,
}

struct GuardInner<B: Backend> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    cache: Option<LocalCache>,
    check_interval: Duration,
    state: watch::Sender<SessionState>,
    data: watch::Sender<Option<UserData>>,
    slot: Mutex<SessionSlot>,
}

enum Tick {
    Continue,
    Stop,
}

/// Enforces the access window for the signed-in user
///
/// Each session owns at most one expiration checker and one user-data
/// subscription. Starting a new session or signing out bumps the session
/// generation and aborts both tasks; a task from an older generation never
/// publishes state.
pub struct SessionGuard<B: Backend> {
    inner: Arc<GuardInner<B>>,
}

impl<B: Backend> Clone for SessionGuard<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Backend> SessionGuard<B> {
    pub fn new(backend: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        let (data, _) = watch::channel(None);

        Self {
            inner: Arc::new(GuardInner {
                backend,
                clock,
                cache: None,
                check_interval: DEFAULT_CHECK_INTERVAL,
                state,
                data,
                slot: Mutex::new(SessionSlot::default()),
            }),
        }
    }

    /// Mirror session documents into a local cache
    pub fn with_cache(self, cache: LocalCache) -> Self {
        self.reconfigure(|inner| inner.cache = Some(cache))
    }

    pub fn with_check_interval(self, interval: Duration) -> Self {
        self.reconfigure(|inner| inner.check_interval = interval)
    }

    fn reconfigure(self, apply: impl FnOnce(&mut GuardInner<B>)) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                apply(&mut inner);
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => {
                warn!("Session guard already shared; configuration change ignored");
                Self { inner }
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Live user data of the current session
    pub fn subscribe_data(&self) -> watch::Receiver<Option<UserData>> {
        self.inner.data.subscribe()
    }

    pub fn redirect(&self) -> Route {
        self.state().route()
    }

    /// React to an identity sign-in for `uid`
    ///
    /// The previous session is torn down first. If the backend fails
    /// before the new session is active, the guard ends up signed out.
    pub async fn on_sign_in(&self, uid: &str) -> Result<SessionState, AccessError> {
        let generation = self.inner.begin_session();

        match self.start_session(generation, uid).await {
            Ok(state) => Ok(state),
            Err(e) => {
                error!("Sign-in for {} failed: {}", uid, e);
                self.inner.end_session(generation, SessionState::Unauthenticated);
                Err(e)
            }
        }
    }

    async fn start_session(&self, generation: u64, uid: &str) -> Result<SessionState, AccessError> {
        let account = match self.inner.backend.get_user_account(uid).await? {
            Some(account) => account,
            None => {
                warn!("No account record for {}; signing out", uid);
                self.inner.end_session(generation, SessionState::Unauthenticated);
                return Ok(self.state());
            }
        };

        if account.is_admin {
            return Ok(self.inner.activate(generation, &account, None, None));
        }

        let entitlement = account.entitlement(self.inner.clock.now());
        if entitlement.is_expired() {
            info!("Access for {} has expired; signing out", account.username);
            self.inner.end_session(
                generation,
                SessionState::Expired {
                    uid: account.uid.clone(),
                },
            );
            return Ok(self.state());
        }

        let data = self.inner.backend.get_user_data(uid).await?;
        let updates = self.inner.backend.subscribe_user_data(uid).await?;

        debug!("{} signed in with {}", account.username, entitlement);
        let tasks = SessionTasks {
            checker: Some(spawn_checker(
                Arc::downgrade(&self.inner),
                generation,
                account.uid.clone(),
            )),
            data: Some(spawn_data_forwarder(
                Arc::downgrade(&self.inner),
                generation,
                updates,
            )),
        };

        Ok(self.inner.activate(generation, &account, data, Some(tasks)))
    }

    /// Start an administrator session; no expiration checks apply
    pub fn admin_session(&self, username: &str) -> SessionState {
        let generation = self.inner.begin_session();
        let user = SessionUser {
            uid: username.to_string(),
            username: username.to_string(),
            is_admin: true,
        };

        let slot = self.inner.lock_slot();
        if slot.generation == generation {
            self.inner.data.send_replace(None);
            self.inner.state.send_replace(SessionState::Active(user));
        }
        drop(slot);

        self.state()
    }

    /// End the current session, cancelling its background tasks
    pub fn sign_out(&self) {
        let generation = self.inner.begin_session();
        self.inner.end_session(generation, SessionState::Unauthenticated);
        info!("Signed out");
    }
}

impl<B: Backend> GuardInner<B> {
    fn lock_slot(&self) -> std::sync::MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Invalidate the previous session and return the new generation
    fn begin_session(&self) -> u64 {
        let mut slot = self.lock_slot();
        slot.generation += 1;
        slot.tasks = None;
        slot.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_slot().generation == generation
    }

    /// Publish `Active` and install tasks, unless a newer session started meanwhile
    fn activate(
        &self,
        generation: u64,
        account: &UserAccount,
        data: Option<UserData>,
        tasks: Option<SessionTasks>,
    ) -> SessionState {
        let mut slot = self.lock_slot();
        if slot.generation != generation {
            debug!("Session for {} superseded before activation", account.username);
            return self.state.borrow().clone();
        }

        self.store_account(account);
        if let Some(data) = &data {
            self.store_user_data(data);
        }
        self.data.send_replace(data);

        slot.tasks = tasks;
        let state = SessionState::Active(SessionUser {
            uid: account.uid.clone(),
            username: account.username.clone(),
            is_admin: account.is_admin,
        });
        self.state.send_replace(state.clone());
        state
    }

    /// Forced sign-out for `generation`; no-op if a newer session exists
    fn end_session(&self, generation: u64, state: SessionState) {
        let mut slot = self.lock_slot();
        if slot.generation != generation {
            return;
        }

        slot.generation += 1;
        let tasks = slot.tasks.take();
        self.state.send_replace(state);
        self.data.send_replace(None);
        drop(slot);
        drop(tasks);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.clear() {
                warn!("Failed to clear local cache: {:#}", e);
            }
        }
    }

    /// Cache `account` if `generation` is still the live session
    fn cache_account(&self, generation: u64, account: &UserAccount) {
        let slot = self.lock_slot();
        if slot.generation == generation {
            self.store_account(account);
        }
    }

    fn store_account(&self, account: &UserAccount) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store_account(account) {
                warn!("Failed to cache account: {:#}", e);
            }
        }
    }

    fn store_user_data(&self, data: &UserData) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store_user_data(data) {
                warn!("Failed to cache user data: {:#}", e);
            }
        }
    }

    /// One expiration check against a fresh read of the account
    async fn check(&self, generation: u64, uid: &str) -> Tick {
        let account = match self.backend.get_user_account(uid).await {
            Ok(account) => account,
            Err(e) => {
                error!("Expiration check for {} failed: {}", uid, e);
                return Tick::Continue;
            }
        };

        let Some(account) = account else {
            warn!("Account {} disappeared; signing out", uid);
            self.end_session(generation, SessionState::Unauthenticated);
            return Tick::Stop;
        };

        let entitlement = account.entitlement(self.clock.now());
        if entitlement.is_expired() {
            info!("Access for {} expired during session; signing out", account.username);
            self.end_session(
                generation,
                SessionState::Expired {
                    uid: uid.to_string(),
                },
            );
            return Tick::Stop;
        }

        debug!("{}: {}", account.username, entitlement);
        self.cache_account(generation, &account);
        Tick::Continue
    }
}

fn spawn_checker<B: Backend>(
    inner: Weak<GuardInner<B>>,
    generation: u64,
    uid: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = match inner.upgrade() {
            Some(inner) => inner.check_interval,
            None => return,
        };
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; the sign-in already checked
        interval.tick().await;

        loop {
            interval.tick().await;

            let Some(inner) = inner.upgrade() else {
                break;
            };
            if !inner.is_current(generation) {
                break;
            }
            if let Tick::Stop = inner.check(generation, &uid).await {
                break;
            }
        }
        debug!("Expiration checker for {} stopped", uid);
    })
}

fn spawn_data_forwarder<B: Backend>(
    inner: Weak<GuardInner<B>>,
    generation: u64,
    mut updates: watch::Receiver<Option<UserData>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let data = updates.borrow_and_update().clone();

            let Some(inner) = inner.upgrade() else {
                break;
            };

            // Sign-out bumps the generation under this lock
            let slot = inner.lock_slot();
            if slot.generation != generation {
                break;
            }
            match &data {
                Some(data) => inner.store_user_data(data),
                None => debug!("User data record removed"),
            }
            inner.data.send_replace(data);
            drop(slot);
        }
    })
}
