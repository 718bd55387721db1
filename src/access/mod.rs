// Access entitlement core
//
// Everything that decides whether a user may use the application:
// the entitlement computation over (duration, anchor, now), admin grants
// and revocations, sign-up/sign-in, and the session guard that keeps
// enforcing the window while a session is open.

pub mod auth;
pub mod clock;
pub mod entitlement;
pub mod grant;
pub mod guard;

pub use auth::{AdminIdentity, AuthService, CredentialHasher, ProfileInput, SignInLimits};
pub use clock::{Clock, SystemClock};
pub use entitlement::{Entitlement, SECONDS_PER_DAY};
pub use grant::{AccessGrantManager, AccessStats, AccountStatus, AccountSummary};
pub use guard::{SessionGuard, SessionState, SessionUser};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::clock::ManualClock;
    use crate::config::AdminConfig;
    use crate::error::AccessError;
    use crate::routing::Route;
    use crate::store::DocumentStore;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    struct App {
        auth: AuthService<DocumentStore>,
        grants: AccessGrantManager<DocumentStore>,
        guard: SessionGuard<DocumentStore>,
        clock: Arc<ManualClock>,
    }

    fn app() -> App {
        let store = Arc::new(DocumentStore::in_memory().with_hasher(CredentialHasher::fast()));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap(),
        ));
        let admin = AdminConfig {
            username: "admin".to_string(),
            password_hash: CredentialHasher::fast().hash("admin-secret").unwrap(),
        };

        App {
            auth: AuthService::new(store.clone(), clock.clone(), admin, 30),
            grants: AccessGrantManager::new(store.clone(), clock.clone()),
            guard: SessionGuard::new(store, clock.clone()),
            clock,
        }
    }

    #[tokio::test]
    async fn trial_expires_and_login_redirects_to_renewal() {
        let app = app();
        app.auth.sign_up("maria", "segredo1").await.unwrap();

        app.clock.advance(Duration::days(31));
        let err = app.auth.sign_in("maria", "segredo1").await.unwrap_err();

        assert!(matches!(err, AccessError::AccountExpired));
        assert_eq!(err.redirect(), Some(Route::LoginExpired));
        assert_eq!(err.redirect().unwrap().path(), "/login?expired=true");
    }

    #[tokio::test]
    async fn grant_then_extend_composes_additively() {
        let app = app();
        let account = app.auth.sign_up("maria", "segredo1").await.unwrap();
        app.grants.revoke(&account.uid).await.unwrap();
        assert!(matches!(
            app.auth.sign_in("maria", "segredo1").await,
            Err(AccessError::AccountPendingApproval)
        ));

        let granted = app.grants.grant(&account.uid, 10).await.unwrap();
        assert_eq!(granted.entitlement(app.clock.now()).remaining_days(), 10);

        app.clock.advance(Duration::days(7));
        let extended = app.grants.grant(&account.uid, 5).await.unwrap();
        assert_eq!(extended.entitlement(app.clock.now()).remaining_days(), 8);

        let signed_in = app.auth.sign_in("maria", "segredo1").await.unwrap();
        let state = app.guard.on_sign_in(&signed_in.uid).await.unwrap();
        assert!(state.is_active());
        assert_eq!(app.guard.redirect(), Route::Dashboard);
    }

    #[tokio::test]
    async fn grant_during_trial_keeps_remaining_trial_days() {
        let app = app();
        let account = app.auth.sign_up("maria", "segredo1").await.unwrap();

        app.clock.advance(Duration::days(5));
        let extended = app.grants.grant(&account.uid, 10).await.unwrap();
        assert_eq!(extended.entitlement(app.clock.now()).remaining_days(), 35);

        // Past the original 30-day trial the session is still valid
        app.clock.advance(Duration::days(30));
        let signed_in = app.auth.sign_in("maria", "segredo1").await.unwrap();
        assert_eq!(signed_in.entitlement(app.clock.now()).remaining_days(), 5);
    }

    #[tokio::test]
    async fn revoked_user_cannot_start_a_session() {
        let app = app();
        let account = app.auth.sign_up("maria", "segredo1").await.unwrap();
        app.grants.revoke(&account.uid).await.unwrap();

        let state = app.guard.on_sign_in(&account.uid).await.unwrap();
        assert_eq!(state, SessionState::Expired { uid: account.uid });
    }

    #[tokio::test]
    async fn admin_session_lands_on_admin_page() {
        let app = app();
        let admin = app.auth.admin_sign_in("admin", "admin-secret").unwrap();

        app.guard.admin_session(&admin.username);
        assert_eq!(app.guard.redirect(), Route::Admin);
    }
}
