use anyhow::Result;
use tracing::info;

use super::AppContext;
use super::utils::format_duration;
use crate::access::SessionState;
use crate::routing::{RouteDecision, Router};

/// Hold the cached session open, enforcing expiration until it ends or Ctrl+C
pub async fn watch(ctx: &AppContext) -> Result<SessionState> {
    let account = ctx.signed_in_account()?;
    let guard = ctx.guard();

    let state = guard.on_sign_in(&account.uid).await?;
    if !state.is_active() {
        println!("Session is not valid. Redirect: {}", state.route());
        return Ok(state);
    }

    let interval = chrono::Duration::from_std(ctx.config.check_interval())?;
    println!(
        "✓ Watching session of {} (checked every {}). Press Ctrl+C to stop.",
        account.username,
        format_duration(interval)
    );

    let mut states = guard.subscribe();
    let mut data = guard.subscribe_data();

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                if !state.is_active() {
                    println!("Session ended. Redirect: {}", state.route());
                    return Ok(state);
                }
            }
            changed = data.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(data) = &*data.borrow_and_update() {
                    println!(
                        "Data updated: {} transactions, {} categories",
                        data.transactions.len(),
                        data.categories.len()
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; leaving session signed in");
                break;
            }
        }
    }

    Ok(guard.state())
}

/// Print how the router handles a request path
pub fn route(ctx: &AppContext, path: &str) -> Result<RouteDecision> {
    let decision = ctx.router().resolve(path)?;

    match &decision {
        RouteDecision::Next(target) => println!("{} -> {}", path, target),
        RouteDecision::Rewrite(target) => println!("{} -> {} (maintenance)", path, target),
    }
    if matches!(decision, RouteDecision::Next(_)) && Router::is_expired_login(path) {
        println!("Login page shows the renew-access prompt");
    }

    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::account;
    use crate::commands::testing::test_app;

    #[tokio::test]
    async fn watch_without_session_fails() {
        let app = test_app();
        assert!(watch(&app.ctx).await.is_err());
    }

    #[tokio::test]
    async fn watch_ends_when_account_is_revoked() {
        let app = test_app();
        let ctx = &app.ctx;
        let maria = account::register(ctx, "maria", "segredo1").await.unwrap();
        account::login(ctx, "maria", "segredo1").await.unwrap();

        // Revoke before watching: the initial check already ends the session
        ctx.grant_manager().revoke(&maria.uid).await.unwrap();
        let state = watch(ctx).await.unwrap();

        assert!(matches!(state, SessionState::Expired { .. }));
        assert!(ctx.signed_in_account().is_err());
    }

    #[test]
    fn route_passes_through_by_default() {
        let app = test_app();
        assert_eq!(
            route(&app.ctx, "/dashboard").unwrap(),
            RouteDecision::Next("/dashboard".to_string())
        );
    }
}
