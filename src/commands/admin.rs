use anyhow::{Context, Result};
use tracing::debug;

use super::AppContext;
use super::utils::{format_duration, format_timestamp};
use crate::access::{AccessStats, AdminIdentity, CredentialHasher};
use crate::cli::{AdminCommands, AdminCredentials};
use crate::config::save_config;
use crate::validation;

/// Authenticate the administrator, then run one admin command
pub async fn run(ctx: &mut AppContext, credentials: AdminCredentials, command: AdminCommands) -> Result<()> {
    let admin = ctx
        .auth_service()
        .admin_sign_in(&credentials.username, &credentials.password)
        .context("Administrator sign-in failed")?;

    let guard = ctx.guard();
    guard.admin_session(&admin.username);
    debug!("Administrator session open, landing on {}", guard.redirect());

    match command {
        AdminCommands::Grant { username, days } => grant(ctx, &username, days).await,
        AdminCommands::Revoke { username } => revoke(ctx, &username).await,
        AdminCommands::Delete { username, yes } => delete(ctx, &admin, &username, yes).await,
        AdminCommands::List { search } => list(ctx, search.as_deref()).await,
        AdminCommands::Stats => stats(ctx).await.map(|_| ()),
        AdminCommands::SetPassword { new_password } => set_password(ctx, &new_password),
    }
}

pub async fn grant(ctx: &AppContext, username: &str, days: u32) -> Result<()> {
    let grants = ctx.grant_manager();
    let account = grants.find_by_username(username).await?;
    let updated = grants.grant(&account.uid, days).await?;

    let now = ctx.clock.now();
    println!("✓ Granted {} days to {}", days, updated.username);
    if let Some(end) = updated.window_end() {
        println!("  Expires: {} (in {})", format_timestamp(end), format_duration(end - now));
    }
    println!("  Access: {}", updated.entitlement(now).describe());

    Ok(())
}

pub async fn revoke(ctx: &AppContext, username: &str) -> Result<()> {
    let grants = ctx.grant_manager();
    let account = grants.find_by_username(username).await?;
    grants.revoke(&account.uid).await?;

    println!("✓ Revoked access for {}", account.username);
    println!("  Their session ends at the next expiration check.");
    Ok(())
}

pub async fn delete(ctx: &AppContext, admin: &AdminIdentity, username: &str, confirmed: bool) -> Result<()> {
    let grants = ctx.grant_manager();
    let account = grants.find_by_username(username).await?;

    if !confirmed {
        anyhow::bail!(
            "This permanently deletes {} and all their data. Re-run with --yes to confirm",
            account.username
        );
    }

    grants.delete(&account.uid, Some(&admin.username)).await?;

    println!("✓ Deleted account {}", account.username);
    println!("  The sign-in credential remains until the user deletes it.");
    Ok(())
}

pub async fn list(ctx: &AppContext, search: Option<&str>) -> Result<()> {
    let summaries = ctx.grant_manager().list(search).await?;

    if summaries.is_empty() {
        println!("No accounts found");
        return Ok(());
    }

    println!("{:<20} {:<20} {:<22} {}", "USERNAME", "STATUS", "EXPIRES", "EMAIL");
    for summary in summaries {
        let account = &summary.account;
        let expires = account.window_end()
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        let email = account
            .profile
            .as_ref()
            .and_then(|p| p.email.clone())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<20} {:<20} {:<22} {}",
            account.username,
            summary.status.label(),
            expires,
            email
        );
    }

    Ok(())
}

pub async fn stats(ctx: &AppContext) -> Result<AccessStats> {
    let stats = ctx.grant_manager().stats().await?;

    println!("\n=== Accounts ===\n");
    println!("Total:   {}", stats.total);
    println!("Active:  {}", stats.active);
    println!("Blocked: {}", stats.blocked);
    println!("Pending: {}", stats.pending);

    Ok(stats)
}

/// Replace the admin password hash in the config file
pub fn set_password(ctx: &mut AppContext, new_password: &str) -> Result<()> {
    validation::validate_password(new_password)?;

    ctx.config.admin.password_hash = CredentialHasher::new().hash(new_password)?;
    save_config(&ctx.config_path, &ctx.config)?;

    println!("✓ Admin password updated in {}", ctx.config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::account;
    use crate::commands::testing::test_app;
    use crate::config::load_config;
    use crate::store::Backend;

    fn credentials(password: &str) -> AdminCredentials {
        AdminCredentials {
            username: "admin".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn wrong_admin_password_is_rejected() {
        let mut app = test_app();
        let result = run(&mut app.ctx, credentials("wrong"), AdminCommands::Stats).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn grant_revoke_and_stats() {
        let mut app = test_app();
        account::register(&app.ctx, "maria", "segredo1").await.unwrap();
        account::register(&app.ctx, "joao", "segredo2").await.unwrap();

        run(
            &mut app.ctx,
            credentials("admin-secret"),
            AdminCommands::Revoke {
                username: "joao".to_string(),
            },
        )
        .await
        .unwrap();

        let counts = stats(&app.ctx).await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.active, 1);
        assert_eq!(counts.pending, 1);

        grant(&app.ctx, "joao", 10).await.unwrap();
        let counts = stats(&app.ctx).await.unwrap();
        assert_eq!(counts.active, 2);

        assert!(grant(&app.ctx, "nobody", 10).await.is_err());
        list(&app.ctx, Some("ma")).await.unwrap();
    }

    #[tokio::test]
    async fn delete_requires_confirmation_and_keeps_credential() {
        let mut app = test_app();
        let maria = account::register(&app.ctx, "maria", "segredo1").await.unwrap();

        let delete_cmd = |yes| AdminCommands::Delete {
            username: "maria".to_string(),
            yes,
        };
        assert!(run(&mut app.ctx, credentials("admin-secret"), delete_cmd(false)).await.is_err());
        run(&mut app.ctx, credentials("admin-secret"), delete_cmd(true)).await.unwrap();

        assert!(app.ctx.store.get_user_account(&maria.uid).await.unwrap().is_none());
        assert!(
            app.ctx
                .store
                .verify_identity("maria@user.com", "segredo1")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn set_password_rewrites_config() {
        let mut app = test_app();
        run(
            &mut app.ctx,
            credentials("admin-secret"),
            AdminCommands::SetPassword {
                new_password: "nova-senha".to_string(),
            },
        )
        .await
        .unwrap();

        let reloaded = load_config(&app.ctx.config_path).unwrap();
        assert!(
            CredentialHasher::new()
                .verify("nova-senha", &reloaded.admin.password_hash)
                .unwrap()
        );
    }
}
