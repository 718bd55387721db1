use anyhow::{Context, Result};

use super::AppContext;
use super::utils::{format_timestamp, print_profile};
use crate::access::{AccountStatus, ProfileInput, SessionState};
use crate::error::AccessError;
use crate::models::UserAccount;

/// Create an account with the trial window
pub async fn register(ctx: &AppContext, username: &str, password: &str) -> Result<UserAccount> {
    let account = ctx.auth_service().sign_up(username, password).await?;
    let entitlement = account.entitlement(ctx.clock.now());

    println!("✓ Registered {}", account.username);
    println!("  Access: {}", entitlement.describe());
    println!("\nSign in with: finance-access login --username {}", account.username);

    Ok(account)
}

/// Sign in and mirror the session into the local cache
pub async fn login(ctx: &AppContext, username: &str, password: &str) -> Result<SessionState> {
    let account = match ctx.auth_service().sign_in(username, password).await {
        Ok(account) => account,
        Err(e) => {
            if let Some(route) = e.redirect() {
                eprintln!("Redirect: {}", route);
            }
            return Err(e.into());
        }
    };

    let guard = ctx.guard();
    let state = guard.on_sign_in(&account.uid).await?;
    if !state.is_active() {
        println!("Session ended during sign-in. Redirect: {}", guard.redirect());
        return Ok(state);
    }

    println!("✓ Signed in as {}", account.username);
    println!("  Access: {}", account.entitlement(ctx.clock.now()).describe());
    if account.needs_profile() {
        println!("\nYour profile is incomplete. Complete it with:");
        println!("  finance-access profile --cpf <cpf> --phone <phone> --email <email>");
    }
    println!("Redirect: {}", guard.redirect());

    Ok(state)
}

/// Sign out and clear the cache
pub fn logout(ctx: &AppContext) -> Result<()> {
    ctx.guard().sign_out();
    println!("✓ Signed out");
    Ok(())
}

/// Re-validate the cached session against the store and show it
pub async fn status(ctx: &AppContext) -> Result<SessionState> {
    let cached = ctx.signed_in_account()?;

    let state = ctx.guard().on_sign_in(&cached.uid).await?;
    match &state {
        SessionState::Active(_) => {}
        SessionState::Expired { .. } => {
            println!("Your access has expired. Ask the administrator to renew it.");
            println!("Redirect: {}", state.route());
            return Ok(state);
        }
        SessionState::Unauthenticated => {
            println!("Account no longer exists. Signed out.");
            println!("Redirect: {}", state.route());
            return Ok(state);
        }
    }

    let account = ctx.signed_in_account()?;
    let now = ctx.clock.now();

    println!("\n=== Account Status ===\n");
    println!("User: {} ({})", account.username, account.uid);
    println!("Status: {}", AccountStatus::of(&account, now).label());
    println!("Access: {}", account.entitlement(now).describe());
    if let Some(end) = account.window_end() {
        println!("Expires: {}", format_timestamp(end));
    }
    println!("Member since: {}", format_timestamp(account.created_at));
    println!("\nProfile:");
    print_profile(&account);

    if let Some(data) = ctx.cache.load_user_data()? {
        println!(
            "\nData: {} transactions, {} categories",
            data.transactions.len(),
            data.categories.len()
        );
        if let Some(latest) = data.sorted_by_date().first() {
            println!(
                "Latest: {} {:.2} ({}) on {}",
                latest.description,
                latest.amount,
                latest.category,
                latest.date.format("%Y-%m-%d")
            );
        }
    }

    Ok(state)
}

/// Fill in the missing profile fields of the signed-in account
pub async fn profile(ctx: &AppContext, input: ProfileInput) -> Result<UserAccount> {
    let account = ctx.signed_in_account()?;

    if input.cpf.is_none() && input.phone.is_none() && input.email.is_none() {
        println!("Profile of {}:", account.username);
        print_profile(&account);
        return Ok(account);
    }

    let updated = ctx.auth_service().complete_profile(&account.uid, input).await?;
    ctx.cache.store_account(&updated)?;

    println!("✓ Profile updated");
    print_profile(&updated);
    if updated.needs_profile() {
        println!("\nSome fields are still missing.");
    }

    Ok(updated)
}

pub async fn add_company(ctx: &AppContext, name: &str, cnpj: &str) -> Result<()> {
    let account = ctx.signed_in_account()?;
    let company = ctx.auth_service().add_company(&account.uid, name, cnpj).await?;

    println!("✓ Added company {} ({})", company.name, company.cnpj);
    Ok(())
}

pub async fn list_companies(ctx: &AppContext) -> Result<()> {
    let account = ctx.signed_in_account()?;
    let companies = ctx.auth_service().companies(&account.uid).await?;

    if companies.is_empty() {
        println!("No companies registered");
        return Ok(());
    }

    for company in companies {
        println!(
            "  {} - CNPJ {} (added {})",
            company.name,
            company.cnpj,
            format_timestamp(company.created_at)
        );
    }
    Ok(())
}

/// Delete the signed-in account including its identity credential
pub async fn delete_account(ctx: &AppContext, confirmed: bool) -> Result<()> {
    let account = ctx.signed_in_account()?;
    if !confirmed {
        anyhow::bail!(
            "This permanently deletes {} and all its data. Re-run with --yes to confirm",
            account.username
        );
    }

    let result = ctx
        .grant_manager()
        .delete(&account.uid, Some(&account.uid))
        .await;
    ctx.guard().sign_out();

    match result {
        Ok(()) => {
            println!("✓ Deleted account {}", account.username);
            Ok(())
        }
        Err(AccessError::AccountNotFound) => {
            println!("✓ Deleted account {} (no credential was left)", account.username);
            Ok(())
        }
        Err(e) => Err(e).context("Account records were deleted but the credential was not"),
    }
}
