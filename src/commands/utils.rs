use chrono::{DateTime, Duration, Utc};

use crate::models::UserAccount;
use crate::validation;

/// Initialize logging
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Print profile fields, formatted
pub fn print_profile(account: &UserAccount) {
    let profile = account.profile.clone().unwrap_or_default();
    let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    println!("  CPF: {}", show(profile.cpf.as_deref().map(validation::format_cpf)));
    println!("  Phone: {}", show(profile.phone.as_deref().map(validation::format_phone)));
    println!("  Email: {}", show(profile.email.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_picks_largest_unit() {
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
        assert_eq!(format_duration(Duration::minutes(5)), "5m");
        assert_eq!(format_duration(Duration::hours(3)), "3h");
        assert_eq!(format_duration(Duration::days(12)), "12d");
    }
}
