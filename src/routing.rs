use anyhow::{Context, Result};
use std::fmt;
use url::Url;

/// Environment variable that switches maintenance mode at request time
pub const MAINTENANCE_ENV: &str = "FINANCE_ACCESS_MAINTENANCE";

pub const MAINTENANCE_PATH: &str = "/manutencao";

/// Pages the application navigates between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    /// Login page showing the "renew access" prompt
    LoginExpired,
    Dashboard,
    Admin,
    Maintenance,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::LoginExpired => "/login?expired=true",
            Route::Dashboard => "/dashboard",
            Route::Admin => "/admin",
            Route::Maintenance => MAINTENANCE_PATH,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of routing a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Serve the requested path as-is
    Next(String),
    /// Serve another path in place of the requested one
    Rewrite(String),
}

/// Where the maintenance flag comes from
#[derive(Debug, Clone)]
pub enum MaintenanceSwitch {
    Fixed(bool),
    /// Read the environment variable on every request, falling back to `default`
    Env { var: String, default: bool },
}

impl MaintenanceSwitch {
    pub fn from_env_or(default: bool) -> Self {
        MaintenanceSwitch::Env {
            var: MAINTENANCE_ENV.to_string(),
            default,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            MaintenanceSwitch::Fixed(enabled) => *enabled,
            MaintenanceSwitch::Env { var, default } => match std::env::var(var) {
                Ok(value) => parse_flag(&value).unwrap_or(*default),
                Err(_) => *default,
            },
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Request router applying the maintenance rewrite
#[derive(Debug, Clone)]
pub struct Router {
    maintenance: MaintenanceSwitch,
}

impl Router {
    pub fn new(maintenance: MaintenanceSwitch) -> Self {
        Self { maintenance }
    }

    /// Route a request path (query string allowed)
    pub fn resolve(&self, request: &str) -> Result<RouteDecision> {
        let url = parse_request(request)?;

        if url.path() == MAINTENANCE_PATH {
            return Ok(RouteDecision::Next(url.path().to_string()));
        }

        if self.maintenance.is_enabled() {
            return Ok(RouteDecision::Rewrite(MAINTENANCE_PATH.to_string()));
        }

        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        Ok(RouteDecision::Next(target))
    }

    /// Whether a login request carries the expired-access marker
    pub fn is_expired_login(request: &str) -> bool {
        parse_request(request)
            .map(|url| {
                url.path() == Route::Login.path()
                    && url.query_pairs().any(|(k, v)| k == "expired" && v == "true")
            })
            .unwrap_or(false)
    }
}

fn parse_request(request: &str) -> Result<Url> {
    let base = Url::parse("http://localhost/").context("Invalid base URL")?;
    base.join(request)
        .with_context(|| format!("Invalid request path: {}", request))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_paths() {
        assert_eq!(Route::Login.path(), "/login");
        assert_eq!(Route::LoginExpired.to_string(), "/login?expired=true");
        assert_eq!(Route::Dashboard.path(), "/dashboard");
        assert_eq!(Route::Admin.path(), "/admin");
        assert_eq!(Route::Maintenance.path(), "/manutencao");
    }

    #[test]
    fn maintenance_rewrites_everything_but_itself() {
        let router = Router::new(MaintenanceSwitch::Fixed(true));

        assert_eq!(
            router.resolve("/dashboard").unwrap(),
            RouteDecision::Rewrite("/manutencao".to_string())
        );
        assert_eq!(
            router.resolve("/login?expired=true").unwrap(),
            RouteDecision::Rewrite("/manutencao".to_string())
        );
        assert_eq!(
            router.resolve("/manutencao").unwrap(),
            RouteDecision::Next("/manutencao".to_string())
        );
    }

    #[test]
    fn requests_pass_through_without_maintenance() {
        let router = Router::new(MaintenanceSwitch::Fixed(false));

        assert_eq!(
            router.resolve("/admin").unwrap(),
            RouteDecision::Next("/admin".to_string())
        );
        assert_eq!(
            router.resolve("/login?expired=true").unwrap(),
            RouteDecision::Next("/login?expired=true".to_string())
        );
    }

    #[test]
    fn env_switch_is_read_per_request() {
        let var = "FINANCE_ACCESS_MAINTENANCE_TEST_SWITCH";
        let router = Router::new(MaintenanceSwitch::Env {
            var: var.to_string(),
            default: false,
        });

        // SAFETY: this variable name is only touched by this test
        unsafe { std::env::remove_var(var) };
        assert!(matches!(router.resolve("/dashboard").unwrap(), RouteDecision::Next(_)));

        unsafe { std::env::set_var(var, "true") };
        assert!(matches!(router.resolve("/dashboard").unwrap(), RouteDecision::Rewrite(_)));

        unsafe { std::env::set_var(var, "garbage") };
        assert!(matches!(router.resolve("/dashboard").unwrap(), RouteDecision::Next(_)));

        unsafe { std::env::remove_var(var) };
    }

    #[test]
    fn expired_login_marker() {
        assert!(Router::is_expired_login("/login?expired=true"));
        assert!(!Router::is_expired_login("/login"));
        assert!(!Router::is_expired_login("/dashboard?expired=true"));
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag(" ON "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
