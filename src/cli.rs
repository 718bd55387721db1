use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Family Finance Access Manager
///
/// Registers users with a time-limited access window, lets the administrator
/// grant, extend and revoke access, and enforces the window while a session
/// is open.
#[derive(Parser, Debug)]
#[command(name = "finance-access")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "FINANCE_ACCESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example configuration file
    Init {
        /// Output path (defaults to the platform config directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print an Argon2 hash for the admin password_hash setting
    HashPassword {
        #[arg(long, env = "FINANCE_ACCESS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account with the trial access window
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "FINANCE_ACCESS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in and start a local session
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "FINANCE_ACCESS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the local session and clear the cache
    Logout,
    /// Show the signed-in account and its remaining access
    Status,
    /// Complete the profile of the signed-in account
    Profile {
        /// CPF (formatted or digits only)
        #[arg(long)]
        cpf: Option<String>,

        /// Mobile phone with area code
        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },
    /// Manage companies of the signed-in account
    Company {
        #[command(subcommand)]
        command: CompanyCommands,
    },
    /// Delete the signed-in account, its data and its credential
    DeleteAccount {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// Keep the session open and enforce expiration until it ends
    Watch,
    /// Resolve a request path through the router
    Route {
        /// Request path, query string allowed (e.g. /dashboard)
        path: String,
    },
    /// Administrator commands
    Admin {
        #[command(flatten)]
        credentials: AdminCredentials,

        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CompanyCommands {
    /// Register a company
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        cnpj: String,
    },
    /// List companies, newest first
    List,
}

#[derive(ClapArgs, Debug)]
pub struct AdminCredentials {
    /// Administrator username
    #[arg(long = "admin", default_value = "admin")]
    pub username: String,

    /// Administrator password
    #[arg(long = "admin-password", env = "FINANCE_ACCESS_ADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Grant or extend access for a user
    Grant {
        username: String,

        /// Days to add
        #[arg(short, long)]
        days: u32,
    },
    /// Revoke a user's access
    Revoke { username: String },
    /// Delete a user's account and data
    Delete {
        username: String,

        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// List accounts with their access status
    List {
        /// Filter by username substring
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show account counters
    Stats,
    /// Replace the administrator password in the config file
    SetPassword {
        #[arg(long, env = "FINANCE_ACCESS_NEW_ADMIN_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
}
