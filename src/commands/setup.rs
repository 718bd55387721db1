use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::access::CredentialHasher;
use crate::config::{EXAMPLE_CONFIG, get_config_path};
use crate::persist;
use crate::validation;

/// Write the example configuration file
pub fn init(output: Option<PathBuf>, force: bool) -> Result<PathBuf> {
    let output_path = match output {
        Some(path) => path,
        None => get_config_path()?,
    };

    if output_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}\nUse --force to overwrite",
            output_path.display()
        );
    }

    persist::atomic_write(&output_path, EXAMPLE_CONFIG.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", output_path.display()))?;

    println!("✓ Created configuration file: {}", output_path.display());
    println!("\nSet the administrator password hash before first use:");
    println!("  finance-access hash-password --password <password>");
    println!("and paste the output into [admin] password_hash.");

    Ok(output_path)
}

/// Print an Argon2 PHC hash for the admin password
pub fn hash_password(password: &str) -> Result<()> {
    validation::validate_password(password)?;

    let hash = CredentialHasher::new().hash(password)?;
    println!("{}", hash);

    Ok(())
}
