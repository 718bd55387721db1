use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Application directory name used for data and config locations
const APP_DIR: &str = "finance-access";

/// Platform data directory for this application
pub fn data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_DIR)
        .context("Could not determine data directory location")?;
    Ok(dirs.data_local_dir().to_path_buf())
}

/// Platform config directory for this application
pub fn config_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_DIR)
        .context("Could not determine config directory location")?;
    Ok(dirs.config_dir().to_path_buf())
}

/// Atomically write content to a file
///
/// Writes to a temporary sibling, syncs it, then renames over the target.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = File::create(&temp_path).with_context(|| {
            format!("Failed to create temporary file: {}", temp_path.display())
        })?;

        file.write_all(content)
            .context("Failed to write to temporary file")?;

        file.sync_all().context("Failed to sync file to disk")?;
    }

    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Read a JSON document, `None` if the file does not exist
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse file: {}", path.display()))?;

    Ok(Some(value))
}

/// Write a JSON document atomically
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize document")?;

    atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write file: {}", path.display()))
}

/// Remove a file if present
pub fn remove_file(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete file: {}", path.display()))?;
    }
    Ok(())
}
