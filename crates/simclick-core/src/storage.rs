//! Macro and configuration persistence.

use crate::recorder::MacroAction;
use crate::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timestamp format error: {0}")]
    Format(#[from] time::error::Format),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("macro is empty")]
    EmptyMacro,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// App data directory for simclick.
pub fn app_data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("simclick")
}

pub fn macros_dir() -> PathBuf {
    app_data_dir().join("macros")
}

pub fn reports_dir() -> PathBuf {
    app_data_dir().join("reports")
}

/// Create `dir` (and parents) if missing.
pub fn ensure_dir(dir: &Path) -> StorageResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        info!(?dir, "created directory");
    }
    Ok(())
}

/// Save a macro as an ordered JSON array of action records.
pub fn save_macro(path: &Path, actions: &[MacroAction]) -> StorageResult<()> {
    if actions.is_empty() {
        return Err(StorageError::EmptyMacro);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(actions)?;
    fs::write(path, json)?;
    info!(path = %path.display(), count = actions.len(), "saved macro");
    Ok(())
}

/// Load a macro. A malformed record aborts the load.
pub fn load_macro(path: &Path) -> StorageResult<Vec<MacroAction>> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.display().to_string()));
    }
    let json = fs::read_to_string(path)?;
    let actions: Vec<MacroAction> = serde_json::from_str(&json)?;
    debug!(path = %path.display(), count = actions.len(), "loaded macro");
    Ok(actions)
}

fn config_path() -> PathBuf {
    app_data_dir().join("config.json")
}

/// Persist the configuration snapshot the remote `START` command uses.
pub fn save_config(config: &AppConfig) -> StorageResult<PathBuf> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(&path, json)?;
    info!(path = %path.display(), "saved configuration");
    Ok(path)
}

/// Load the last-saved configuration snapshot.
pub fn load_config() -> StorageResult<AppConfig> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> StorageResult<AppConfig> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.display().to_string()));
    }
    let json = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&json)?;
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}
