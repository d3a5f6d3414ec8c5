use anyhow::{anyhow, Result};
use std::path::PathBuf;

pub const SQLNOTE_DIR_ENV: &str = "SQLNOTE_DIR";

/// `$SQLNOTE_DIR` if set, otherwise `.sqlnote` under the home (or data, on Windows) directory.
pub fn default_sqlnote_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(SQLNOTE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    let base_dir = if cfg!(target_os = "windows") {
        dirs::data_dir().ok_or_else(|| anyhow!("Could not find local data directory"))?
    } else {
        dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?
    };

    Ok(base_dir.join(".sqlnote"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(default_sqlnote_dir()?.join("config.toml"))
}
