use anyhow::Result;
use std::path::PathBuf;

pub const APP_IDENTIFIER: &str = "com.voidspace.app";
pub const DATABASE_FILE: &str = "void_interval_database.db";
pub const LOG_FILE: &str = "voidspace.log";

/// Per-user application data directory, created if missing.
pub fn get_app_dir() -> Result<PathBuf> {
    let app_dir = if cfg!(target_os = "macos") {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?
            .join("Library")
            .join("Application Support")
            .join(APP_IDENTIFIER)
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find local data directory"))?
            .join(APP_IDENTIFIER)
    } else {
        dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?
            .join(APP_IDENTIFIER)
    };

    std::fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

pub fn get_database_path() -> Result<PathBuf> {
    Ok(get_app_dir()?.join(DATABASE_FILE))
}

pub fn get_log_dir() -> Result<PathBuf> {
    let log_dir = get_app_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}
