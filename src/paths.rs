//! Path utilities for the app data, settings, logs and exports.

use std::path::PathBuf;

const APP_DIR: &str = "speaker-labeler";

/// App data directory (e.g. ~/.local/share/speaker-labeler on Linux).
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}

/// Get the path to the settings file.
pub fn settings_path() -> PathBuf {
    app_data_dir().join("settings.json")
}

/// Log directory, creating it if necessary.
pub fn log_dir() -> Result<PathBuf, String> {
    let dir = app_data_dir().join("logs");
    std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
    Ok(dir)
}

/// Get the log file path (e.g. ~/.local/share/speaker-labeler/logs/speaker-labeler.log).
pub fn log_file_path() -> Result<PathBuf, String> {
    Ok(log_dir()?.join("speaker-labeler.log"))
}

/// Default directory for exported labels: the current directory.
pub fn default_export_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
