//! Cross-platform utilities.

use std::path::PathBuf;

/// Get the application data directory.
///
/// - Linux: `~/.local/share/duochat`
/// - Windows: `%LOCALAPPDATA%\duochat`
/// - macOS: `~/Library/Application Support/duochat`
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("duochat")
}

/// Get the configuration directory.
///
/// - Linux: `~/.config/duochat`
/// - Windows: `%APPDATA%\duochat`
/// - macOS: `~/Library/Application Support/duochat`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("duochat")
}

/// Get the path to the main config file.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.json")
}
