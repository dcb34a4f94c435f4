//! Path utilities for the per-user config directory.

use std::path::PathBuf;

use dirs::config_dir;

const APP_CONFIG_DIR_NAME: &str = "copy-code-cleaner";

/// Gets the application config directory: `<platform config dir>/copy-code-cleaner`.
///
/// Falls back to `${HOME}/.config/copy-code-cleaner` when the platform reports no config
/// directory but `HOME` is set.
pub fn get_app_config_dir() -> Option<PathBuf> {
    config_dir()
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|dir| dir.join(APP_CONFIG_DIR_NAME))
}

/// Gets the config file path: `<app config dir>/config.json`
pub fn get_config_path() -> Option<PathBuf> {
    Some(get_app_config_dir()?.join("config.json"))
}

/// Gets the settings store path: `<app config dir>/settings.json`
pub fn get_settings_path() -> Option<PathBuf> {
    Some(get_app_config_dir()?.join("settings.json"))
}
