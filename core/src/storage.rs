//! Persistent viewer settings (JSON in user data dir).
//!
//! Loads and saves config.json: window bounds and whether the gallery dock is shown.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths::user_data_dir;

const CONFIG_FILENAME: &str = "config.json";

/// Window bounds for persistence (physical position and size).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

fn default_true() -> bool {
    true
}

/// Root config structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub window: Option<WindowBounds>,
    #[serde(default = "default_true")]
    pub gallery_visible: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: None,
            gallery_visible: true,
        }
    }
}

fn config_path() -> PathBuf {
    user_data_dir().join(CONFIG_FILENAME)
}

/// Loads config from `path`. Returns default on missing or parse error.
#[must_use]
pub fn load_config_from(path: &Path) -> AppConfig {
    let Ok(content) = fs::read_to_string(path) else {
        return AppConfig::default();
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        log::warn!("Ignoring unreadable {}: {}", path.display(), e);
        AppConfig::default()
    })
}

/// Saves config to `path`. Logs and ignores errors.
pub fn save_config_to(path: &Path, config: &AppConfig) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match serde_json::to_string_pretty(config) {
        Ok(json) => {
            if let Err(e) = fs::write(path, json) {
                log::warn!("Failed to write {}: {}", path.display(), e);
            }
        }
        Err(e) => log::warn!("Failed to serialize config: {}", e),
    }
}

#[must_use]
pub fn load_config() -> AppConfig {
    load_config_from(&config_path())
}

pub fn save_config(config: &AppConfig) {
    save_config_to(&config_path(), config);
}

/// Saves window bounds and persists.
pub fn save_window_bounds(x: i32, y: i32, width: u32, height: u32) {
    let mut config = load_config();
    config.window = Some(WindowBounds {
        x,
        y,
        width,
        height,
    });
    save_config(&config);
}

/// Persists the gallery dock visibility.
pub fn save_gallery_visible(visible: bool) {
    let mut config = load_config();
    config.gallery_visible = visible;
    save_config(&config);
}
