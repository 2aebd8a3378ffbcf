//! Platform-specific paths and directory resolution.
//!
//! Keeps filesystem and environment concerns in one place so the rest of the
//! viewer does not depend on platform-specific env vars or paths.
//! Both directories are computed once at first use.

use std::path::PathBuf;
use std::sync::OnceLock;

static USER_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
static RUNTIME_DIR: OnceLock<PathBuf> = OnceLock::new();

fn compute_user_data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    let preferred = std::env::var("LOCALAPPDATA")
        .ok()
        .map(|local| PathBuf::from(local).join("BaloViewer"));

    #[cfg(target_os = "macos")]
    let preferred = std::env::var("HOME").ok().map(|home| {
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("BaloViewer")
    });

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let preferred = std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".local").join("share"))
        })
        .map(|p| p.join("baloviewer"));

    preferred
        .and_then(|path| std::fs::create_dir_all(&path).ok().map(|()| path))
        .unwrap_or_else(|| {
            let fallback = std::env::temp_dir().join("BaloViewer");
            if std::fs::create_dir_all(&fallback).is_err() {
                log::warn!("Could not create user data dir; using temp_dir as-is");
            }
            fallback
        })
}

/// Returns the user data directory (settings, WebView profile). Cached after first use.
///
/// Prefers platform user dirs; falls back to temp so we never use the install path.
#[must_use]
pub fn user_data_dir() -> PathBuf {
    USER_DATA_DIR.get_or_init(compute_user_data_dir).clone()
}

fn compute_runtime_dir() -> PathBuf {
    // XDG_RUNTIME_DIR is per-user and 0700; the temp dir is the portable fallback.
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .unwrap_or_else(std::env::temp_dir)
}

/// Returns the directory holding local IPC sockets. Cached after first use.
///
/// Unused on Windows, where endpoints are named pipes.
#[must_use]
#[cfg_attr(windows, allow(dead_code))]
pub fn runtime_dir() -> PathBuf {
    RUNTIME_DIR.get_or_init(compute_runtime_dir).clone()
}
