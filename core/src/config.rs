//! Application configuration and compile-time constants.
//!
//! Centralizes window dimensions, IPC limits, single-instance defaults, env vars, and the
//! embedded UI path so the rest of the crate stays decoupled from concrete values.

use include_dir::include_dir;
use std::time::Duration;

/// Identity token naming the single-instance endpoint. Must never change between releases,
/// otherwise an old and a new build would not see each other.
pub const INSTANCE_ID: &str = "baloviewer-server";

/// Env var overriding [`INSTANCE_ID`] (also `--instance-id`).
pub const ENV_INSTANCE_ID: &str = "BALOVIEWER_INSTANCE_ID";

/// How long a new launch waits for a running instance to accept the probe connection.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a duplicate launch waits for its message to be written.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest accepted single-instance message (one file path), in bytes, excluding the newline.
pub const MAX_MESSAGE_LEN: usize = 8 * 1024;

/// Max pending IPC responses before dropping new ones (backpressure).
/// Also bounds IPC queue memory: at most this many response strings are queued at once.
pub const MAX_PENDING_IPC: usize = 256;

/// Worker threads for blocking IPC commands (file dialogs, copy/move).
pub const IPC_WORKER_POOL_SIZE: usize = 2;

/// Initial window size (logical).
pub const WINDOW_WIDTH: f64 = 1024.0;

/// Initial window height (logical).
pub const WINDOW_HEIGHT: f64 = 768.0;

/// Minimum window width (logical).
pub const WINDOW_MIN_WIDTH: f64 = 400.0;

/// Minimum window height (logical).
pub const WINDOW_MIN_HEIGHT: f64 = 300.0;

/// Seconds to wait before showing the window if the first page load never fires.
pub const SHOW_WINDOW_FALLBACK_SECS: u64 = 3;

/// Env var: set to `"1"` to enable WebView DevTools.
pub const ENV_DEVTOOLS: &str = "BALOVIEWER_DEVTOOLS";

/// Window title when no image is shown.
pub const APP_TITLE: &str = "BaloViewer";

/// Embedded viewer UI.
pub static UI: include_dir::Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/ui");
