//! Typed IPC between the viewer page and host: JSON envelope, single entry point, no string
//! dispatch.
//!
//! The page sends `{ id, name, ...args }`; the host returns `{ id, ok? | err? }` where `ok` is
//! the new [`ViewState`](crate::viewer::ViewState). Invalid messages are ignored (no panic).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::file_ops::{self, Conflict};
use crate::image_list::is_image_path;
use crate::storage;
use crate::viewer::{self, Viewer};

// ---------------------------------------------------------------------------
// Envelope and command
// ---------------------------------------------------------------------------

/// Incoming message: `id` (correlation) + flattened command (`name` + args).
#[derive(Debug, Clone, Deserialize)]
pub struct IpcEnvelope {
    pub id: String,
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the page can send. Tagged with `name` for deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum Command {
    GetState,
    Next,
    Previous,
    First,
    Last,
    Select { index: usize },
    SetGalleryVisible { visible: bool },
    OpenFileDialog,
    CopyTo,
    MoveTo,
    Delete,
    /// Writes the previewed rotation (clockwise degrees) and flips into the file.
    #[serde(rename_all = "camelCase")]
    Save {
        rotation: u16,
        #[serde(default)]
        flip_h: bool,
        #[serde(default)]
        flip_v: bool,
    },
    /// Handled by the host before dispatch: closes the window.
    Quit,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Outgoing response correlated by `id`. Exactly one of `ok` or `err` is set.
#[derive(Debug, Clone, Serialize)]
pub struct IpcResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl IpcResponse {
    #[must_use]
    pub fn ok(id: String, data: serde_json::Value) -> Self {
        Self {
            id,
            ok: Some(data),
            err: None,
        }
    }

    #[must_use]
    pub fn err(id: String, message: String) -> Self {
        Self {
            id,
            ok: None,
            err: Some(message),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse and handle
// ---------------------------------------------------------------------------

/// True for commands that open native dialogs or touch the disk. Run these on a worker thread.
#[must_use]
pub fn is_blocking_command(command: &Command) -> bool {
    matches!(
        command,
        Command::OpenFileDialog
            | Command::CopyTo
            | Command::MoveTo
            | Command::Delete
            | Command::Save { .. }
    )
}

/// Parses a raw IPC message. Invalid JSON or missing required fields return `None`.
#[must_use]
pub fn parse_message(raw: &str) -> Option<IpcEnvelope> {
    serde_json::from_str(raw).ok()
}

/// Native prompts used by the blocking commands. Swapped out in tests.
pub trait Dialogs {
    fn pick_image(&self, start_dir: Option<PathBuf>) -> Option<PathBuf>;
    fn pick_folder(&self, title: &str, start_dir: Option<PathBuf>) -> Option<PathBuf>;
    fn confirm_delete(&self, name: &str) -> bool;
    /// Asks what to do when `name` already exists in the target folder.
    fn resolve_conflict(&self, name: &str) -> Conflict;
}

/// The real dialogs, via `rfd`.
pub struct NativeDialogs;

impl Dialogs for NativeDialogs {
    fn pick_image(&self, start_dir: Option<PathBuf>) -> Option<PathBuf> {
        let exts: Vec<&str> = image::ImageFormat::all()
            .flat_map(|f| f.extensions_str().iter().copied())
            .collect();
        let mut dlg = rfd::FileDialog::new()
            .set_title("Open file")
            .add_filter("Images", &exts)
            .add_filter("All files", &["*"]);
        if let Some(dir) = start_dir {
            dlg = dlg.set_directory(dir);
        }
        dlg.pick_file()
    }

    fn pick_folder(&self, title: &str, start_dir: Option<PathBuf>) -> Option<PathBuf> {
        let mut dlg = rfd::FileDialog::new().set_title(title);
        if let Some(dir) = start_dir {
            dlg = dlg.set_directory(dir);
        }
        dlg.pick_folder()
    }

    fn confirm_delete(&self, name: &str) -> bool {
        let answer = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Warning)
            .set_title("Delete file")
            .set_description(format!("Are you sure you want to delete {name}?"))
            .set_buttons(rfd::MessageButtons::YesNo)
            .show();
        matches!(answer, rfd::MessageDialogResult::Yes)
    }

    fn resolve_conflict(&self, name: &str) -> Conflict {
        let answer = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Warning)
            .set_title("File already exists")
            .set_description(format!(
                "{name} already exists in this folder.\n\n\
                 Yes: replace it\nNo: keep both (rename)\nCancel: do nothing"
            ))
            .set_buttons(rfd::MessageButtons::YesNoCancel)
            .show();
        match answer {
            rfd::MessageDialogResult::Yes => Conflict::Overwrite,
            rfd::MessageDialogResult::No => Conflict::Rename,
            _ => Conflict::Skip,
        }
    }
}

fn state_json(viewer: &Mutex<Viewer>) -> Result<serde_json::Value, String> {
    serde_json::to_value(viewer::lock(viewer).state()).map_err(|e| e.to_string())
}

fn selection_unchanged(viewer: &Mutex<Viewer>, expected: &Path) -> Result<(), String> {
    if viewer::lock(viewer).current().as_deref() == Some(expected) {
        Ok(())
    } else {
        Err("The selection changed; nothing was done".to_string())
    }
}

/// Copy or move the current image, asking for the folder first. The viewer lock is held
/// neither while a dialog is open nor during the file operation.
fn transfer(
    viewer: &Mutex<Viewer>,
    dialogs: &dyn Dialogs,
    keep_source: bool,
) -> Result<(), String> {
    let Some(src) = viewer::lock(viewer).current() else {
        return Err("No image selected".to_string());
    };
    let title = if keep_source { "Copy to" } else { "Move to" };
    let Some(dir) = dialogs.pick_folder(title, src.parent().map(PathBuf::from)) else {
        return Ok(());
    };
    let conflict = match src.file_name() {
        Some(name) if dir.join(name).exists() => dialogs.resolve_conflict(&name.to_string_lossy()),
        _ => Conflict::Skip,
    };
    selection_unchanged(viewer, &src)?;
    if keep_source {
        file_ops::copy_to(&src, &dir, conflict).map_err(|e| e.to_string())?;
    } else if file_ops::move_to(&src, &dir, conflict)
        .map_err(|e| e.to_string())?
        .is_some()
    {
        viewer::lock(viewer).forget(&src);
    }
    Ok(())
}

fn save(viewer: &Mutex<Viewer>, rotation: u16, flip_h: bool, flip_v: bool) -> Result<(), String> {
    let Some(path) = viewer::lock(viewer).current() else {
        return Err("No image selected".to_string());
    };
    if file_ops::save_transformed(&path, rotation, flip_h, flip_v).map_err(|e| e.to_string())? {
        let mut guard = viewer::lock(viewer);
        if guard.current().as_deref() == Some(path.as_path()) {
            guard.list_mut().touch();
        }
    }
    Ok(())
}

/// Handles one command. Returns the new view state on success or an error string.
pub fn handle_command(
    viewer: &Mutex<Viewer>,
    dialogs: &dyn Dialogs,
    command: &Command,
) -> Result<serde_json::Value, String> {
    match command {
        Command::GetState | Command::Quit => {}
        Command::Next => {
            viewer::lock(viewer).list_mut().next();
        }
        Command::Previous => {
            viewer::lock(viewer).list_mut().previous();
        }
        Command::First => {
            viewer::lock(viewer).list_mut().first();
        }
        Command::Last => {
            viewer::lock(viewer).list_mut().last();
        }
        Command::Select { index } => {
            viewer::lock(viewer).list_mut().select(*index);
        }
        Command::SetGalleryVisible { visible } => {
            viewer::lock(viewer).set_gallery_visible(*visible);
            storage::save_gallery_visible(*visible);
        }
        Command::OpenFileDialog => {
            let start = viewer::lock(viewer)
                .current()
                .and_then(|p| p.parent().map(PathBuf::from));
            if let Some(path) = dialogs.pick_image(start) {
                if !is_image_path(&path) {
                    log::info!("Opening {} although its extension is not an image", path.display());
                }
                viewer::lock(viewer).open(&path)?;
            }
        }
        Command::CopyTo => transfer(viewer, dialogs, true)?,
        Command::MoveTo => transfer(viewer, dialogs, false)?,
        Command::Save {
            rotation,
            flip_h,
            flip_v,
        } => save(viewer, *rotation, *flip_h, *flip_v)?,
        Command::Delete => {
            let Some(path) = viewer::lock(viewer).current() else {
                return Err("No image selected".to_string());
            };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if dialogs.confirm_delete(&name) {
                let mut guard = viewer::lock(viewer);
                if guard.current().as_ref() == Some(&path) {
                    guard.delete_current()?;
                }
            }
        }
    }
    state_json(viewer)
}

#[cfg(test)]
mod tests;
