//! Viewer state shared by the event loop, IPC handlers and the `app://` protocol.
//!
//! The page only ever sees [`ViewState`]; image bytes are fetched separately from
//! `app://localhost/image/<index>`.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::config::APP_TITLE;
use crate::file_ops;
use crate::image_list::ImageList;

/// Snapshot sent to the page after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub current: Option<usize>,
    pub name: Option<String>,
    pub path: Option<String>,
    /// "i / n", 1-based, as shown in the status bar.
    pub position: Option<String>,
    pub dimensions: Option<[u32; 2]>,
    pub images: Vec<String>,
    pub generation: u64,
    pub gallery_visible: bool,
    pub title: String,
}

#[derive(Debug)]
pub struct Viewer {
    list: ImageList,
    gallery_visible: bool,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Viewer {
    #[must_use]
    pub fn new(gallery_visible: bool) -> Self {
        Self {
            list: ImageList::default(),
            gallery_visible,
        }
    }

    #[must_use]
    pub fn list(&self) -> &ImageList {
        &self.list
    }

    pub fn open(&mut self, file: &Path) -> Result<(), String> {
        self.list
            .open(file)
            .map_err(|e| format!("Cannot open {}: {}", file.display(), e))
    }

    pub fn list_mut(&mut self) -> &mut ImageList {
        &mut self.list
    }

    pub fn set_gallery_visible(&mut self, visible: bool) {
        self.gallery_visible = visible;
    }

    #[must_use]
    pub fn current(&self) -> Option<PathBuf> {
        self.list.current().map(Path::to_path_buf)
    }

    /// Drops `path` from the list after it was moved away. Returns whether it was listed.
    pub fn forget(&mut self, path: &Path) -> bool {
        self.list.remove(path)
    }

    /// Deletes the current image from disk and from the list.
    pub fn delete_current(&mut self) -> Result<(), String> {
        let path = self.current().ok_or("No image selected")?;
        file_ops::delete(&path).map_err(|e| format!("Cannot delete {}: {}", path.display(), e))?;
        self.list.remove_current();
        Ok(())
    }

    /// Window title: "<name> - BaloViewer", or just the app name with nothing open.
    #[must_use]
    pub fn title(&self) -> String {
        match self.list.current() {
            Some(path) => format!("{} - {APP_TITLE}", file_name(path)),
            None => APP_TITLE.to_string(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ViewState {
        let current = self.list.index();
        let path = self.list.current();
        let name = path.map(file_name);
        ViewState {
            current,
            name,
            path: path.map(|p| p.display().to_string()),
            position: current.map(|i| format!("{} / {}", i + 1, self.list.len())),
            dimensions: path
                .and_then(|p| image::image_dimensions(p).ok())
                .map(|(w, h)| [w, h]),
            images: self.list.iter().map(file_name).collect(),
            generation: self.list.generation(),
            gallery_visible: self.gallery_visible,
            title: self.title(),
        }
    }
}

/// Locks the shared viewer, recovering from poison so one panicking worker cannot wedge the UI.
pub fn lock(viewer: &Mutex<Viewer>) -> MutexGuard<'_, Viewer> {
    viewer.lock().unwrap_or_else(|e| {
        log::error!("Viewer mutex was poisoned, recovering");
        e.into_inner()
    })
}
