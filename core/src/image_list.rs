//! Images of one directory and the cursor over them.
//!
//! Opening a file lists its siblings with a known image extension (case-insensitive) in path
//! order. Navigation never wraps; every change to the list bumps `generation` so cached
//! `app://` URLs go stale.

use image::ImageFormat;
use std::path::{Path, PathBuf};

/// True when the extension belongs to a format the `image` crate knows.
#[must_use]
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ImageFormat::from_extension(ext.to_ascii_lowercase()).is_some())
}

#[derive(Debug, Default)]
pub struct ImageList {
    images: Vec<PathBuf>,
    index: Option<usize>,
    generation: u64,
}

impl ImageList {
    /// Replaces the list with the images next to `file`. The cursor lands on `file`, or on
    /// nothing if `file` itself is not an image in that directory.
    pub fn open(&mut self, file: &Path) -> std::io::Result<()> {
        let dir = match file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut images: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file() || t.is_symlink()))
            .map(|entry| entry.path())
            .filter(|p| is_image_path(p))
            .collect();
        images.sort();

        let wanted = dir.join(file.file_name().unwrap_or_default());
        self.index = images.iter().position(|p| *p == wanted);
        self.images = images;
        self.generation += 1;
        log::debug!(
            "Opened {} ({} images in {})",
            file.display(),
            self.images.len(),
            dir.display()
        );
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn current(&self) -> Option<&Path> {
        self.index.and_then(|i| self.get(i))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Path> {
        self.images.get(index).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.images.iter().map(PathBuf::as_path)
    }

    /// Moves the cursor to `index` if it is in range. Returns whether it moved.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.images.len() || self.index == Some(index) {
            return false;
        }
        self.index = Some(index);
        true
    }

    pub fn next(&mut self) -> bool {
        match self.index {
            Some(i) => self.select(i + 1),
            None => false,
        }
    }

    pub fn previous(&mut self) -> bool {
        match self.index {
            Some(i) if i > 0 => self.select(i - 1),
            _ => false,
        }
    }

    pub fn first(&mut self) -> bool {
        self.index.is_some() && self.select(0)
    }

    pub fn last(&mut self) -> bool {
        self.index.is_some() && self.select(self.images.len().saturating_sub(1))
    }

    /// Marks the current contents as changed on disk so cached URLs reload.
    pub fn touch(&mut self) {
        self.generation += 1;
    }

    /// Forgets the current image (moved away or deleted). The cursor stays at the same
    /// position, falls back to the new last image, or clears when the list runs empty.
    pub fn remove_current(&mut self) -> Option<PathBuf> {
        let i = self.index?;
        Some(self.remove_at(i))
    }

    /// Forgets `path` wherever it is in the list. The cursor keeps pointing at the same
    /// image unless that image is the one removed. Returns whether `path` was listed.
    pub fn remove(&mut self, path: &Path) -> bool {
        match self.images.iter().position(|p| p == path) {
            Some(i) => {
                self.remove_at(i);
                true
            }
            None => false,
        }
    }

    fn remove_at(&mut self, i: usize) -> PathBuf {
        let removed = self.images.remove(i);
        self.index = match (self.index, self.images.len()) {
            (_, 0) | (None, _) => None,
            (Some(cur), _) if cur > i => Some(cur - 1),
            (Some(cur), n) => Some(cur.min(n - 1)),
        };
        self.generation += 1;
        removed
    }
}
