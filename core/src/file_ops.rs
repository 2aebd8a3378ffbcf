//! Copy, move, delete and rotate/flip for the image on screen.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What to do when the target directory already has a file with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Overwrite,
    /// Use the first free `name (n).ext`.
    Rename,
    Skip,
}

#[derive(Debug, thiserror::Error)]
pub enum FileOpError {
    #[error("{} has no file name", .0.display())]
    NoFileName(PathBuf),
    #[error("{} is already in {}", .0.display(), .1.display())]
    SameDirectory(PathBuf, PathBuf),
    #[error("cannot {} {} to {}: {}", .op, .from.display(), .to.display(), .source)]
    Io {
        op: &'static str,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rotation must be a multiple of 90 degrees, got {0}")]
    Rotation(u16),
    #[error("cannot rewrite {}: {}", .0.display(), .1)]
    Image(PathBuf, #[source] image::ImageError),
}

/// Where `src` would land inside `dir`, before conflict handling.
pub fn target_in(src: &Path, dir: &Path) -> Result<PathBuf, FileOpError> {
    let name = src
        .file_name()
        .ok_or_else(|| FileOpError::NoFileName(src.to_path_buf()))?;
    Ok(dir.join(name))
}

/// Returns `dir/stem (n).ext` for the smallest `n >= 1` that does not exist.
#[must_use]
pub fn free_name(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = target.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = target.parent().unwrap_or_else(|| Path::new(""));
    (1u32..)
        .map(|n| {
            let name = match &ext {
                Some(ext) => format!("{stem} ({n}).{ext}"),
                None => format!("{stem} ({n})"),
            };
            parent.join(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| target.to_path_buf())
}

/// True when `a` and `b` name the same file on disk, however the paths are spelled.
/// Symlinked folders compare by canonical path, hard links (Unix) by device and inode.
fn same_file(a: &Path, b: &Path) -> bool {
    if let (Ok(a), Ok(b)) = (fs::canonicalize(a), fs::canonicalize(b))
        && a == b
    {
        return true;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let (Ok(a), Ok(b)) = (fs::metadata(a), fs::metadata(b)) {
            return a.dev() == b.dev() && a.ino() == b.ino();
        }
    }
    false
}

fn resolve(src: &Path, dir: &Path, conflict: Conflict) -> Result<Option<PathBuf>, FileOpError> {
    let target = target_in(src, dir)?;
    // Copying a file onto itself truncates it.
    if target == src || same_file(src, &target) {
        return Err(FileOpError::SameDirectory(src.to_path_buf(), dir.to_path_buf()));
    }
    if !target.exists() {
        return Ok(Some(target));
    }
    Ok(match conflict {
        Conflict::Overwrite => Some(target),
        Conflict::Rename => Some(free_name(&target)),
        Conflict::Skip => None,
    })
}

/// Copies `src` into `dir`. Returns the written path, or `None` when skipped.
pub fn copy_to(src: &Path, dir: &Path, conflict: Conflict) -> Result<Option<PathBuf>, FileOpError> {
    let Some(dst) = resolve(src, dir, conflict)? else {
        return Ok(None);
    };
    fs::copy(src, &dst).map_err(|source| FileOpError::Io {
        op: "copy",
        from: src.to_path_buf(),
        to: dst.clone(),
        source,
    })?;
    log::info!("Copied {} to {}", src.display(), dst.display());
    Ok(Some(dst))
}

/// Moves `src` into `dir`, falling back to copy + remove across filesystems.
pub fn move_to(src: &Path, dir: &Path, conflict: Conflict) -> Result<Option<PathBuf>, FileOpError> {
    let Some(dst) = resolve(src, dir, conflict)? else {
        return Ok(None);
    };
    let io_err = |source: io::Error| FileOpError::Io {
        op: "move",
        from: src.to_path_buf(),
        to: dst.clone(),
        source,
    };
    if let Err(e) = fs::rename(src, &dst) {
        log::debug!("rename failed ({}); copying instead", e);
        fs::copy(src, &dst).map_err(io_err)?;
        fs::remove_file(src).map_err(io_err)?;
    }
    log::info!("Moved {} to {}", src.display(), dst.display());
    Ok(Some(dst))
}

/// Rewrites the image at `path` flipped, then rotated clockwise by `rotation` degrees: the
/// order the page applies its preview transform in. The format follows the extension.
/// Returns false when there was nothing to apply.
pub fn save_transformed(
    path: &Path,
    rotation: u16,
    flip_h: bool,
    flip_v: bool,
) -> Result<bool, FileOpError> {
    let rotation = rotation % 360;
    if rotation % 90 != 0 {
        return Err(FileOpError::Rotation(rotation));
    }
    if rotation == 0 && !flip_h && !flip_v {
        return Ok(false);
    }
    let image_err = |e| FileOpError::Image(path.to_path_buf(), e);
    let mut img = image::open(path).map_err(image_err)?;
    if flip_h {
        img = img.fliph();
    }
    if flip_v {
        img = img.flipv();
    }
    img = match rotation {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img,
    };
    img.save(path).map_err(image_err)?;
    log::info!(
        "Saved {} rotated {} (flip h: {}, v: {})",
        path.display(),
        rotation,
        flip_h,
        flip_v
    );
    Ok(true)
}

/// Deletes `path`. A file that is already gone counts as deleted.
pub fn delete(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::info!("Deleted {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _root: tempfile::TempDir,
        src: PathBuf,
        dst_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().expect("tempdir");
        let src_dir = root.path().join("from");
        let dst_dir = root.path().join("to");
        fs::create_dir(&src_dir).expect("mkdir");
        fs::create_dir(&dst_dir).expect("mkdir");
        let src = src_dir.join("photo.png");
        fs::write(&src, b"new").expect("write");
        Fixture {
            _root: root,
            src,
            dst_dir,
        }
    }

    #[test]
    fn copy_keeps_source() {
        let f = fixture();
        let dst = copy_to(&f.src, &f.dst_dir, Conflict::Skip)
            .expect("copy")
            .expect("not skipped");
        assert_eq!(dst, f.dst_dir.join("photo.png"));
        assert!(f.src.exists());
        assert_eq!(fs::read(&dst).expect("read"), b"new");
    }

    #[test]
    fn move_removes_source() {
        let f = fixture();
        let dst = move_to(&f.src, &f.dst_dir, Conflict::Skip)
            .expect("move")
            .expect("not skipped");
        assert!(!f.src.exists());
        assert!(dst.exists());
    }

    #[test]
    fn conflicts_skip_overwrite_rename() {
        let f = fixture();
        let existing = f.dst_dir.join("photo.png");
        fs::write(&existing, b"old").expect("write");

        assert!(copy_to(&f.src, &f.dst_dir, Conflict::Skip).expect("skip").is_none());
        assert_eq!(fs::read(&existing).expect("read"), b"old");

        let renamed = copy_to(&f.src, &f.dst_dir, Conflict::Rename)
            .expect("rename")
            .expect("written");
        assert_eq!(renamed, f.dst_dir.join("photo (1).png"));
        let renamed_again = copy_to(&f.src, &f.dst_dir, Conflict::Rename)
            .expect("rename")
            .expect("written");
        assert_eq!(renamed_again, f.dst_dir.join("photo (2).png"));

        copy_to(&f.src, &f.dst_dir, Conflict::Overwrite).expect("overwrite");
        assert_eq!(fs::read(&existing).expect("read"), b"new");
    }

    #[test]
    fn same_directory_is_refused() {
        let f = fixture();
        let dir = f.src.parent().expect("parent").to_path_buf();
        assert!(matches!(
            move_to(&f.src, &dir, Conflict::Overwrite),
            Err(FileOpError::SameDirectory(..))
        ));
        assert!(f.src.exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_alias_of_source_folder_is_refused() {
        let f = fixture();
        let real = f.src.parent().expect("parent").to_path_buf();
        let alias = f.dst_dir.join("alias");
        std::os::unix::fs::symlink(&real, &alias).expect("symlink");

        for conflict in [Conflict::Overwrite, Conflict::Skip] {
            assert!(matches!(
                copy_to(&f.src, &alias, conflict),
                Err(FileOpError::SameDirectory(..))
            ));
            assert!(matches!(
                move_to(&f.src, &alias, conflict),
                Err(FileOpError::SameDirectory(..))
            ));
        }
        assert_eq!(fs::read(&f.src).expect("read"), b"new");
    }

    #[cfg(unix)]
    #[test]
    fn hard_link_target_is_refused() {
        let f = fixture();
        fs::hard_link(&f.src, f.dst_dir.join("photo.png")).expect("hard link");
        assert!(matches!(
            copy_to(&f.src, &f.dst_dir, Conflict::Overwrite),
            Err(FileOpError::SameDirectory(..))
        ));
        assert_eq!(fs::read(&f.src).expect("read"), b"new");
    }

    #[test]
    fn copy_into_differently_spelled_source_folder_is_refused() {
        let f = fixture();
        let parent = f.src.parent().expect("parent");
        let spelled = parent.join(".");
        assert!(matches!(
            copy_to(&f.src, &spelled, Conflict::Overwrite),
            Err(FileOpError::SameDirectory(..))
        ));
        assert_eq!(fs::read(&f.src).expect("read"), b"new");
    }

    #[test]
    fn delete_is_idempotent() {
        let f = fixture();
        delete(&f.src).expect("delete");
        assert!(!f.src.exists());
        delete(&f.src).expect("already gone");
    }

    #[test]
    fn free_name_without_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("README");
        fs::write(&target, b"x").expect("write");
        assert_eq!(free_name(&target), dir.path().join("README (1)"));
    }
}
