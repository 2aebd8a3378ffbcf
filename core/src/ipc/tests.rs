//! Unit tests for IPC parsing and command handling.

use super::*;
use std::cell::Cell;
use std::fs;
use std::path::Path;

/// Scripted answers instead of native dialogs.
struct FakeDialogs {
    image: Option<PathBuf>,
    folder: Option<PathBuf>,
    confirm: bool,
    conflict: Conflict,
    asked_conflict: Cell<bool>,
}

impl FakeDialogs {
    fn new() -> Self {
        Self {
            image: None,
            folder: None,
            confirm: false,
            conflict: Conflict::Skip,
            asked_conflict: Cell::new(false),
        }
    }
}

impl Dialogs for FakeDialogs {
    fn pick_image(&self, _start_dir: Option<PathBuf>) -> Option<PathBuf> {
        self.image.clone()
    }

    fn pick_folder(&self, _title: &str, _start_dir: Option<PathBuf>) -> Option<PathBuf> {
        self.folder.clone()
    }

    fn confirm_delete(&self, _name: &str) -> bool {
        self.confirm
    }

    fn resolve_conflict(&self, _name: &str) -> Conflict {
        self.asked_conflict.set(true);
        self.conflict
    }
}

fn viewer_on(dir: &Path, names: &[&str], open: &str) -> Mutex<Viewer> {
    for name in names {
        fs::write(dir.join(name), b"x").expect("write");
    }
    let mut viewer = Viewer::new(true);
    viewer.open(&dir.join(open)).expect("open");
    Mutex::new(viewer)
}

fn current_name(state: &serde_json::Value) -> Option<&str> {
    state["name"].as_str()
}

#[test]
fn parse_message_valid_next() {
    let raw = r#"{"id":"abc-123","name":"Next"}"#;
    let env = parse_message(raw).expect("valid");
    assert_eq!(env.id, "abc-123");
    assert!(matches!(env.command, Command::Next));
}

#[test]
fn parse_message_with_arguments() {
    let env = parse_message(r#"{"id":"1","name":"Select","index":4}"#).expect("valid");
    assert!(matches!(env.command, Command::Select { index: 4 }));
    let env = parse_message(r#"{"id":"2","name":"SetGalleryVisible","visible":false}"#)
        .expect("valid");
    assert!(matches!(env.command, Command::SetGalleryVisible { visible: false }));
    let env = parse_message(r#"{"id":"3","name":"Quit"}"#).expect("valid");
    assert!(matches!(env.command, Command::Quit));
    let env = parse_message(r#"{"id":"4","name":"Save","rotation":270,"flipH":true}"#)
        .expect("valid");
    assert!(matches!(
        env.command,
        Command::Save {
            rotation: 270,
            flip_h: true,
            flip_v: false
        }
    ));
}

#[test]
fn parse_message_invalid_returns_none() {
    assert!(parse_message("").is_none());
    assert!(parse_message("{}").is_none());
    assert!(parse_message("not json").is_none());
    assert!(parse_message(r#"{"id":"1","name":"Select"}"#).is_none());
    assert!(parse_message(r#"{"id":"1","name":"RunShell"}"#).is_none());
}

#[test]
fn is_blocking_command_identifies_blocking_commands() {
    assert!(is_blocking_command(&Command::OpenFileDialog));
    assert!(is_blocking_command(&Command::CopyTo));
    assert!(is_blocking_command(&Command::MoveTo));
    assert!(is_blocking_command(&Command::Delete));
    assert!(is_blocking_command(&Command::Save {
        rotation: 90,
        flip_h: false,
        flip_v: false,
    }));
    assert!(!is_blocking_command(&Command::Next));
    assert!(!is_blocking_command(&Command::GetState));
    assert!(!is_blocking_command(&Command::Select { index: 0 }));
}

#[test]
fn response_serializes_one_side_only() {
    let ok = serde_json::to_value(IpcResponse::ok("1".into(), serde_json::json!(1))).expect("json");
    assert_eq!(ok, serde_json::json!({ "id": "1", "ok": 1 }));
    let err = serde_json::to_value(IpcResponse::err("2".into(), "nope".into())).expect("json");
    assert_eq!(err, serde_json::json!({ "id": "2", "err": "nope" }));
}

#[test]
fn navigation_commands_return_new_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let viewer = viewer_on(dir.path(), &["a.png", "b.png", "c.png"], "a.png");
    let dialogs = FakeDialogs::new();

    let state = handle_command(&viewer, &dialogs, &Command::Next).expect("next");
    assert_eq!(current_name(&state), Some("b.png"));
    assert_eq!(state["position"], "2 / 3");

    let state = handle_command(&viewer, &dialogs, &Command::Last).expect("last");
    assert_eq!(current_name(&state), Some("c.png"));
    let state = handle_command(&viewer, &dialogs, &Command::Next).expect("next at end");
    assert_eq!(current_name(&state), Some("c.png"));

    let state = handle_command(&viewer, &dialogs, &Command::Select { index: 0 }).expect("select");
    assert_eq!(current_name(&state), Some("a.png"));
    let state = handle_command(&viewer, &dialogs, &Command::Previous).expect("previous at start");
    assert_eq!(current_name(&state), Some("a.png"));
}

#[test]
fn open_dialog_loads_picked_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("x.png"), b"x").expect("write");
    fs::write(dir.path().join("y.png"), b"y").expect("write");
    let viewer = Mutex::new(Viewer::new(true));
    let mut dialogs = FakeDialogs::new();

    let state = handle_command(&viewer, &dialogs, &Command::OpenFileDialog).expect("cancelled");
    assert!(state["current"].is_null());

    dialogs.image = Some(dir.path().join("y.png"));
    let state = handle_command(&viewer, &dialogs, &Command::OpenFileDialog).expect("open");
    assert_eq!(current_name(&state), Some("y.png"));
    assert_eq!(state["images"], serde_json::json!(["x.png", "y.png"]));
}

#[test]
fn delete_needs_confirmation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let viewer = viewer_on(dir.path(), &["a.png", "b.png"], "a.png");
    let mut dialogs = FakeDialogs::new();

    handle_command(&viewer, &dialogs, &Command::Delete).expect("declined");
    assert!(dir.path().join("a.png").exists());

    dialogs.confirm = true;
    let state = handle_command(&viewer, &dialogs, &Command::Delete).expect("delete");
    assert!(!dir.path().join("a.png").exists());
    assert_eq!(current_name(&state), Some("b.png"));
}

#[test]
fn move_asks_on_conflict_and_updates_list() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = tempfile::tempdir().expect("tempdir");
    fs::write(target.path().join("a.png"), b"old").expect("write");
    let viewer = viewer_on(dir.path(), &["a.png", "b.png"], "a.png");
    let mut dialogs = FakeDialogs::new();
    dialogs.folder = Some(target.path().to_path_buf());
    dialogs.conflict = Conflict::Rename;

    let state = handle_command(&viewer, &dialogs, &Command::MoveTo).expect("move");
    assert!(dialogs.asked_conflict.get());
    assert!(target.path().join("a (1).png").exists());
    assert!(!dir.path().join("a.png").exists());
    assert_eq!(state["images"], serde_json::json!(["b.png"]));
}

#[test]
fn copy_cancelled_by_folder_dialog_changes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let viewer = viewer_on(dir.path(), &["a.png"], "a.png");
    let dialogs = FakeDialogs::new();

    let state = handle_command(&viewer, &dialogs, &Command::CopyTo).expect("cancelled");
    assert_eq!(current_name(&state), Some("a.png"));
    assert!(!dialogs.asked_conflict.get());
}

#[test]
fn file_commands_without_selection_fail() {
    let viewer = Mutex::new(Viewer::new(true));
    let dialogs = FakeDialogs::new();
    assert!(handle_command(&viewer, &dialogs, &Command::CopyTo).is_err());
    assert!(handle_command(&viewer, &dialogs, &Command::Delete).is_err());
}

/// Dialogs that look at the shared viewer while they are open.
struct MeddlingDialogs<'a> {
    viewer: &'a Mutex<Viewer>,
    folder: PathBuf,
}

impl Dialogs for MeddlingDialogs<'_> {
    fn pick_image(&self, _start_dir: Option<PathBuf>) -> Option<PathBuf> {
        None
    }

    fn pick_folder(&self, _title: &str, _start_dir: Option<PathBuf>) -> Option<PathBuf> {
        assert!(self.viewer.try_lock().is_ok(), "viewer locked during dialog");
        Some(self.folder.clone())
    }

    fn confirm_delete(&self, _name: &str) -> bool {
        false
    }

    fn resolve_conflict(&self, _name: &str) -> Conflict {
        viewer::lock(self.viewer).list_mut().next();
        Conflict::Overwrite
    }
}

#[test]
fn transfer_refuses_when_selection_changes_during_dialogs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = tempfile::tempdir().expect("tempdir");
    fs::write(target.path().join("a.png"), b"old").expect("write");
    let viewer = viewer_on(dir.path(), &["a.png", "b.png"], "a.png");
    let dialogs = MeddlingDialogs {
        viewer: &viewer,
        folder: target.path().to_path_buf(),
    };

    let err = handle_command(&viewer, &dialogs, &Command::MoveTo).expect_err("raced");
    assert!(err.contains("selection changed"), "{err}");
    assert!(dir.path().join("a.png").exists());
    assert_eq!(fs::read(target.path().join("a.png")).expect("read"), b"old");
    assert_eq!(viewer::lock(&viewer).list().len(), 2);
}

#[test]
fn moved_file_leaves_the_list_after_the_lock_is_retaken() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = tempfile::tempdir().expect("tempdir");
    let viewer = viewer_on(dir.path(), &["a.png", "b.png", "c.png"], "b.png");
    let mut dialogs = FakeDialogs::new();
    dialogs.folder = Some(target.path().to_path_buf());

    let state = handle_command(&viewer, &dialogs, &Command::MoveTo).expect("move");
    assert!(target.path().join("b.png").exists());
    assert_eq!(state["images"], serde_json::json!(["a.png", "c.png"]));
    assert_eq!(current_name(&state), Some("c.png"));

    let state = handle_command(&viewer, &dialogs, &Command::CopyTo).expect("copy");
    assert!(dir.path().join("c.png").exists());
    assert!(target.path().join("c.png").exists());
    assert_eq!(state["images"], serde_json::json!(["a.png", "c.png"]));
}

#[test]
fn save_writes_rotation_and_bumps_generation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("wide.png");
    let mut img = image::RgbImage::new(3, 2);
    img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
    img.save(&path).expect("encode png");
    let mut v = Viewer::new(true);
    v.open(&path).expect("open");
    let viewer = Mutex::new(v);
    let dialogs = FakeDialogs::new();
    let before = viewer::lock(&viewer).list().generation();

    let save = Command::Save {
        rotation: 90,
        flip_h: true,
        flip_v: false,
    };
    let state = handle_command(&viewer, &dialogs, &save).expect("save");
    assert_eq!(state["dimensions"], serde_json::json!([2, 3]));
    assert_eq!(state["generation"], serde_json::json!(before + 1));

    // Flipped to the top-right corner, then rotated clockwise to the bottom-right.
    let saved = image::open(&path).expect("decode").to_rgb8();
    assert_eq!(saved.get_pixel(1, 2), &image::Rgb([255, 0, 0]));
    assert_eq!(saved.get_pixel(0, 0), &image::Rgb([0, 0, 0]));
}

#[test]
fn save_without_changes_or_selection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let viewer = viewer_on(dir.path(), &["a.png"], "a.png");
    let dialogs = FakeDialogs::new();
    let identity = Command::Save {
        rotation: 360,
        flip_h: false,
        flip_v: false,
    };
    let state = handle_command(&viewer, &dialogs, &identity).expect("nothing to save");
    assert_eq!(state["generation"], serde_json::json!(1));
    assert_eq!(fs::read(dir.path().join("a.png")).expect("read"), b"x");

    let odd = Command::Save {
        rotation: 45,
        flip_h: false,
        flip_v: false,
    };
    assert!(handle_command(&viewer, &dialogs, &odd).is_err());
    let empty = Mutex::new(Viewer::new(true));
    assert!(handle_command(&empty, &dialogs, &identity).is_err());
}
