// app:// protocol: embedded viewer UI plus the images of the current list. No other files.

use include_dir::Dir;
use std::borrow::Cow;
use std::sync::Mutex;

use crate::viewer::{self, Viewer};

/// CSP for app://.
pub const CSP: &str =
    "default-src 'self'; img-src 'self'; script-src 'self'; style-src 'self'; connect-src 'none';";

pub const INDEX_PATH: &str = "index.html";

/// URI prefix for images of the current list: `/image/<index>`.
const IMAGE_PREFIX: &str = "image/";

pub enum ServeResult {
    Found {
        body: Cow<'static, [u8]>,
        mime_type: &'static str,
    },
    NotFound,
}

#[must_use]
pub fn mime_from_path(path: &str) -> &'static str {
    if path.ends_with(".html") || path.ends_with('/') || path.is_empty() {
        "text/html"
    } else if path.ends_with(".js") {
        "application/javascript"
    } else if path.ends_with(".css") {
        "text/css"
    } else if path.ends_with(".json") {
        "application/json"
    } else if path.ends_with(".svg") {
        "image/svg+xml"
    } else if path.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

/// Maps a URI path to a path inside the UI tree. `/` and empty map to `index.html`; anything
/// with a `..` segment is rejected.
#[must_use]
pub fn normalize_path(uri_path: &str) -> Option<&str> {
    let path = uri_path.trim_matches('/');
    if path.is_empty() {
        return Some(INDEX_PATH);
    }
    if path.split('/').any(|seg| seg.trim() == "..") {
        return None;
    }
    Some(path)
}

fn serve_image(viewer: &Mutex<Viewer>, index: &str) -> ServeResult {
    let Ok(index) = index.parse::<usize>() else {
        return ServeResult::NotFound;
    };
    // Copy the path out so the lock is not held during the read.
    let Some(path) = viewer::lock(viewer).list().get(index).map(|p| p.to_path_buf()) else {
        return ServeResult::NotFound;
    };
    match std::fs::read(&path) {
        Ok(bytes) => ServeResult::Found {
            body: Cow::Owned(bytes),
            mime_type: image::ImageFormat::from_path(&path)
                .map(|f| f.to_mime_type())
                .unwrap_or("application/octet-stream"),
        },
        Err(e) => {
            log::warn!("Cannot read {}: {}", path.display(), e);
            ServeResult::NotFound
        }
    }
}

/// Serves one request. `uri_path` is the URI path without query (e.g. "/" or "/image/3").
pub fn serve(ui: &'static Dir<'static>, viewer: &Mutex<Viewer>, uri_path: &str) -> ServeResult {
    let Some(path) = normalize_path(uri_path) else {
        return ServeResult::NotFound;
    };
    if let Some(index) = path.strip_prefix(IMAGE_PREFIX) {
        return serve_image(viewer, index);
    }
    match ui.get_file(path) {
        Some(file) => ServeResult::Found {
            body: Cow::Borrowed(file.contents()),
            mime_type: mime_from_path(path),
        },
        None => ServeResult::NotFound,
    }
}

/// Response with CSP and Content-Type.
pub fn response(result: ServeResult) -> http::Response<Cow<'static, [u8]>> {
    let (status, body, mime_type) = match result {
        ServeResult::Found { body, mime_type } => (200, body, mime_type),
        ServeResult::NotFound => (404, Cow::Borrowed(b"Not Found".as_slice()), "text/plain"),
    };
    http::Response::builder()
        .status(status)
        .header("Content-Type", mime_type)
        .header("Content-Security-Policy", CSP)
        .header("X-Content-Type-Options", "nosniff")
        .header("Cache-Control", "no-store")
        .body(body)
        .unwrap_or_else(|e| {
            log::error!("Protocol response build failed: {}", e);
            http::Response::new(Cow::Borrowed(b"Internal Server Error".as_slice()))
        })
}
