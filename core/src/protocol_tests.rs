//! Unit tests for the app:// protocol (path normalization, serve, MIME).

#[cfg(test)]
mod tests {
    use crate::protocol::{mime_from_path, normalize_path, response, serve, ServeResult, INDEX_PATH};
    use crate::viewer::Viewer;
    use include_dir::include_dir;
    use std::sync::Mutex;

    static TEST_UI: include_dir::Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/ui");

    fn empty_viewer() -> Mutex<Viewer> {
        Mutex::new(Viewer::new(true))
    }

    #[test]
    fn normalize_path_default_index() {
        assert_eq!(normalize_path("/"), Some(INDEX_PATH));
        assert_eq!(normalize_path(""), Some(INDEX_PATH));
        assert_eq!(normalize_path("///"), Some(INDEX_PATH));
        assert_eq!(normalize_path("/viewer.js"), Some("viewer.js"));
    }

    #[test]
    fn normalize_path_rejects_traversal() {
        assert_eq!(normalize_path("/.."), None);
        assert_eq!(normalize_path("/a/../b"), None);
        assert_eq!(normalize_path("/.. /index.html"), None);
    }

    #[test]
    fn serve_not_found_for_traversal() {
        let r = serve(&TEST_UI, &empty_viewer(), "/../etc/passwd");
        assert!(matches!(r, ServeResult::NotFound));
    }

    #[test]
    fn serve_not_found_for_missing_file() {
        let r = serve(&TEST_UI, &empty_viewer(), "/nonexistent.foo");
        assert!(matches!(r, ServeResult::NotFound));
    }

    #[test]
    fn serve_index() {
        match serve(&TEST_UI, &empty_viewer(), "/") {
            ServeResult::Found { mime_type, .. } => assert_eq!(mime_type, "text/html"),
            ServeResult::NotFound => panic!("index.html is embedded"),
        }
    }

    #[test]
    fn serve_image_by_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.png"), b"png bytes").expect("write");
        std::fs::write(dir.path().join("b.jpg"), b"jpg bytes").expect("write");
        let mut viewer = Viewer::new(true);
        viewer.open(&dir.path().join("a.png")).expect("open");
        let viewer = Mutex::new(viewer);

        match serve(&TEST_UI, &viewer, "/image/1") {
            ServeResult::Found { body, mime_type } => {
                assert_eq!(&*body, b"jpg bytes");
                assert_eq!(mime_type, "image/jpeg");
            }
            ServeResult::NotFound => panic!("image 1 exists"),
        }
        assert!(matches!(serve(&TEST_UI, &viewer, "/image/2"), ServeResult::NotFound));
        assert!(matches!(serve(&TEST_UI, &viewer, "/image/-1"), ServeResult::NotFound));
        assert!(matches!(serve(&TEST_UI, &viewer, "/image/x"), ServeResult::NotFound));
    }

    #[test]
    fn response_carries_security_headers() {
        let r = response(ServeResult::NotFound);
        assert_eq!(r.status(), 404);
        assert!(r.headers().contains_key("Content-Security-Policy"));
        assert_eq!(r.headers()["X-Content-Type-Options"], "nosniff");
    }

    #[test]
    fn mime_from_path_known_extensions() {
        assert_eq!(mime_from_path("a.html"), "text/html");
        assert_eq!(mime_from_path("b.js"), "application/javascript");
        assert_eq!(mime_from_path("c.css"), "text/css");
        assert_eq!(mime_from_path("d.png"), "image/png");
        assert_eq!(mime_from_path("f.unknown"), "application/octet-stream");
    }
}
