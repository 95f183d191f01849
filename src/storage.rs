//! File and download responses served from the storage root.

use crate::error::{ServerError, ServerResult};
use crate::http::Response;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self::new("storage")
    }
}

impl Storage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a storage-relative path to an existing file inside the root.
    ///
    /// Paths that leave the root (`../`) resolve the same way as missing files.
    pub fn resolve(&self, path: &str) -> ServerResult<PathBuf> {
        let file_path = self.root.join(path.trim_start_matches('/'));
        let not_found = || ServerError::ResourceNotFound(PathBuf::from(path));

        let root = fs::canonicalize(&self.root).map_err(|_| not_found())?;
        let canonical_path = fs::canonicalize(&file_path).map_err(|_| not_found())?;
        if canonical_path.starts_with(&root) && canonical_path.is_file() {
            Ok(canonical_path)
        } else {
            Err(not_found())
        }
    }

    /// Sends a file inline with its detected MIME type and byte length.
    pub fn file(&self, path: &str, headers: &[(&str, &str)]) -> ServerResult<Response> {
        let resolved = self.resolve(path)?;
        let contents = fs::read(&resolved)?;

        let mut response = Response::new(200);
        for (name, value) in headers {
            response.header(name, value);
        }
        response
            .header("Content-Type", mime_for(&resolved).as_ref())
            .header("Content-Length", contents.len().to_string());

        if let Ok(modified) = fs::metadata(&resolved).and_then(|m| m.modified()) {
            response.header("Last-Modified", httpdate::fmt_http_date(modified));
        }

        response.body(contents);
        Ok(response)
    }

    /// Like [`Storage::file`], but asks the client to save it.
    ///
    /// The download name defaults to the last segment of `path`.
    pub fn download(
        &self,
        path: &str,
        name: Option<&str>,
        headers: &[(&str, &str)],
    ) -> ServerResult<Response> {
        let name = match name {
            Some(name) => name.to_owned(),
            None => Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_owned()),
        };
        let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "\\\""));

        let mut response = self.file(path, headers)?;
        response.header("Content-Disposition", disposition);
        Ok(response)
    }
}

fn mime_for(path: &Path) -> mime::Mime {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => mime::TEXT_HTML_UTF_8,
        "css" => mime::TEXT_CSS,
        "js" => mime::APPLICATION_JAVASCRIPT,
        "json" => mime::APPLICATION_JSON,
        "txt" => mime::TEXT_PLAIN_UTF_8,
        "csv" => mime::TEXT_CSV,
        "xml" => mime::TEXT_XML,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        "pdf" => mime::APPLICATION_PDF,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("reports")).unwrap();
        fs::write(dir.path().join("reports/q1.csv"), b"a,b\n1,2\n").unwrap();
        fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        let storage = Storage::new(dir.path());
        (dir, storage)
    }

    #[test]
    fn file_sets_type_and_length() {
        let (_dir, storage) = storage();
        let response = storage.file("reports/q1.csv", &[("X-Report", "q1")]).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.get_header("Content-Type"), Some("text/csv"));
        assert_eq!(response.get_header("Content-Length"), Some("8"));
        assert_eq!(response.get_header("X-Report"), Some("q1"));
        assert!(response.get_header("Last-Modified").is_some());
        assert_eq!(response.body, b"a,b\n1,2\n");
    }

    #[test]
    fn caller_headers_do_not_duplicate_file_headers() {
        let (_dir, storage) = storage();
        let response = storage
            .file("reports/q1.csv", &[("content-type", "text/plain"), ("content-length", "1")])
            .unwrap();
        assert_eq!(response.get_header("Content-Type"), Some("text/csv"));
        assert_eq!(response.get_header("Content-Length"), Some("8"));

        let text = String::from_utf8(response.to_http_bytes()).unwrap();
        assert_eq!(text.to_ascii_lowercase().matches("content-type:").count(), 1);
        assert_eq!(text.to_ascii_lowercase().matches("content-length:").count(), 1);
    }

    #[test]
    fn binary_files_are_sent_raw() {
        let (_dir, storage) = storage();
        let response = storage.file("logo.png", &[]).unwrap();
        assert_eq!(response.get_header("Content-Type"), Some("image/png"));
        assert_eq!(response.body, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn download_defaults_to_file_name() {
        let (_dir, storage) = storage();
        let response = storage.download("reports/q1.csv", None, &[]).unwrap();
        assert_eq!(
            response.get_header("Content-Disposition"),
            Some("attachment; filename=\"q1.csv\"")
        );

        let response = storage.download("reports/q1.csv", Some("first.csv"), &[]).unwrap();
        assert_eq!(
            response.get_header("Content-Disposition"),
            Some("attachment; filename=\"first.csv\"")
        );
    }

    #[test]
    fn missing_files_are_not_found() {
        let (_dir, storage) = storage();
        let err = storage.file("reports/q2.csv", &[]).unwrap_err();
        assert!(matches!(err, ServerError::ResourceNotFound(_)));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn paths_cannot_escape_the_root() {
        let outer = tempfile::tempdir().unwrap();
        fs::write(outer.path().join("secret.txt"), b"nope").unwrap();
        fs::create_dir(outer.path().join("public")).unwrap();
        let storage = Storage::new(outer.path().join("public"));

        let err = storage.file("../secret.txt", &[]).unwrap_err();
        assert!(matches!(err, ServerError::ResourceNotFound(_)));
    }

    #[test]
    fn directories_are_not_files() {
        let (_dir, storage) = storage();
        assert!(storage.resolve("reports").is_err());
    }
}
