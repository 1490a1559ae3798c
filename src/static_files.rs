//! File serving for `App::static_files`.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use futures::future::BoxFuture;
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerResult};
use crate::http::Response;

/// Name of the wildcard parameter the file route binds.
pub(crate) const FILEPATH_PARAM: &str = "filepath";

/// Terminal handler serving files below `root`. The route it is mounted on
/// must bind the relative path as `*filepath`.
#[derive(Clone)]
pub struct StaticFiles {
    root: Arc<PathBuf>,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Joins a request path onto the root. Anything but plain names
    /// (`..`, absolute paths, prefixes) is refused.
    fn map_path(&self, rel: &str) -> Option<PathBuf> {
        let mut path = self.root.as_ref().clone();
        for component in Path::new(rel.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(path)
    }

    async fn load(&self, rel: &str) -> Result<Response> {
        let mut path = self.map_path(rel).ok_or(Error::NotFound)?;
        let mut metadata = tokio::fs::metadata(&path).await.map_err(|_| Error::NotFound)?;
        if metadata.is_dir() {
            path.push("index.html");
            metadata = tokio::fs::metadata(&path).await.map_err(|_| Error::NotFound)?;
        }
        if !metadata.is_file() {
            return Err(Error::NotFound);
        }

        let contents = tokio::fs::read(&path).await?;
        let mut response = Response::with_body(200, content_type(&path), contents);
        if let Ok(modified) = metadata.modified() {
            response.set_header("Last-Modified", &httpdate::fmt_http_date(modified));
            if let Ok(age) = modified.duration_since(SystemTime::UNIX_EPOCH) {
                response.set_header("ETag", &format!("\"{}-{}\"", metadata.len(), age.as_secs()));
            }
        }
        response.set_header("Cache-Control", "public, max-age=3600");
        Ok(response)
    }
}

impl Handler for StaticFiles {
    fn call(&self, c: Context) -> BoxFuture<'static, HandlerResult> {
        let files = self.clone();
        Box::pin(async move {
            let rel = c.param(FILEPATH_PARAM).to_string();
            match files.load(&rel).await {
                Ok(response) => {
                    debug!(path = %c.path(), file = %rel, "serving static file");
                    c.send(response);
                    Ok(())
                }
                Err(err) => Err(err),
            }
        })
    }
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ginza-static-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(dir.join("css")).unwrap();
        fs::write(dir.join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.join("css/site.css"), "body{}").unwrap();
        dir
    }

    #[test]
    fn map_path_refuses_traversal() {
        let files = StaticFiles::new("public");
        assert!(files.map_path("../Cargo.toml").is_none());
        assert!(files.map_path("css/../../secret").is_none());
        assert_eq!(
            files.map_path("./css/site.css"),
            Some(PathBuf::from("public/css/site.css"))
        );
    }

    #[tokio::test]
    async fn serves_files_with_content_type() {
        let dir = scratch_dir();
        let files = StaticFiles::new(&dir);

        let css = files.load("css/site.css").await.unwrap();
        assert_eq!(css.header("content-type"), Some("text/css; charset=utf-8"));
        assert_eq!(css.body, b"body{}");
        assert!(css.header("last-modified").is_some());

        let index = files.load("").await.unwrap();
        assert_eq!(index.body_str(), "<h1>home</h1>");

        assert!(matches!(files.load("missing.js").await, Err(Error::NotFound)));
        fs::remove_dir_all(dir).unwrap();
    }
}
