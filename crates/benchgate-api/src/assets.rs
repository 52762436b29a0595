//! Static files and the templated homepage.

use std::path::{Component, Path, PathBuf};

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Response};
use tracing::debug;

use crate::route::AssetClass;

/// Placeholder in `homepage.html` replaced by the gateway's own base URL.
const BASE_URL_PLACEHOLDER: &str = "{{.}}";

/// Serve `<root><tail>` with the content type of its class.
pub async fn serve(root: &Path, class: AssetClass, tail: &str) -> Response {
    let Some(path) = resolve(root, tail) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(CONTENT_TYPE, class.content_type())], bytes).into_response(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "asset not found");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Render `<root>/html/homepage.html` for a client that reached us as `host`.
pub async fn homepage(root: &Path, host: &str) -> Response {
    let path = root.join("html").join("homepage.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(template) => {
            let base = format!("{}/ci/", html_escape(host));
            Html(template.replace(BASE_URL_PLACEHOLDER, &base)).into_response()
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "homepage missing");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Escape the characters that could break out of an HTML attribute or text.
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Join `tail` under `root`, refusing anything but plain path segments.
fn resolve(root: &Path, tail: &str) -> Option<PathBuf> {
    let relative = Path::new(tail.trim_start_matches('/'));
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_traversal() {
        let root = Path::new("/srv/static");
        assert_eq!(
            resolve(root, "/css/site.css"),
            Some(PathBuf::from("/srv/static/css/site.css"))
        );
        assert_eq!(resolve(root, "/css/../../etc/passwd"), None);
        assert_eq!(resolve(root, "/js/./app.js"), Some(PathBuf::from("/srv/static/js/app.js")));
    }

    #[tokio::test]
    async fn homepage_substitutes_base_url() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("html")).unwrap();
        std::fs::write(
            dir.path().join("html/homepage.html"),
            "<script>var base = \"{{.}}\";</script>",
        )
        .unwrap();

        let response = homepage(dir.path(), "osfci.tech").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<script>var base = \"osfci.tech/ci/\";</script>");
    }

    #[tokio::test]
    async fn homepage_escapes_the_host() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("html")).unwrap();
        std::fs::write(dir.path().join("html/homepage.html"), "<a href=\"{{.}}\">").unwrap();

        let response = homepage(dir.path(), "x\"><script>alert('&')</script>").await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            &body[..],
            b"<a href=\"x&quot;&gt;&lt;script&gt;alert(&#39;&amp;&#39;)&lt;/script&gt;/ci/\">"
        );
    }

    #[tokio::test]
    async fn missing_asset_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let response = serve(dir.path(), AssetClass::Js, "/js/nope.js").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
