//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, dispatch to
//! static file serving, common headers and access logging.

use crate::config::AppState;
use crate::handler::static_files::{self, FallbackServed};
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};
use hyper::header::{
    HeaderName, HeaderValue, CONTENT_LENGTH, IF_MODIFIED_SINCE, IF_NONE_MATCH, RANGE, REFERER,
    SERVER, USER_AGENT,
};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    /// Raw (percent-encoded) path component
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub if_none_match: Option<&'a str>,
    pub if_modified_since: Option<&'a str>,
    pub range_header: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    pub fn from_parts(parts: &'a Parts) -> Self {
        let header = move |name: HeaderName| parts.headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            path: parts.uri.path(),
            query: parts.uri.query(),
            is_head: parts.method == Method::HEAD,
            if_none_match: header(IF_NONE_MATCH),
            if_modified_since: header(IF_MODIFIED_SINCE),
            range_header: header(RANGE),
        }
    }
}

/// Main entry point for HTTP request handling
///
/// Generic over the request body since static serving never reads it; the
/// body is dropped right away.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    drop(body);

    let mut response = match check_http_method(&parts.method) {
        Some(resp) => resp,
        None => static_files::serve(&RequestContext::from_parts(&parts), &state).await,
    };

    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, server);
    }

    if state.config.logging.access_log {
        log_access(&parts, &response, peer_addr, started, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Reject everything but GET and HEAD
fn check_http_method(method: &Method) -> Option<Response<ResponseBody>> {
    match *method {
        Method::GET | Method::HEAD => None,
        _ => {
            logger::log_debug(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

fn log_access(
    req: &Parts,
    response: &Response<ResponseBody>,
    peer_addr: SocketAddr,
    started: Instant,
    format: &str,
) {
    let header = |name: HeaderName| {
        req.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method.to_string(),
        req.uri.path().to_string(),
    );
    entry.query = req.uri.query().map(ToString::to_string);
    entry.http_version = match req.version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
    .to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = if req.method == Method::HEAD {
        0
    } else {
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry.fallback = response.extensions().get::<FallbackServed>().is_some();
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;
    use hyper::header::{
        ACCEPT_RANGES, CACHE_CONTROL, CONTENT_RANGE, CONTENT_TYPE, ETAG, LAST_MODIFIED, LOCATION,
    };
    use hyper::StatusCode;

    const INDEX: &str = "<!doctype html><div id=app></div>";
    const APP_JS: &str = "console.log('app');";

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), INDEX).unwrap();
        std::fs::write(dir.path().join("app.js"), APP_JS).unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        dir
    }

    fn state_for(dir: &tempfile::TempDir) -> Arc<AppState> {
        let mut config = Config::default();
        config.assets.root = dir.path().to_path_buf();
        config.logging.access_log = false;
        Arc::new(AppState::new(config).unwrap())
    }

    async fn send(state: &Arc<AppState>, req: Request<()>) -> (Response<ResponseBody>, Vec<u8>) {
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let response = handle_request(req, Arc::clone(state), peer).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes().to_vec();
        (Response::from_parts(parts, http::response::empty()), bytes)
    }

    fn get(path: &str) -> Request<()> {
        Request::builder().uri(path).body(()).unwrap()
    }

    #[tokio::test]
    async fn test_existing_asset() {
        let dir = site();
        let state = state_for(&dir);
        let (resp, body) = send(&state, get("/app.js")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body, APP_JS.as_bytes());
        assert_eq!(resp.headers()[CONTENT_LENGTH], APP_JS.len().to_string().as_str());
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/javascript");
        assert_eq!(resp.headers()[CACHE_CONTROL], "public, max-age=3600");
        assert_eq!(resp.headers()[ACCEPT_RANGES], "bytes");
        assert_eq!(resp.headers()[SERVER], "spa-origin");
        assert!(resp.headers().contains_key(ETAG));
        assert!(resp.headers().contains_key(LAST_MODIFIED));
    }

    #[tokio::test]
    async fn test_head_matches_get() {
        let dir = site();
        let state = state_for(&dir);
        let (get_resp, _) = send(&state, get("/img/logo.png")).await;
        let head = Request::builder()
            .method(Method::HEAD)
            .uri("/img/logo.png")
            .body(())
            .unwrap();
        let (head_resp, body) = send(&state, head).await;

        assert_eq!(head_resp.status(), StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(head_resp.headers(), get_resp.headers());
        assert_eq!(head_resp.headers()[CONTENT_LENGTH], "4");
    }

    #[tokio::test]
    async fn test_client_route_gets_fallback() {
        let dir = site();
        let state = state_for(&dir);
        let (resp, body) = send(&state, get("/orders/42/edit")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body, INDEX.as_bytes());
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(resp.headers()[CACHE_CONTROL], "no-cache");
        assert!(resp.extensions().get::<FallbackServed>().is_some());
    }

    #[tokio::test]
    async fn test_missing_asset_is_404() {
        let dir = site();
        let state = state_for(&dir);
        for path in ["/missing.js", "/img/missing.png", "/static/app.css"] {
            let (resp, body) = send(&state, get(path)).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
            assert_ne!(body, INDEX.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_traversal_is_404() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("passwd"), "root:x:0:0").unwrap();
        let dir = site();
        let state = state_for(&dir);

        for path in ["/../../etc/passwd", "/%2e%2e/secret", "/%2e%2e%2fpasswd", "/a/%2e%2e/%2e%2e/passwd"] {
            let (resp, body) = send(&state, get(path)).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
            assert_eq!(body, b"404 Not Found");
        }
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let dir = site();
        let state = state_for(&dir);
        for method in [Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS] {
            let req = Request::builder().method(method).uri("/app.js").body(()).unwrap();
            let (resp, _) = send(&state, req).await;
            assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(resp.headers()["allow"], "GET, HEAD");
        }
    }

    #[tokio::test]
    async fn test_malformed_path_is_400() {
        let dir = site();
        let state = state_for(&dir);
        let (resp, _) = send(&state, get("/%ff%fe")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_conditional_requests() {
        let dir = site();
        let state = state_for(&dir);
        let (first, _) = send(&state, get("/app.js")).await;
        let etag = first.headers()[ETAG].to_str().unwrap().to_string();
        let last_modified = first.headers()[LAST_MODIFIED].to_str().unwrap().to_string();

        let req = Request::builder()
            .uri("/app.js")
            .header(IF_NONE_MATCH, &etag)
            .body(())
            .unwrap();
        let (resp, body) = send(&state, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert!(body.is_empty());

        let req = Request::builder()
            .uri("/app.js")
            .header(IF_MODIFIED_SINCE, &last_modified)
            .body(())
            .unwrap();
        let (resp, _) = send(&state, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);

        let req = Request::builder()
            .uri("/app.js")
            .header(IF_NONE_MATCH, "\"stale\"")
            .header(IF_MODIFIED_SINCE, &last_modified)
            .body(())
            .unwrap();
        let (resp, _) = send(&state, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_range_requests() {
        let dir = site();
        let state = state_for(&dir);

        let req = Request::builder()
            .uri("/app.js")
            .header(RANGE, "bytes=0-6")
            .body(())
            .unwrap();
        let (resp, body) = send(&state, req).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(body, b"console");
        assert_eq!(resp.headers()[CONTENT_LENGTH], "7");
        assert_eq!(
            resp.headers()[CONTENT_RANGE],
            format!("bytes 0-6/{}", APP_JS.len()).as_str()
        );

        let req = Request::builder()
            .uri("/app.js")
            .header(RANGE, "bytes=-3")
            .body(())
            .unwrap();
        let (_, body) = send(&state, req).await;
        assert_eq!(body, b"');");

        let req = Request::builder()
            .uri("/app.js")
            .header(RANGE, "bytes=9999-")
            .body(())
            .unwrap();
        let (resp, _) = send(&state, req).await;
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_is_500() {
        use std::os::unix::fs::PermissionsExt;

        let dir = site();
        let locked = dir.path().join("locked.js");
        std::fs::write(&locked, "secret").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits, nothing to observe then
        if std::fs::read(&locked).is_ok() {
            return;
        }

        let state = state_for(&dir);
        let (resp, body) = send(&state, get("/locked.js")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, b"500 Internal Server Error");

        let head = Request::builder()
            .method(Method::HEAD)
            .uri("/locked.js")
            .body(())
            .unwrap();
        let (head_resp, _) = send(&state, head).await;
        assert_eq!(head_resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(head_resp.headers(), resp.headers());
    }

    #[tokio::test]
    async fn test_directory_without_slash_redirects() {
        let dir = site();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/index.html"), "docs").unwrap();
        let state = state_for(&dir);

        let (resp, _) = send(&state, get("/docs")).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[LOCATION], "/docs/");

        let (resp, _) = send(&state, get("/docs?tab=api&v=2")).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[LOCATION], "/docs/?tab=api&v=2");

        let (resp, body) = send(&state, get("/docs/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body, b"docs");

        // Directories without an index still redirect first
        let (resp, _) = send(&state, get("/img")).await;
        assert_eq!(resp.headers()[LOCATION], "/img/");
    }
}
