// Shared helpers for the integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use spa_origin::config::{AppState, Config};
use spa_origin::server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub const INDEX: &str = "<!doctype html><title>app</title><div id=app></div>";
pub const APP_JS: &str = "document.getElementById('app').textContent = 'hi';";

/// A running server bound to an ephemeral loopback port
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(root: &Path) -> Self {
        Self::start_with(config_for(root)).await
    }

    pub async fn start_with(config: Config) -> Self {
        let state = Arc::new(AppState::new(config).unwrap());
        let server = Server::bind(state).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(server.run(Arc::clone(&shutdown)));
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn stop(self) {
        self.shutdown.notify_one();
        self.handle.await.unwrap();
    }
}

/// Loopback config on an ephemeral port serving `root`
pub fn config_for(root: &Path) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.assets.root = root.to_path_buf();
    config.logging.access_log = false;
    config
}

/// Minimal SPA build output
pub fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), INDEX).unwrap();
    std::fs::create_dir(dir.path().join("assets")).unwrap();
    std::fs::write(dir.path().join("assets/app.js"), APP_JS).unwrap();
    std::fs::write(dir.path().join("favicon.ico"), [0u8, 0, 1, 0]).unwrap();
    dir
}

/// Send a request verbatim and read until the server closes
///
/// Bypasses client-side URI normalization so hostile paths reach the server
/// exactly as written.
pub async fn raw_request(addr: SocketAddr, request_line: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("{request_line}\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}
