// Server module entry point
// Binds the listener and runs the accept loop

pub mod connection;
pub mod listener;
pub mod signal;
pub mod timeout;

// `loop` is a keyword, so the file is mounted as server_loop
#[path = "loop.rs"]
pub mod server_loop;

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::config::AppState;
use crate::logger;

pub use listener::create_listener;
pub use server_loop::start_server_loop;

/// A bound origin server
///
/// The asset root and fallback document were already validated when
/// `AppState` was built, so a bound server can always serve.
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the configured address. Must be called inside a Tokio runtime.
    pub fn bind(state: Arc<AppState>) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let addr = state.config.get_socket_addr()?;
        let listener = create_listener(addr)
            .map_err(|e| format!("Failed to bind {addr}: {e}"))?;
        Ok(Self {
            listener,
            state,
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` is notified
    pub async fn run(self, shutdown: Arc<Notify>) {
        start_server_loop(
            self.listener,
            self.state,
            self.active_connections,
            shutdown,
        )
        .await;
    }
}

/// Bind, install signal handlers, and serve until SIGTERM or SIGINT
pub async fn run(state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let shutdown = Arc::new(Notify::new());
    signal::start_signal_handler(Arc::clone(&state), Arc::clone(&shutdown));

    let server = Server::bind(Arc::clone(&state))?;
    let addr = server.local_addr()?;
    logger::log_server_start(&addr, &state.config, state.router.store().root());
    server.run(shutdown).await;
    Ok(())
}
