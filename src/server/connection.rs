// Connection handling module
// Accepts a single TCP connection and serves HTTP/1.1 on it

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use super::timeout::{self, TimeoutIo};
use crate::config::{AppState, PerformanceConfig};
use crate::handler;
use crate::logger;

/// Holds one slot of the active connection counter until dropped
struct ConnectionSlot(Arc<AtomicUsize>);

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accept a connection, enforcing `performance.max_connections`.
///
/// Connections over the limit are closed without a response.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment first, then check, so concurrent accepts cannot overshoot
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);
    let slot = ConnectionSlot(Arc::clone(conn_counter));

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);
    handle_connection(stream, peer_addr, Arc::clone(state), slot);
}

/// Seconds to `Duration`, zero meaning "no limit"
fn limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Deadlines for the connection stream: (idle, stalled write)
///
/// Without keep-alive the idle limit falls back to the read timeout so a
/// client that connects and never sends still gets dropped.
fn io_timeouts(perf: &PerformanceConfig) -> (Option<Duration>, Option<Duration>) {
    let idle = limit(perf.keep_alive_timeout).or_else(|| limit(perf.read_timeout));
    (idle, limit(perf.write_timeout))
}

/// Serve a connection in its own task.
///
/// There is no cap on a connection's total lifetime: it ends when the peer
/// stays idle, a write stays blocked, or the peer goes away. Ending the
/// connection drops any in-flight response body, which closes the file it
/// was streaming.
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    slot: ConnectionSlot,
) {
    tokio::spawn(async move {
        let _slot = slot;
        let perf = &state.config.performance;
        let (idle, write) = io_timeouts(perf);
        let io = TokioIo::new(TimeoutIo::new(stream, idle, write));

        let mut builder = http1::Builder::new();
        builder.timer(TokioTimer::new());
        builder.keep_alive(perf.keep_alive_timeout > 0);
        if let Some(read_timeout) = limit(perf.read_timeout) {
            builder.header_read_timeout(read_timeout);
        }

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                handler::handle_request(req, Arc::clone(&service_state), peer_addr)
            }),
        );

        if let Err(err) = conn.await {
            // Peers closing or going quiet are routine for an origin server
            if err.is_timeout() || timeout::is_timeout(&err) {
                logger::log_debug(&format!("Connection from {peer_addr} timed out: {err}"));
            } else if err.is_incomplete_message() || err.is_canceled() {
                logger::log_debug(&format!("Connection from {peer_addr} ended early: {err}"));
            } else {
                logger::log_connection_error(&err);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_timeouts() {
        let secs = |n| Some(Duration::from_secs(n));
        let mut perf = PerformanceConfig::default();
        assert_eq!(io_timeouts(&perf), (secs(75), secs(30)));

        perf.keep_alive_timeout = 0;
        assert_eq!(io_timeouts(&perf), (secs(30), secs(30)));

        perf.read_timeout = 0;
        perf.write_timeout = 0;
        assert_eq!(io_timeouts(&perf), (None, None));
    }

    #[test]
    fn test_slot_releases_on_drop() {
        let counter = Arc::new(AtomicUsize::new(1));
        drop(ConnectionSlot(Arc::clone(&counter)));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
