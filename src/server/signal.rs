// Signal handling module
//
// Supported signals:
// - SIGHUP:  Asset directory rebuilt, drop cached metadata
// - SIGTERM: Shutdown
// - SIGINT:  Shutdown (Ctrl+C)

use std::sync::Arc;
use tokio::sync::Notify;

use crate::config::AppState;
use crate::logger;

/// Start signal handlers (Unix)
///
/// Handlers are registered before this returns, then a background task
/// waits on them. `shutdown` is notified with a stored permit, so the accept
/// loop sees it even if it is not waiting at that instant.
#[cfg(unix)]
pub fn start_signal_handler(state: Arc<AppState>, shutdown: Arc<Notify>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sighup, mut sigterm, mut sigint) = match (
        signal(SignalKind::hangup()),
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(hup), Ok(term), Ok(int)) => (hup, term, int),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            logger::log_error(&format!("Failed to register signal handlers: {e}"));
            return;
        }
    };

    tokio::spawn(async move {
        logger::log_debug(&format!(
            "Signal handlers registered for process {}",
            std::process::id()
        ));

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    logger::log_info("SIGHUP received, invalidating asset metadata");
                    state.invalidate_assets();
                }

                _ = sigterm.recv() => {
                    logger::log_info("SIGTERM received, shutting down");
                    shutdown.notify_one();
                    break;
                }

                _ = sigint.recv() => {
                    logger::log_info("SIGINT received, shutting down");
                    shutdown.notify_one();
                    break;
                }
            }
        }
    });
}

/// Non-Unix fallback, only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(_state: Arc<AppState>, shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_info("Ctrl+C received, shutting down");
            shutdown.notify_one();
        }
    });
}
