//! Error types
//!
//! `ConfigError` is fatal and only produced at startup. `ServeError` covers
//! everything that can go wrong while answering a single request and is
//! always converted into an HTTP status by the handler.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Startup configuration failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        source: std::net::AddrParseError,
    },

    #[error("asset root '{}' is not accessible: {source}", path.display())]
    AssetRootMissing { path: PathBuf, source: io::Error },

    #[error("asset root '{}' is not a directory", path.display())]
    AssetRootNotDirectory { path: PathBuf },

    #[error("fallback document '{}' does not exist under the asset root", path.display())]
    FallbackMissing { path: PathBuf },

    #[error("fallback document name '{name}' must be a plain file name inside the asset root")]
    InvalidFallbackName { name: String },
}

/// Per-request failure while resolving or reading an asset
#[derive(Debug, Error)]
pub enum ServeError {
    /// No servable file at the requested path
    #[error("asset not found")]
    NotFound,

    /// Path tried to leave the asset root (`..`, NUL, symlink escape)
    #[error("path escapes the asset root")]
    TraversalRejected,

    /// Percent-decoding produced invalid UTF-8
    #[error("malformed request path")]
    MalformedPath,

    /// Filesystem failure other than not-found
    #[error("i/o error on '{}': {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl ServeError {
    /// Classify an `io::Error` hit while looking at `path`.
    ///
    /// Missing entries and non-directory path components both mean the asset
    /// does not exist; everything else is a genuine I/O failure.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Self::NotFound,
            _ => Self::Io {
                path: path.into(),
                source,
            },
        }
    }

    /// Whether the client should see this as a plain 404
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound | Self::TraversalRejected)
    }
}
