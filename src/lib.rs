//! Static asset origin server for single-page applications.
//!
//! Serves a built client directory over HTTP/1.1. Requests for files that
//! exist get the file; requests for client-side routes get the fallback
//! document; paths escaping the asset root are never served.

pub mod assets;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
