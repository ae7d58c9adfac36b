//! Fallback router
//!
//! Turns resolver misses for client-side routes into the fallback document.
//! A miss is only eligible when the last path segment has no recognized
//! static asset extension: a missing `/app.js` is a broken build and must
//! stay a 404, while `/orders/42` is a route the SPA handles itself.

use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

use super::resolver::{normalize_request_path, Lookup, PathResolver};
use super::store::{AssetStore, ResolvedAsset};
use crate::error::{ConfigError, ServeError};
use crate::http::cache::CachePolicy;
use crate::http::mime;
use crate::logger;

/// Outcome of routing a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path named an existing asset
    Hit(ResolvedAsset),
    /// The path missed and the fallback document stands in
    Fallback(ResolvedAsset),
    /// The path named a directory without its trailing slash; holds the
    /// path to redirect to
    Redirect(String),
}

impl Resolution {
    pub const fn asset(&self) -> Option<&ResolvedAsset> {
        match self {
            Self::Hit(asset) | Self::Fallback(asset) => Some(asset),
            Self::Redirect(_) => None,
        }
    }

    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Redirect target for a directory requested without its trailing slash
///
/// Leading slashes are collapsed so `//host` can never become a
/// protocol-relative redirect to another site.
pub fn directory_location(raw_path: &str) -> String {
    format!("/{}/", raw_path.trim_start_matches('/'))
}

/// Whether a request path looks like a request for a static file
pub fn has_static_extension(raw_path: &str) -> bool {
    percent_decode_str(raw_path)
        .decode_utf8_lossy()
        .rsplit('/')
        .next()
        .and_then(|segment| Path::new(segment).extension())
        .and_then(|ext| ext.to_str())
        .is_some_and(mime::is_known_extension)
}

#[derive(Debug)]
pub struct FallbackRouter {
    resolver: PathResolver,
    /// Fallback document, relative to the root
    fallback: PathBuf,
    /// Canonical location of the fallback document, checked at startup
    fallback_canonical: PathBuf,
}

impl FallbackRouter {
    /// Build the router, failing fast if the fallback document is missing
    pub fn new(resolver: PathResolver, fallback_name: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidFallbackName {
            name: fallback_name.to_string(),
        };
        let fallback = normalize_request_path(fallback_name).map_err(|_| invalid())?;
        if fallback.as_os_str().is_empty() {
            return Err(invalid());
        }

        let root = resolver.store().root();
        let missing = || ConfigError::FallbackMissing {
            path: root.join(&fallback),
        };
        let fallback_canonical = std::fs::canonicalize(root.join(&fallback)).map_err(|_| missing())?;
        if !fallback_canonical.starts_with(root) || !fallback_canonical.is_file() {
            return Err(missing());
        }

        Ok(Self {
            resolver,
            fallback,
            fallback_canonical,
        })
    }

    pub fn store(&self) -> &AssetStore {
        self.resolver.store()
    }

    /// Route a raw request path: hit, redirect, fallback, or an error
    ///
    /// `NotFound` means a genuine 404. `TraversalRejected` is never turned
    /// into a fallback so hostile paths cannot get a 200.
    pub async fn route(&self, raw_path: &str) -> Result<Resolution, ServeError> {
        match self.resolver.resolve(raw_path).await {
            Ok(Lookup::File(asset)) => Ok(Resolution::Hit(asset)),
            Ok(Lookup::Directory) => Ok(Resolution::Redirect(directory_location(raw_path))),
            Err(ServeError::NotFound) if !has_static_extension(raw_path) => {
                logger::log_debug(&format!("Serving fallback document for {raw_path}"));
                match self.resolver.resolve_relative(&self.fallback).await {
                    Ok(asset) => Ok(Resolution::Fallback(asset)),
                    Err(ServeError::NotFound) => {
                        logger::log_error("Fallback document disappeared from the asset root");
                        Err(ServeError::NotFound)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Cache policy for a routed asset
    ///
    /// The fallback document must be revalidated on every load so clients
    /// pick up new deployments, whichever URL it was served under.
    pub fn cache_policy(&self, resolution: &Resolution, max_age: u32) -> CachePolicy {
        let is_document = resolution
            .asset()
            .is_some_and(|asset| asset.path == self.fallback_canonical);
        if resolution.is_fallback() || is_document {
            CachePolicy::NoCache
        } else {
            CachePolicy::Public(max_age)
        }
    }
}
