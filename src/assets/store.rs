//! Asset store
//!
//! Read-only view over the directory tree produced by the client build.
//! Every path handed out by the store is canonical.

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::{self, File};

use super::cache::MetadataCache;
use crate::error::{ConfigError, ServeError};
use crate::http::mime;
use crate::logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

/// Subset of filesystem metadata the server cares about
#[derive(Debug, Clone, Copy)]
pub struct AssetMetadata {
    pub kind: EntryKind,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl From<&std::fs::Metadata> for AssetMetadata {
    fn from(meta: &std::fs::Metadata) -> Self {
        let kind = if meta.is_file() {
            EntryKind::File
        } else if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::Other
        };
        Self {
            kind,
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }
}

/// An existing regular file under the asset root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// Canonical absolute path
    pub path: PathBuf,
    /// Size in bytes
    pub len: u64,
    /// Content-Type derived from the extension
    pub content_type: &'static str,
    pub modified: Option<SystemTime>,
}

impl ResolvedAsset {
    fn new(path: PathBuf, meta: AssetMetadata) -> Self {
        let content_type = mime::get_content_type(path.extension().and_then(|e| e.to_str()));
        Self {
            path,
            len: meta.len,
            content_type,
            modified: meta.modified,
        }
    }
}

#[derive(Debug)]
pub struct AssetStore {
    root: PathBuf,
    cache: Option<MetadataCache>,
}

impl AssetStore {
    /// Open the asset root, failing if it is missing or not a directory
    pub fn open_root(root: &Path, cache_metadata: bool) -> Result<Self, ConfigError> {
        let canonical = std::fs::canonicalize(root).map_err(|source| {
            ConfigError::AssetRootMissing {
                path: root.to_path_buf(),
                source,
            }
        })?;
        if !canonical.is_dir() {
            return Err(ConfigError::AssetRootNotDirectory { path: canonical });
        }

        Ok(Self {
            root: canonical,
            cache: cache_metadata.then(MetadataCache::new),
        })
    }

    /// Canonical asset root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve symlinks and relative components of `path`
    pub async fn canonicalize(&self, path: &Path) -> Result<PathBuf, ServeError> {
        fs::canonicalize(path)
            .await
            .map_err(|e| ServeError::from_io(path, e))
    }

    /// Metadata for a canonical path, served from the cache when enabled
    pub async fn metadata(&self, path: &Path) -> Result<AssetMetadata, ServeError> {
        if let Some(meta) = self.cache.as_ref().and_then(|c| c.get(path)) {
            return Ok(meta);
        }

        let meta = fs::metadata(path)
            .await
            .map(|m| AssetMetadata::from(&m))
            .map_err(|e| ServeError::from_io(path, e))?;

        if let Some(cache) = &self.cache {
            cache.insert(path.to_path_buf(), meta);
        }
        Ok(meta)
    }

    /// Look up a canonical path that must be a regular file
    pub async fn asset(&self, path: &Path) -> Result<ResolvedAsset, ServeError> {
        let meta = self.metadata(path).await?;
        match meta.kind {
            EntryKind::File => Ok(ResolvedAsset::new(path.to_path_buf(), meta)),
            EntryKind::Dir | EntryKind::Other => Err(ServeError::NotFound),
        }
    }

    /// Open an asset for streaming
    ///
    /// The returned handle is owned by the caller and closed when dropped.
    pub async fn open(&self, asset: &ResolvedAsset) -> Result<File, ServeError> {
        File::open(&asset.path)
            .await
            .map_err(|e| ServeError::from_io(&asset.path, e))
    }

    /// Forget all cached metadata
    pub fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            let removed = cache.clear();
            logger::log_info(&format!("Metadata cache cleared ({removed} entries)"));
        }
    }

    #[cfg(test)]
    pub fn cached_entries(&self) -> usize {
        self.cache.as_ref().map_or(0, MetadataCache::len)
    }
}
