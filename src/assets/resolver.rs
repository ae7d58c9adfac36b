//! Path resolver
//!
//! Maps a request path onto a file under the asset root. Every step that
//! could let a hostile path escape the root is checked on each request:
//! decoding, lexical normalization, and a final canonical containment check
//! that also catches symlinks pointing outside the root.

use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::store::{AssetStore, EntryKind, ResolvedAsset};
use crate::error::ServeError;

/// Decode and normalize a raw request path into a path relative to the root
///
/// `.` segments and empty segments are dropped, `..` pops the previous
/// segment. Climbing above the root, NUL bytes and backslashes are rejected.
pub fn normalize_request_path(raw: &str) -> Result<PathBuf, ServeError> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| ServeError::MalformedPath)?;

    if decoded.contains('\0') {
        return Err(ServeError::TraversalRejected);
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ServeError::TraversalRejected);
                }
            }
            s if s.contains('\\') => return Err(ServeError::TraversalRejected),
            s => segments.push(s),
        }
    }

    Ok(segments.iter().collect())
}

fn is_hidden(relative: &Path) -> bool {
    relative
        .iter()
        .any(|segment| segment.to_str().is_some_and(|s| s.starts_with('.')))
}

/// What a request path names under the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    File(ResolvedAsset),
    /// A directory requested without its trailing slash
    Directory,
}

#[derive(Debug)]
pub struct PathResolver {
    store: Arc<AssetStore>,
    index_files: Vec<String>,
    serve_dotfiles: bool,
}

impl PathResolver {
    pub const fn new(store: Arc<AssetStore>, index_files: Vec<String>, serve_dotfiles: bool) -> Self {
        Self {
            store,
            index_files,
            serve_dotfiles,
        }
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Resolve a raw (still percent-encoded) request path
    ///
    /// A directory is only served through its index file when the path ends
    /// in `/`; otherwise the caller is told to redirect.
    pub async fn resolve(&self, raw_path: &str) -> Result<Lookup, ServeError> {
        let relative = normalize_request_path(raw_path)?;
        if !self.serve_dotfiles && is_hidden(&relative) {
            return Err(ServeError::NotFound);
        }

        let (canonical, kind) = self.entry(&relative).await?;
        match kind {
            EntryKind::File => self.store.asset(&canonical).await.map(Lookup::File),
            EntryKind::Dir if raw_path.ends_with('/') => {
                self.resolve_index(&canonical).await.map(Lookup::File)
            }
            EntryKind::Dir => Ok(Lookup::Directory),
            EntryKind::Other => Err(ServeError::NotFound),
        }
    }

    /// Resolve an already normalized path relative to the root
    pub async fn resolve_relative(&self, relative: &Path) -> Result<ResolvedAsset, ServeError> {
        let (canonical, kind) = self.entry(relative).await?;
        match kind {
            EntryKind::File => self.store.asset(&canonical).await,
            EntryKind::Dir => self.resolve_index(&canonical).await,
            EntryKind::Other => Err(ServeError::NotFound),
        }
    }

    async fn entry(&self, relative: &Path) -> Result<(PathBuf, EntryKind), ServeError> {
        let canonical = self.contained(&self.store.root().join(relative)).await?;
        let meta = self.store.metadata(&canonical).await?;
        Ok((canonical, meta.kind))
    }

    /// Try each configured index file inside a directory
    async fn resolve_index(&self, dir: &Path) -> Result<ResolvedAsset, ServeError> {
        for index in &self.index_files {
            let canonical = match self.contained(&dir.join(index)).await {
                Ok(path) => path,
                Err(ServeError::NotFound) => continue,
                Err(e) => return Err(e),
            };
            match self.store.asset(&canonical).await {
                Ok(asset) => return Ok(asset),
                Err(ServeError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Err(ServeError::NotFound)
    }

    /// Canonicalize `candidate` and make sure it is still under the root
    async fn contained(&self, candidate: &Path) -> Result<PathBuf, ServeError> {
        let canonical = self.store.canonicalize(candidate).await?;
        if canonical.starts_with(self.store.root()) {
            Ok(canonical)
        } else {
            Err(ServeError::TraversalRejected)
        }
    }
}
