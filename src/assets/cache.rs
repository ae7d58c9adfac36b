//! File metadata cache
//!
//! Read-mostly map from canonical path to metadata. The asset directory is
//! treated as immutable, so entries only go away on an explicit `clear`.

use dashmap::DashMap;
use std::path::{Path, PathBuf};

use super::store::AssetMetadata;

#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: DashMap<PathBuf, AssetMetadata>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<AssetMetadata> {
        self.entries.get(path).map(|entry| *entry.value())
    }

    pub fn insert(&self, path: PathBuf, metadata: AssetMetadata) {
        self.entries.insert(path, metadata);
    }

    /// Drop every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
