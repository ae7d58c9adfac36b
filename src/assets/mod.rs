//! Static asset module
//!
//! Store, path resolution and SPA fallback routing over the asset root.

pub mod cache;
pub mod fallback;
pub mod resolver;
pub mod store;

use std::sync::Arc;

use crate::config::AssetsConfig;
use crate::error::ConfigError;

pub use fallback::{FallbackRouter, Resolution};
pub use resolver::{Lookup, PathResolver};
pub use store::{AssetStore, ResolvedAsset};

/// Wire store, resolver and router together from the asset configuration
///
/// Fails if the asset root or the fallback document is missing.
pub fn build_router(config: &AssetsConfig) -> Result<FallbackRouter, ConfigError> {
    let store = Arc::new(AssetStore::open_root(&config.root, config.cache_metadata)?);
    let resolver = PathResolver::new(store, config.index_files.clone(), config.serve_dotfiles);
    FallbackRouter::new(resolver, &config.fallback_document)
}
