// Application state module
// Immutable per-process state shared by every connection

use super::types::Config;
use crate::assets::{self, FallbackRouter};
use crate::error::ConfigError;

/// Application state
///
/// Built once before the listener binds; construction fails if the asset
/// root or the fallback document is missing.
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub router: FallbackRouter,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let router = assets::build_router(&config.assets)?;
        Ok(Self { config, router })
    }

    /// Drop cached asset metadata after the asset directory was rebuilt
    pub fn invalidate_assets(&self) {
        self.router.store().invalidate();
    }
}
