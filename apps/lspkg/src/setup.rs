//! System setup and initialization

use crate::error::CliError;
use lspkg_config::Config;
use lspkg_errors::{Error, UserFacingError};
use lspkg_events::EventSender;
use lspkg_ops::{RegistryManager, RegistryManagerBuilder};
use lspkg_platform::fs;
use tracing::{debug, info, warn};

/// Directory creation and registry manager assembly
pub struct SystemSetup {
    config: Config,
}

impl SystemSetup {
    /// Create new system setup
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Create the install and cache directories and build the manager
    pub async fn initialize(&self, tx: EventSender) -> Result<RegistryManager, CliError> {
        info!("Initializing lspkg v{}", env!("CARGO_PKG_VERSION"));
        self.ensure_directories().await?;

        let manager = RegistryManagerBuilder::new()
            .with_config(self.config.clone())
            .with_event_sender(tx)
            .build()?;
        Ok(manager)
    }

    async fn ensure_directories(&self) -> Result<(), Error> {
        for dir in [self.config.install_dir(), self.config.cache_dir()] {
            if !fs::exists(&dir).await {
                debug!(dir = %dir.display(), "creating directory");
                fs::create_dir_all(&dir).await?;
            }
        }
        Ok(())
    }
}

/// Make sure a catalog is in memory: the cache when fresh, otherwise a
/// download. A failed download falls back to whatever cache exists.
pub async fn ensure_catalog(manager: &RegistryManager) -> Result<(), CliError> {
    match manager.refresh_if_stale().await {
        Ok(_) => Ok(()),
        Err(e) if !manager.catalog().is_empty() => {
            // Catalog is in memory; only the disk cache failed
            warn!(error = %e, "continuing without registry cache");
            Ok(())
        }
        Err(e) => {
            if manager.load_cached_catalog().await.unwrap_or(0) > 0 {
                eprintln!("Warning: {} Using the cached registry.", e.user_message());
                Ok(())
            } else {
                Err(e.into())
            }
        }
    }
}
