use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Catalog refresh and installed-server bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RegistryEvent {
    /// Catalog download began
    RefreshStarted { url: String },

    /// One download attempt failed; another may follow
    AttemptFailed {
        url: String,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },

    /// New catalog is in memory
    RefreshCompleted { url: String, packages: usize },

    /// All attempts exhausted
    RefreshFailed { url: String, failure: FailureContext },

    /// Catalog refreshed but the disk cache could not be written
    CacheSaveFailed { path: String, error: String },

    /// Catalog restored from the disk cache at start-up
    CacheLoaded { packages: usize, age_secs: u64 },

    /// An installed server was recorded after a successful install
    PackageRecorded { package: String, version: String },

    /// An installed server and its files were removed
    PackageRemoved { package: String },

    /// An installed server was enabled or disabled
    PackageToggled { package: String, enabled: bool },
}
