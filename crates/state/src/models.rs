//! Persisted settings model

use lspkg_types::InstalledLanguageServer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// User settings persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Installed servers keyed by registry name
    #[serde(default)]
    pub installed_language_servers: BTreeMap<String, InstalledLanguageServer>,
    /// Language identifier to user-approved server binary
    #[serde(default)]
    pub lsp_binaries: BTreeMap<String, PathBuf>,
}

impl Settings {
    /// Record a successful installation, replacing any previous record
    pub fn record_installed(&mut self, server: InstalledLanguageServer) {
        self.installed_language_servers
            .insert(server.package_name.clone(), server);
    }

    pub fn remove_installed(&mut self, name: &str) -> Option<InstalledLanguageServer> {
        self.installed_language_servers.remove(name)
    }

    #[must_use]
    pub fn installed(&self, name: &str) -> Option<&InstalledLanguageServer> {
        self.installed_language_servers.get(name)
    }

    /// Flip the enabled flag; `false` when the package is not installed
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.installed_language_servers.get_mut(name) {
            Some(server) => {
                server.is_enabled = enabled;
                true
            }
            None => false,
        }
    }
}
