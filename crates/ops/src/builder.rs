//! Assembly of a [`RegistryManager`] from its collaborators

use crate::RegistryManager;
use lspkg_config::Config;
use lspkg_errors::{ConfigError, Error};
use lspkg_events::EventSender;
use lspkg_net::{NetClient, NetConfig};
use lspkg_platform::{ProcessOperations, TokioProcessOperations};
use lspkg_state::{JsonSettingsStore, SettingsStore};
use std::sync::Arc;

/// Builder for [`RegistryManager`]
///
/// Only the configuration is required. The network client, shell and
/// settings store default to the real implementations derived from it.
#[derive(Default)]
pub struct RegistryManagerBuilder {
    config: Option<Config>,
    net: Option<NetClient>,
    shell: Option<Arc<dyn ProcessOperations>>,
    settings: Option<Arc<dyn SettingsStore>>,
    tx: Option<EventSender>,
}

impl RegistryManagerBuilder {
    /// Create new manager builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set network client
    #[must_use]
    pub fn with_net(mut self, net: NetClient) -> Self {
        self.net = Some(net);
        self
    }

    /// Set the shell used by install steps
    #[must_use]
    pub fn with_shell(mut self, shell: Arc<dyn ProcessOperations>) -> Self {
        self.shell = Some(shell);
        self
    }

    /// Set settings store
    #[must_use]
    pub fn with_settings_store(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Set event sender
    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Build the manager
    ///
    /// # Errors
    ///
    /// Returns an error if no configuration was given or the default network
    /// client cannot be created.
    pub fn build(self) -> Result<RegistryManager, Error> {
        let config = self.config.ok_or_else(|| ConfigError::Invalid {
            message: "registry manager requires a configuration".to_string(),
        })?;

        let net = match self.net {
            Some(net) => net,
            None => NetClient::new(NetConfig::from(&config.network))?,
        };

        let shell = self
            .shell
            .unwrap_or_else(|| Arc::new(TokioProcessOperations::new()));

        let settings = self
            .settings
            .unwrap_or_else(|| Arc::new(JsonSettingsStore::new(config.settings_file())));

        Ok(RegistryManager::from_parts(
            config, net, shell, settings, self.tx,
        ))
    }
}
