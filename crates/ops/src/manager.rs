//! Registry catalog, install slot and installed-server bookkeeping

use crate::InstallSlot;
use lspkg_config::Config;
use lspkg_errors::{Error, PackageManagerError, RegistryError, StorageError};
use lspkg_events::{AppEvent, EventEmitter, EventSender, FailureContext, RegistryEvent};
use lspkg_index::{Catalog, RegistryCache, RegistryItem};
use lspkg_install::{
    installation_steps, is_valid_entry_name, manager_for, InstallOperation, ManagerConfig,
    PackageManager, RunningState,
};
use lspkg_net::{fetch_bytes, with_retry, NetClient, RetryConfig};
use lspkg_platform::{fs, ProcessOperations};
use lspkg_state::{update_settings, SettingsStore};
use lspkg_types::InstalledLanguageServer;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Coordinates the registry catalog with installations.
///
/// At most one [`InstallOperation`] runs at a time; a successful one is
/// recorded in the settings store.
pub struct RegistryManager {
    config: Config,
    net: NetClient,
    shell: Arc<dyn ProcessOperations>,
    settings: Arc<dyn SettingsStore>,
    tx: Option<EventSender>,
    cache: RegistryCache,
    managers: ManagerConfig,
    catalog: RwLock<Arc<Catalog>>,
    downloading: AtomicBool,
    slot: Arc<InstallSlot>,
}

impl EventEmitter for RegistryManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

/// Clears the downloading flag however the refresh ends
struct DownloadingGuard<'a>(&'a AtomicBool);

impl<'a> DownloadingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for DownloadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RegistryManager {
    pub(crate) fn from_parts(
        config: Config,
        net: NetClient,
        shell: Arc<dyn ProcessOperations>,
        settings: Arc<dyn SettingsStore>,
        tx: Option<EventSender>,
    ) -> Self {
        let cache = RegistryCache::new(config.cache_dir());
        let managers = ManagerConfig::new(config.install_dir(), net.clone())
            .with_download_timeout(config.network.timeout());
        Self {
            config,
            net,
            shell,
            settings,
            tx,
            cache,
            managers,
            catalog: RwLock::new(Arc::new(Catalog::default())),
            downloading: AtomicBool::new(false),
            slot: Arc::new(InstallSlot::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current in-memory catalog
    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn replace_catalog(&self, catalog: Arc<Catalog>) {
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = catalog;
    }

    #[must_use]
    pub fn registry_items(&self) -> Vec<RegistryItem> {
        self.catalog().items().to_vec()
    }

    #[must_use]
    pub fn item(&self, name: &str) -> Option<RegistryItem> {
        self.catalog().get(name).cloned()
    }

    #[must_use]
    pub fn search(&self, query: &str) -> Vec<RegistryItem> {
        self.catalog().search(query).into_iter().cloned().collect()
    }

    #[must_use]
    pub fn is_downloading_registry(&self) -> bool {
        self.downloading.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_installing(&self) -> bool {
        self.slot.is_held()
    }

    #[must_use]
    pub fn running_install(&self) -> Option<InstallOperation> {
        self.slot.current()
    }

    /// Restore the catalog from the disk cache; returns the package count,
    /// zero when nothing is cached
    ///
    /// # Errors
    ///
    /// Returns an error if a cache exists but cannot be parsed.
    pub async fn load_cached_catalog(&self) -> Result<usize, Error> {
        let catalog = match self.cache.load().await {
            Ok(catalog) => catalog,
            Err(Error::Storage(StorageError::PathNotFound { path })) => {
                debug!(%path, "no cached registry catalog");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };

        let packages = catalog.len();
        let age_secs = self
            .cache
            .age()
            .await
            .ok()
            .flatten()
            .map_or(0, |age| age.as_secs());
        self.replace_catalog(Arc::new(catalog));
        debug!(packages, age_secs, "loaded cached registry catalog");
        self.emit(AppEvent::Registry(RegistryEvent::CacheLoaded {
            packages,
            age_secs,
        }));
        Ok(packages)
    }

    /// Download the catalog, retrying with backoff, and cache it on disk.
    /// Returns the package count.
    ///
    /// # Errors
    ///
    /// `MaxRetriesExceeded` once every attempt failed, `InvalidCatalog` for
    /// an unparsable payload, and `FailedToSaveRegistryCache` when the new
    /// catalog is in memory but could not be written to disk.
    pub async fn refresh_registry_catalog(&self) -> Result<usize, Error> {
        let _downloading = DownloadingGuard::set(&self.downloading);
        let url = self.config.registry.url.clone();
        let retry = RetryConfig::from(&self.config.network);
        let max_attempts = retry.max_attempts;

        info!(%url, "refreshing registry catalog");
        self.emit(AppEvent::Registry(RegistryEvent::RefreshStarted { url: url.clone() }));

        let net = &self.net;
        let fetched = with_retry(
            &retry,
            |attempt| {
                let url = url.clone();
                async move {
                    debug!(%url, attempt, "fetching registry catalog");
                    fetch_bytes(net, &url).await.map_err(|e| {
                        Error::from(RegistryError::DownloadFailed {
                            url: url.clone(),
                            cause: e.to_string(),
                        })
                    })
                }
            },
            |attempt, err| {
                warn!(
                    %url,
                    attempt,
                    max_attempts,
                    error = %err,
                    "registry download attempt failed"
                );
                self.emit(AppEvent::Registry(RegistryEvent::AttemptFailed {
                    url: url.clone(),
                    attempt,
                    max_attempts,
                    error: err.to_string(),
                }));
            },
        )
        .await;

        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                let last_error = match &e {
                    Error::Registry(RegistryError::DownloadFailed { cause, .. }) => cause.clone(),
                    other => other.to_string(),
                };
                let err = Error::from(RegistryError::MaxRetriesExceeded {
                    url: url.clone(),
                    last_error,
                });
                self.emit(AppEvent::Registry(RegistryEvent::RefreshFailed {
                    url,
                    failure: FailureContext::from_error(&err),
                }));
                return Err(err);
            }
        };

        let catalog = match Catalog::from_bytes(&bytes) {
            Ok(catalog) => Arc::new(catalog),
            Err(err) => {
                self.emit(AppEvent::Registry(RegistryEvent::RefreshFailed {
                    url,
                    failure: FailureContext::from_error(&err),
                }));
                return Err(err);
            }
        };

        let packages = catalog.len();
        self.replace_catalog(Arc::clone(&catalog));
        info!(packages, "registry catalog refreshed");
        self.emit(AppEvent::Registry(RegistryEvent::RefreshCompleted {
            url,
            packages,
        }));

        if let Err(e) = self.cache.save(&catalog).await {
            let path = self.cache.catalog_path().display().to_string();
            warn!(%path, error = %e, "failed to save registry cache");
            self.emit(AppEvent::Registry(RegistryEvent::CacheSaveFailed {
                path,
                error: e.to_string(),
            }));
            return Err(RegistryError::FailedToSaveRegistryCache {
                message: e.to_string(),
            }
            .into());
        }

        Ok(packages)
    }

    /// Refresh when the cache is missing or older than the configured
    /// maximum age, otherwise load it if nothing is in memory yet.
    /// Returns whether a download happened.
    ///
    /// # Errors
    ///
    /// See [`Self::refresh_registry_catalog`] and [`Self::load_cached_catalog`].
    pub async fn refresh_if_stale(&self) -> Result<bool, Error> {
        if self.cache.is_stale(self.config.registry.max_age()).await? {
            self.refresh_registry_catalog().await?;
            return Ok(true);
        }
        if self.catalog().is_empty() {
            self.load_cached_catalog().await?;
        }
        Ok(false)
    }

    /// Plan the installation of `item` without starting it
    ///
    /// # Errors
    ///
    /// `InstallationRunning` while another install holds the slot, and
    /// `InvalidConfiguration` when the item has no supported method.
    pub fn install_operation(&self, item: &RegistryItem) -> Result<InstallOperation, Error> {
        if self.slot.is_held() {
            return Err(RegistryError::InstallationRunning.into());
        }

        let method = item.install_method();
        let kind = method.package_manager_type().ok_or_else(|| {
            PackageManagerError::invalid_configuration(format!(
                "no supported installation method for {}",
                item.name
            ))
        })?;

        let manager = manager_for(kind, &self.managers);
        let steps = installation_steps(manager.as_ref(), &method)?;
        debug!(package = %item.name, manager = %kind, steps = steps.len(), "planned installation");

        Ok(InstallOperation::with_event_sender(
            item.clone(),
            steps,
            Arc::clone(&self.shell),
            self.tx.clone(),
        ))
    }

    /// Claim the install slot and run `operation` in the background.
    ///
    /// The returned handle yields the operation's outcome. The slot is
    /// released however the operation ends; only a completed operation is
    /// recorded.
    ///
    /// # Errors
    ///
    /// Returns `InstallationRunning` if the slot is held.
    pub fn start_installation(
        &self,
        operation: InstallOperation,
    ) -> Result<JoinHandle<Result<(), Error>>, Error> {
        self.slot.claim(&operation)?;
        info!(package = %operation.package().name, "starting installation");

        let slot = Arc::clone(&self.slot);
        let settings = Arc::clone(&self.settings);
        let tx = self.tx.clone();
        Ok(tokio::spawn(async move {
            let result = drive(&operation, settings.as_ref(), tx.as_ref()).await;
            slot.release(&operation);
            if let Err(e) = &result {
                let package = &operation.package().name;
                debug!(%package, error = %e, "installation ended without success");
            }
            result
        }))
    }

    /// Cancel the running installation, if any; returns whether one was
    /// running
    pub fn cancel_installation(&self) -> bool {
        match self.slot.release_any() {
            Some(operation) => {
                info!(package = %operation.package().name, "cancelling installation");
                operation.cancel();
                true
            }
            None => false,
        }
    }

    /// Delete an installed server's files and its record
    ///
    /// # Errors
    ///
    /// `PackageNotFound` for names that are not a single directory under the
    /// install root. Otherwise an error if the directory exists but cannot
    /// be removed or the settings cannot be saved.
    pub async fn remove_language_server(&self, name: &str) -> Result<(), Error> {
        if !is_valid_entry_name(name) {
            return Err(RegistryError::PackageNotFound {
                name: name.to_string(),
            }
            .into());
        }
        let dir = self.config.install_dir().join(name);
        if fs::exists(&dir).await {
            fs::remove_if_exists(&dir).await?;
            info!(package = name, dir = %dir.display(), "removed language server files");
        } else {
            debug!(package = name, "language server files already removed");
        }

        update_settings(self.settings.as_ref(), |settings| {
            settings.remove_installed(name)
        })
        .await?;

        self.emit(AppEvent::Registry(RegistryEvent::PackageRemoved {
            package: name.to_string(),
        }));
        Ok(())
    }

    /// Enable or disable an installed server without touching its files
    ///
    /// # Errors
    ///
    /// Returns `PackageNotFound` if the server is not installed.
    pub async fn set_package_enabled(&self, name: &str, enabled: bool) -> Result<(), Error> {
        let found = update_settings(self.settings.as_ref(), |settings| {
            settings.set_enabled(name, enabled)
        })
        .await?;
        if !found {
            return Err(RegistryError::PackageNotFound {
                name: name.to_string(),
            }
            .into());
        }

        self.emit(AppEvent::Registry(RegistryEvent::PackageToggled {
            package: name.to_string(),
            enabled,
        }));
        Ok(())
    }

    /// Installed servers, sorted by name
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be read.
    pub async fn installed_language_servers(
        &self,
    ) -> Result<Vec<InstalledLanguageServer>, Error> {
        let settings = self.settings.load().await?;
        Ok(settings.installed_language_servers.into_values().collect())
    }

    /// Where the backend for `name` puts its executable
    ///
    /// # Errors
    ///
    /// `PackageNotFound` for names missing from the catalog and
    /// `InvalidConfiguration` when the item has no supported method.
    pub fn binary_path(&self, name: &str) -> Result<PathBuf, Error> {
        let item = self
            .item(name)
            .filter(|item| is_valid_entry_name(&item.name))
            .ok_or_else(|| RegistryError::PackageNotFound {
                name: name.to_string(),
            })?;
        let kind = item
            .install_method()
            .package_manager_type()
            .ok_or_else(|| {
                PackageManagerError::invalid_configuration(format!(
                    "no supported installation method for {name}"
                ))
            })?;
        Ok(manager_for(kind, &self.managers).binary_path(&item.name))
    }

    /// Remember a user-approved server binary for `language`
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be saved.
    pub async fn set_binary_override(&self, language: &str, path: PathBuf) -> Result<(), Error> {
        update_settings(self.settings.as_ref(), |settings| {
            settings.lsp_binaries.insert(language.to_string(), path);
        })
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the settings cannot be read.
    pub async fn binary_override(&self, language: &str) -> Result<Option<PathBuf>, Error> {
        Ok(self.settings.load().await?.lsp_binaries.get(language).cloned())
    }
}

/// Run the operation and record it once complete.
///
/// Any previous record of the package is dropped before the first step
/// runs; only a completed, uncancelled run records it again.
async fn drive(
    operation: &InstallOperation,
    settings: &dyn SettingsStore,
    tx: Option<&EventSender>,
) -> Result<(), Error> {
    let package = operation.package().name.clone();
    let previous = update_settings(settings, |settings| settings.remove_installed(&package)).await?;
    if let Some(previous) = previous {
        info!(%package, version = %previous.version, "reinstalling; dropped previous record");
    }

    operation.run().await?;
    if operation.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if operation.running_state() != RunningState::Complete {
        return Ok(());
    }

    let version = operation.version();
    let record = InstalledLanguageServer::new(package.clone(), version.clone());
    update_settings(settings, move |settings| settings.record_installed(record)).await?;

    info!(%package, %version, "recorded installed language server");
    if let Some(tx) = tx {
        tx.emit(AppEvent::Registry(RegistryEvent::PackageRecorded { package, version }));
    }
    Ok(())
}
