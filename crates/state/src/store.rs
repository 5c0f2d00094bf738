//! Settings storage backends

use crate::Settings;
use async_trait::async_trait;
use lspkg_errors::{Error, StorageError};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Load and save [`Settings`]. Callers re-read before every mutation so a
/// save never clobbers changes made elsewhere in the meantime.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current settings; a store with nothing saved yields the defaults
    async fn load(&self) -> Result<Settings, Error>;

    async fn save(&self, settings: &Settings) -> Result<(), Error>;
}

/// Re-read settings, apply `mutate` and save the result
///
/// # Errors
///
/// Returns an error if loading or saving fails.
pub async fn update_settings<R>(
    store: &dyn SettingsStore,
    mutate: impl FnOnce(&mut Settings) -> R + Send,
) -> Result<R, Error> {
    let mut settings = store.load().await?;
    let result = mutate(&mut settings);
    store.save(&settings).await?;
    Ok(result)
}

/// Settings kept in a JSON file
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn load(&self) -> Result<Settings, Error> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(e) => return Err(StorageError::from_io_with_path(&e, &self.path).into()),
        };

        serde_json::from_slice(&content).map_err(|e| {
            StorageError::CorruptedData {
                message: format!("{}: {e}", self.path.display()),
            }
            .into()
        })
    }

    async fn save(&self, settings: &Settings) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(settings)?;
        lspkg_platform::fs::write_atomic(&self.path, &json).await?;
        tracing::debug!(path = %self.path.display(), "saved settings");
        Ok(())
    }
}

/// Settings held in memory, for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Settings>,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Settings, Error> {
        Ok(self.settings.lock().await.clone())
    }

    async fn save(&self, settings: &Settings) -> Result<(), Error> {
        settings.clone_into(&mut *self.settings.lock().await);
        Ok(())
    }
}
