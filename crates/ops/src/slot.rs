//! Single-flight install slot

use lspkg_errors::{Error, RegistryError};
use lspkg_install::InstallOperation;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Holds the one operation allowed to run at a time.
///
/// `claim` and `release` are the only ways the slot changes hands.
#[derive(Debug, Default)]
pub struct InstallSlot {
    current: Mutex<Option<InstallOperation>>,
}

impl InstallSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<InstallOperation>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the slot for `operation`
    ///
    /// # Errors
    ///
    /// Returns `InstallationRunning` if another operation holds the slot.
    pub fn claim(&self, operation: &InstallOperation) -> Result<(), Error> {
        let mut current = self.lock();
        if current.is_some() {
            return Err(RegistryError::InstallationRunning.into());
        }
        *current = Some(operation.clone());
        Ok(())
    }

    /// Empty the slot if `operation` still holds it; returns whether it did
    pub fn release(&self, operation: &InstallOperation) -> bool {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|held| held.is_same(operation)) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// Empty the slot unconditionally, handing back the holder
    pub fn release_any(&self) -> Option<InstallOperation> {
        self.lock().take()
    }

    #[must_use]
    pub fn current(&self) -> Option<InstallOperation> {
        self.lock().clone()
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.lock().is_some()
    }
}
