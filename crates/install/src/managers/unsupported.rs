//! Backends without an implementation; every method is rejected

use super::PackageManager;
use crate::InstallStep;
use lspkg_errors::{Error, PackageManagerError};
use lspkg_types::{InstallationMethod, PackageManagerType};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct UnsupportedPackageManager {
    kind: PackageManagerType,
    install_dir: PathBuf,
}

impl UnsupportedPackageManager {
    pub fn new(kind: PackageManagerType, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            install_dir: install_dir.into(),
        }
    }

    fn unsupported(&self) -> PackageManagerError {
        PackageManagerError::invalid_configuration(format!(
            "{} packages are not supported",
            self.kind.user_description()
        ))
    }
}

impl PackageManager for UnsupportedPackageManager {
    fn manager_type(&self) -> PackageManagerType {
        self.kind
    }

    fn install(&self, _method: &InstallationMethod) -> Result<Vec<InstallStep>, Error> {
        Err(self.unsupported().into())
    }

    fn is_installed(&self, _method: &InstallationMethod) -> InstallStep {
        InstallStep::failing("Check Installation Method", self.unsupported().into())
    }

    fn binary_path(&self, package: &str) -> PathBuf {
        self.install_dir.join(package).join("bin").join(package)
    }
}
