//! Package manager backends
//!
//! Each backend turns the installation methods it accepts into an ordered
//! list of [`InstallStep`]s and rejects every other method with
//! `InvalidConfiguration`.

mod cargo;
mod github;
mod golang;
mod npm;
mod pip;
mod unsupported;

pub use cargo::CargoPackageManager;
pub use github::GithubPackageManager;
pub use golang::GolangPackageManager;
pub use npm::NpmPackageManager;
pub use pip::PipPackageManager;
pub use unsupported::UnsupportedPackageManager;

use crate::{InstallContext, InstallStep, StepConfirmation};
use lspkg_errors::{Error, PackageManagerError};
use lspkg_net::NetClient;
use lspkg_types::{InstallationMethod, PackageManagerType, PackageSource};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Per-attempt timeout for release asset downloads
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// A backend able to install packages of one kind
pub trait PackageManager: Send + Sync {
    fn manager_type(&self) -> PackageManagerType;

    /// Ordered steps installing `method`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the backend does not accept
    /// `method` or required metadata is missing.
    fn install(&self, method: &InstallationMethod) -> Result<Vec<InstallStep>, Error>;

    /// Step verifying the backend's tool is available; may be a no-op
    fn is_installed(&self, method: &InstallationMethod) -> InstallStep;

    /// Path of the executable for an installed package
    fn binary_path(&self, package: &str) -> PathBuf;
}

/// Shared backend settings
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Root under which every package gets `<entry_name>/`
    pub install_dir: PathBuf,
    pub net: NetClient,
    pub download_timeout: Duration,
}

impl ManagerConfig {
    #[must_use]
    pub fn new(install_dir: impl Into<PathBuf>, net: NetClient) -> Self {
        Self {
            install_dir: install_dir.into(),
            net,
            download_timeout: DOWNLOAD_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Directory a package is installed into
    #[must_use]
    pub fn package_dir(&self, entry_name: &str) -> PathBuf {
        self.install_dir.join(entry_name)
    }
}

/// Whether `name` is a single plain path segment, so that joining it onto
/// the install root cannot name the root itself or anything outside it
#[must_use]
pub fn is_valid_entry_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Backend for a manager type
#[must_use]
pub fn manager_for(kind: PackageManagerType, config: &ManagerConfig) -> Arc<dyn PackageManager> {
    match kind {
        PackageManagerType::Npm => Arc::new(NpmPackageManager::new(config.install_dir.clone())),
        PackageManagerType::Cargo => Arc::new(CargoPackageManager::new(config.install_dir.clone())),
        PackageManagerType::Pip => Arc::new(PipPackageManager::new(config.install_dir.clone())),
        PackageManagerType::Golang => {
            Arc::new(GolangPackageManager::new(config.install_dir.clone()))
        }
        PackageManagerType::Github | PackageManagerType::SourceBuild => {
            Arc::new(GithubPackageManager::new(config.clone()))
        }
        PackageManagerType::Gem
        | PackageManagerType::Nuget
        | PackageManagerType::Opam
        | PackageManagerType::Composer => Arc::new(UnsupportedPackageManager::new(
            kind,
            config.install_dir.clone(),
        )),
    }
}

/// Source of a `StandardPackage` installed by `kind`
fn standard_source<'a>(
    method: &'a InstallationMethod,
    kind: PackageManagerType,
) -> Result<&'a PackageSource, Error> {
    match method {
        InstallationMethod::StandardPackage { source } if source.manager == kind => Ok(source),
        _ => Err(PackageManagerError::invalid_configuration(format!(
            "{kind} cannot install this package"
        ))
        .into()),
    }
}

/// Remove what a failed install command left behind at `path`. A cleanup
/// failure is logged; the command's error is what the caller reports.
async fn discard_partial_install(path: &Path) {
    if let Err(e) = lspkg_platform::fs::remove_if_exists(path).await {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to clean up after install failure"
        );
    }
}

/// Create the package directory
fn initialize_directory_step(package_dir: PathBuf) -> InstallStep {
    InstallStep::new(
        "Initialize Directory Structure",
        StepConfirmation::None,
        move |ctx: InstallContext| {
            let package_dir = package_dir.clone();
            async move { ctx.create_directory_structure(&package_dir).await }
        },
    )
}

/// Prerequisite probe: run `command` and require `accept` to hold for the
/// trimmed output, otherwise `NotInstalled { manager: tool }`
fn probe_step(
    tool: &'static str,
    command: &'static str,
    accept: fn(&str) -> bool,
) -> InstallStep {
    let message =
        format!("This package requires {tool} to install. Allow lspkg to run {tool} commands?");
    InstallStep::new(
        format!("Check {tool} Installation"),
        StepConfirmation::Required(message),
        move |ctx: InstallContext| async move {
            let not_installed = || {
                Error::from(PackageManagerError::NotInstalled {
                    manager: tool.to_string(),
                })
            };
            let lines = ctx.run_command(command).await.map_err(|e| {
                tracing::debug!(tool, error = %e, "prerequisite probe failed");
                not_installed()
            })?;
            let output: String = lines.iter().map(|l| l.trim()).collect();
            if accept(&output) {
                Ok(())
            } else {
                Err(not_installed())
            }
        },
    )
}

/// Human readable package list with an Oxford comma
fn describe_packages(packages: &[String]) -> String {
    match packages {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{}, and {last}", rest.join(", ")),
    }
}

/// Confirmation text for installing `packages` with `tool`
fn install_confirmation(tool: &str, packages: &[String]) -> String {
    let (plural, object) = if packages.len() > 1 {
        ("s", "these packages")
    } else {
        ("", "this package")
    };
    format!(
        "This requires the {tool} package{plural} {}. Allow lspkg to install {object}?",
        describe_packages(packages)
    )
}
