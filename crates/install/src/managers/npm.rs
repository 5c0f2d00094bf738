//! npm backend

use super::{
    discard_partial_install, install_confirmation, probe_step, standard_source, PackageManager,
};
use crate::{InstallContext, InstallStep, StepConfirmation};
use lspkg_errors::{Error, PackageManagerError};
use lspkg_types::{InstallationMethod, PackageManagerType, PackageSource};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static NPM_VERSION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").ok());

/// Installs npm packages into `<install>/<entry>/node_modules`
#[derive(Debug, Clone)]
pub struct NpmPackageManager {
    install_dir: PathBuf,
}

impl NpmPackageManager {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    /// Reset the manifest and initialise a private npm project
    fn initialize(package_dir: PathBuf) -> InstallStep {
        InstallStep::new(
            "Initialize Directory Structure",
            StepConfirmation::None,
            move |ctx: InstallContext| {
                let package_dir = package_dir.clone();
                async move {
                    for stale in ["package.json", "package-lock.json"] {
                        lspkg_platform::fs::remove_if_exists(&package_dir.join(stale)).await?;
                    }

                    ctx.create_directory_structure(&package_dir).await?;
                    let init = ["npm", "init", "--yes", "--scope=lspkg"];
                    ctx.execute_in_directory(&package_dir, &init).await?;

                    let npmrc = package_dir.join(".npmrc");
                    if !lspkg_platform::fs::exists(&npmrc).await {
                        lspkg_platform::fs::write_atomic(&npmrc, b"install-strategy=shallow")
                            .await?;
                    }
                    Ok::<(), Error>(())
                }
            },
        )
    }

    fn run_install(source: &PackageSource, package_dir: PathBuf) -> InstallStep {
        let qualified = format!("{}@{}", source.pkg_name, source.version);
        let extras = source.extra_packages();

        let mut args = vec!["npm".to_string(), "install".to_string(), qualified.clone()];
        if source
            .option(lspkg_types::package::OPTION_DEV)
            .is_some_and(|dev| dev.eq_ignore_ascii_case("true"))
        {
            args.push("--save-dev".to_string());
        }
        args.extend(extras.iter().cloned());

        let mut listed = vec![qualified];
        listed.extend(extras);

        InstallStep::new(
            "Install Package Using npm",
            StepConfirmation::Required(install_confirmation("npm", &listed)),
            move |ctx: InstallContext| {
                let args = args.clone();
                let package_dir = package_dir.clone();
                async move {
                    if let Err(e) = ctx.execute_in_directory(&package_dir, &args).await {
                        discard_partial_install(&package_dir.join("node_modules")).await;
                        return Err(e);
                    }
                    Ok::<(), Error>(())
                }
            },
        )
    }

    fn verify(source: &PackageSource, package_dir: PathBuf) -> InstallStep {
        let package = source.pkg_name.clone();
        let version = source.version.clone();

        InstallStep::new(
            "Verify Installation",
            StepConfirmation::None,
            move |_ctx: InstallContext| {
                let package = package.clone();
                let version = version.clone();
                let package_dir = package_dir.clone();
                async move { verify_installation(&package_dir, &package, &version).await }
            },
        )
    }
}

/// Check the manifest records `package` at `version` and the package landed
/// in `node_modules`
pub(crate) async fn verify_installation(
    package_dir: &Path,
    package: &str,
    version: &str,
) -> Result<(), Error> {
    let manifest = package_dir.join("package.json");
    let installed = tokio::fs::read(&manifest)
        .await
        .ok()
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
        .and_then(|json| {
            ["dependencies", "devDependencies"].iter().find_map(|section| {
                json.get(section)?
                    .get(package)?
                    .as_str()
                    .map(str::to_string)
            })
        })
        .ok_or_else(|| {
            PackageManagerError::installation_failed("Package not found in package.json")
        })?;

    let strip = |v: &str| v.trim_start_matches(['^', '~']).to_string();
    let requested = strip(version);
    if strip(&installed) != requested && !installed.contains(&requested) {
        return Err(PackageManagerError::installation_failed(format!(
            "Package version mismatch: expected {version}, found {installed}"
        ))
        .into());
    }

    if !lspkg_platform::fs::exists(&package_dir.join("node_modules").join(package)).await {
        return Err(
            PackageManagerError::installation_failed("Package not found in node_modules").into(),
        );
    }
    Ok(())
}

impl PackageManager for NpmPackageManager {
    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Npm
    }

    fn install(&self, method: &InstallationMethod) -> Result<Vec<InstallStep>, Error> {
        let source = standard_source(method, PackageManagerType::Npm)?;
        let package_dir = self.install_dir.join(&source.entry_name);
        Ok(vec![
            Self::initialize(package_dir.clone()),
            Self::run_install(source, package_dir.clone()),
            Self::verify(source, package_dir),
        ])
    }

    fn is_installed(&self, _method: &InstallationMethod) -> InstallStep {
        probe_step("npm", "npm --version", |output| {
            NPM_VERSION.as_ref().is_some_and(|re| re.is_match(output))
        })
    }

    fn binary_path(&self, package: &str) -> PathBuf {
        self.install_dir
            .join(package)
            .join("node_modules")
            .join(".bin")
            .join(package)
    }
}
