//! pip backend: one virtual environment per package

use super::{
    discard_partial_install, install_confirmation, probe_step, standard_source, PackageManager,
};
use crate::{InstallContext, InstallStep, StepConfirmation};
use lspkg_errors::{Error, PackageManagerError};
use lspkg_types::{InstallationMethod, PackageManagerType, PackageSource};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PipPackageManager {
    install_dir: PathBuf,
}

impl PipPackageManager {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    fn initialize(package_dir: PathBuf) -> InstallStep {
        InstallStep::new(
            "Initialize Directory Structure",
            StepConfirmation::None,
            move |ctx: InstallContext| {
                let package_dir = package_dir.clone();
                async move {
                    ctx.create_directory_structure(&package_dir).await?;
                    ctx.execute_in_directory(&package_dir, &["python3", "-m", "venv", "venv"])
                        .await?;
                    Ok::<(), Error>(())
                }
            },
        )
    }

    fn run_install(source: &PackageSource, package_dir: PathBuf) -> InstallStep {
        let pip = package_dir.join("venv").join("bin").join("pip");
        let mut listed = vec![format!("{}=={}", source.pkg_name, source.version)];
        listed.extend(source.extra_packages());

        let mut args = vec![pip.display().to_string(), "install".to_string()];
        args.extend(listed.iter().cloned());

        InstallStep::new(
            "Install Package Using pip",
            StepConfirmation::Required(install_confirmation("pip", &listed)),
            move |ctx: InstallContext| {
                let args = args.clone();
                let package_dir = package_dir.clone();
                async move {
                    if let Err(e) = ctx.execute_in_directory(&package_dir, &args).await {
                        discard_partial_install(&package_dir.join("venv")).await;
                        return Err(e);
                    }
                    Ok::<(), Error>(())
                }
            },
        )
    }

    fn verify(source: &PackageSource, package_dir: PathBuf) -> InstallStep {
        let pip = package_dir.join("venv").join("bin").join("pip");
        let args = vec![pip.display().to_string(), "show".to_string(), source.pkg_name.clone()];
        let expected = format!("Version: {}", source.version);

        InstallStep::new(
            "Verify Installation",
            StepConfirmation::None,
            move |ctx: InstallContext| {
                let args = args.clone();
                let expected = expected.clone();
                let package_dir = package_dir.clone();
                async move {
                    let lines = ctx.execute_in_directory(&package_dir, &args).await?;
                    if lines.iter().any(|line| line.trim() == expected) {
                        Ok(())
                    } else {
                        Err(Error::from(PackageManagerError::installation_failed(format!(
                            "pip does not report {expected}"
                        ))))
                    }
                }
            },
        )
    }
}

impl PackageManager for PipPackageManager {
    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Pip
    }

    fn install(&self, method: &InstallationMethod) -> Result<Vec<InstallStep>, Error> {
        let source = standard_source(method, PackageManagerType::Pip)?;
        let package_dir = self.install_dir.join(&source.entry_name);
        Ok(vec![
            Self::initialize(package_dir.clone()),
            Self::run_install(source, package_dir.clone()),
            Self::verify(source, package_dir),
        ])
    }

    fn is_installed(&self, _method: &InstallationMethod) -> InstallStep {
        probe_step("python3", "python3 --version", |output| output.starts_with("Python 3"))
    }

    fn binary_path(&self, package: &str) -> PathBuf {
        self.install_dir
            .join(package)
            .join("venv")
            .join("bin")
            .join(package)
    }
}
