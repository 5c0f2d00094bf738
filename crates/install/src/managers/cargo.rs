//! cargo backend

use super::{
    discard_partial_install, initialize_directory_step, install_confirmation, probe_step,
    standard_source, PackageManager,
};
use crate::{InstallContext, InstallStep, StepConfirmation};
use lspkg_errors::{Error, PackageManagerError};
use lspkg_types::{InstallationMethod, PackageManagerType, PackageSource};
use std::path::PathBuf;

/// Installs crates with `cargo install --root <install>/<entry>`
#[derive(Debug, Clone)]
pub struct CargoPackageManager {
    install_dir: PathBuf,
}

impl CargoPackageManager {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    /// `cargo install` arguments for `source` rooted at `package_dir`
    fn install_args(source: &PackageSource, package_dir: &std::path::Path) -> Vec<String> {
        let mut args: Vec<String> = ["cargo", "install", "--root"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(package_dir.display().to_string());

        match &source.repository_url {
            Some(repository) => {
                let pin = if source.option("rev").is_some_and(|rev| rev == "true") {
                    "--rev"
                } else {
                    "--tag"
                };
                args.extend(["--git".to_string(), repository.clone(), pin.to_string()]);
                args.push(source.version.clone());
            }
            None => {
                args.extend(["--version".to_string(), source.version.clone()]);
            }
        }
        if let Some(features) = source.option("features") {
            args.extend(["--features".to_string(), features.to_string()]);
        }
        if source.option("locked").is_some_and(|locked| locked == "true") {
            args.push("--locked".to_string());
        }
        args.push(source.pkg_name.clone());
        args
    }

    fn run_install(source: &PackageSource, package_dir: PathBuf) -> InstallStep {
        let args = Self::install_args(source, &package_dir);
        let listed = vec![format!("{}@{}", source.pkg_name, source.version)];

        InstallStep::new(
            "Install Package Using cargo",
            StepConfirmation::Required(install_confirmation("cargo", &listed)),
            move |ctx: InstallContext| {
                let args = args.clone();
                let package_dir = package_dir.clone();
                async move {
                    if let Err(e) = ctx.execute_in_directory(&package_dir, &args).await {
                        discard_partial_install(&package_dir.join("bin")).await;
                        return Err(e);
                    }
                    Ok::<(), Error>(())
                }
            },
        )
    }

    fn verify(package_dir: PathBuf) -> InstallStep {
        InstallStep::new(
            "Verify Installation",
            StepConfirmation::None,
            move |_ctx: InstallContext| {
                let bin_dir = package_dir.join("bin");
                async move {
                    let installed = match tokio::fs::read_dir(&bin_dir).await {
                        Ok(mut entries) => entries.next_entry().await.ok().flatten().is_some(),
                        Err(_) => false,
                    };
                    if installed {
                        Ok(())
                    } else {
                        Err(Error::from(PackageManagerError::installation_failed(
                            "No binaries were installed by cargo",
                        )))
                    }
                }
            },
        )
    }
}

impl PackageManager for CargoPackageManager {
    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Cargo
    }

    fn install(&self, method: &InstallationMethod) -> Result<Vec<InstallStep>, Error> {
        let source = standard_source(method, PackageManagerType::Cargo)?;
        let package_dir = self.install_dir.join(&source.entry_name);
        Ok(vec![
            initialize_directory_step(package_dir.clone()),
            Self::run_install(source, package_dir.clone()),
            Self::verify(package_dir),
        ])
    }

    fn is_installed(&self, _method: &InstallationMethod) -> InstallStep {
        probe_step("cargo", "cargo --version", |output| output.starts_with("cargo "))
    }

    fn binary_path(&self, package: &str) -> PathBuf {
        self.install_dir.join(package).join("bin").join(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_install_args() {
        let source = PackageSource::new(PackageManagerType::Cargo, "taplo-cli", "0.9.3", "taplo")
            .with_option("features", "lsp");
        let args = CargoPackageManager::install_args(&source, Path::new("/srv/taplo"));
        assert_eq!(
            args,
            [
                "cargo",
                "install",
                "--root",
                "/srv/taplo",
                "--version",
                "0.9.3",
                "--features",
                "lsp",
                "taplo-cli"
            ]
        );

        let git = PackageSource::new(PackageManagerType::Cargo, "nil", "2024-08-06", "nil")
            .with_repository_url("https://github.com/oxalica/nil");
        let args = CargoPackageManager::install_args(&git, Path::new("/srv/nil"));
        assert_eq!(
            args,
            [
                "cargo",
                "install",
                "--root",
                "/srv/nil",
                "--git",
                "https://github.com/oxalica/nil",
                "--tag",
                "2024-08-06",
                "nil"
            ]
        );
    }
}
