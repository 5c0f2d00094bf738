//! Go backend: `go install` with `GOBIN` pointed at the package directory

use super::{
    initialize_directory_step, install_confirmation, probe_step, standard_source, PackageManager,
};
use crate::{InstallContext, InstallStep, StepConfirmation};
use lspkg_errors::{Error, PackageManagerError};
use lspkg_platform::PlatformCommand;
use lspkg_types::{InstallationMethod, PackageManagerType, PackageSource};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GolangPackageManager {
    install_dir: PathBuf,
}

/// Executable name `go install` produces for a module path
fn executable_name(module: &str) -> &str {
    let mut segments = module.rsplit('/');
    let last = segments.next().unwrap_or(module);
    // Major version suffixes (`/v2`) are not part of the binary name
    let is_major_version = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    if is_major_version {
        segments.next().unwrap_or(last)
    } else {
        last
    }
}

impl GolangPackageManager {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    fn run_install(source: &PackageSource, package_dir: PathBuf) -> InstallStep {
        let qualified = format!("{}@{}", source.pkg_name, source.version);
        let confirmation = install_confirmation("go", std::slice::from_ref(&qualified));

        InstallStep::new(
            "Install Package Using go",
            StepConfirmation::Required(confirmation),
            move |ctx: InstallContext| {
                let qualified = qualified.clone();
                let package_dir = package_dir.clone();
                async move {
                    let mut cmd = PlatformCommand::new("go");
                    cmd.args(["install", qualified.as_str()])
                        .current_dir(&package_dir)
                        .env("GOBIN", package_dir.join("bin").display().to_string());
                    ctx.execute(cmd).await?;
                    Ok::<(), Error>(())
                }
            },
        )
    }

    fn verify(source: &PackageSource, package_dir: PathBuf) -> InstallStep {
        let binary = package_dir.join("bin").join(executable_name(&source.pkg_name));
        InstallStep::new(
            "Verify Installation",
            StepConfirmation::None,
            move |_ctx: InstallContext| {
                let binary = binary.clone();
                async move {
                    if lspkg_platform::fs::exists(&binary).await {
                        Ok(())
                    } else {
                        Err(Error::from(PackageManagerError::installation_failed(format!(
                            "{} was not installed",
                            binary.display()
                        ))))
                    }
                }
            },
        )
    }
}

impl PackageManager for GolangPackageManager {
    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Golang
    }

    fn install(&self, method: &InstallationMethod) -> Result<Vec<InstallStep>, Error> {
        let source = standard_source(method, PackageManagerType::Golang)?;
        let package_dir = self.install_dir.join(&source.entry_name);
        Ok(vec![
            initialize_directory_step(package_dir.clone()),
            Self::run_install(source, package_dir.clone()),
            Self::verify(source, package_dir),
        ])
    }

    fn is_installed(&self, _method: &InstallationMethod) -> InstallStep {
        probe_step("go", "go version", |output| output.starts_with("go version"))
    }

    fn binary_path(&self, package: &str) -> PathBuf {
        self.install_dir.join(package).join("bin").join(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_name() {
        assert_eq!(executable_name("golang.org/x/tools/gopls"), "gopls");
        assert_eq!(
            executable_name("github.com/nametake/golangci-lint-langserver"),
            "golangci-lint-langserver"
        );
        assert_eq!(executable_name("github.com/bufbuild/buf/v2"), "buf");
        assert_eq!(executable_name("mvdan.cc/gofumpt"), "gofumpt");
    }
}
