//! GitHub backend: release asset downloads and source builds

use super::{probe_step, ManagerConfig, PackageManager};
use crate::{InstallContext, InstallStep, StepConfirmation};
use lspkg_archive::ArchiveFormat;
use lspkg_errors::{Error, PackageManagerError, RegistryError};
use lspkg_net::{Download, NetClient};
use lspkg_types::package::OPTION_BIN;
use lspkg_types::{InstallationMethod, PackageManagerType, PackageSource};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed message shown for any source build failure; the cause goes to
/// `InstallationFailed::detail`
pub const SOURCE_BUILD_FAILED: &str = "Source build failed.";

#[derive(Debug, Clone)]
pub struct GithubPackageManager {
    config: ManagerConfig,
}

impl GithubPackageManager {
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self { config }
    }

    /// Create the entry directory; for source builds also drop any previous
    /// clone so a re-install starts clean
    fn initialize(package_dir: PathBuf, stale_clone: Option<PathBuf>) -> InstallStep {
        InstallStep::new(
            "Initialize Directory Structure",
            StepConfirmation::None,
            move |ctx: InstallContext| {
                let package_dir = package_dir.clone();
                let stale_clone = stale_clone.clone();
                async move {
                    let result = async {
                        if let Some(clone) = &stale_clone {
                            lspkg_platform::fs::remove_if_exists(clone).await?;
                        }
                        ctx.create_directory_structure(&package_dir).await
                    }
                    .await;
                    result.map_err(|e: Error| {
                        Error::from(PackageManagerError::InitializationFailed {
                            reason: e.to_string(),
                        })
                    })
                }
            },
        )
    }

    fn download_binary(
        net: NetClient,
        timeout: Duration,
        url: String,
        package_dir: PathBuf,
    ) -> InstallStep {
        InstallStep::new(
            "Download Binary Executable",
            StepConfirmation::None,
            move |ctx: InstallContext| {
                let net = net.clone();
                let url = url.clone();
                let package_dir = package_dir.clone();
                async move {
                    ctx.status(format!("Downloading {url}"));
                    let file_name = asset_file_name(&url);
                    let dest = package_dir.join(&file_name);
                    let staging = package_dir.join(format!(".{file_name}.download"));

                    let download_failed = |cause: &Error| {
                        Error::from(RegistryError::DownloadFailed {
                            url: url.clone(),
                            cause: cause.to_string(),
                        })
                    };

                    let result = Download::new(&url, timeout)
                        .for_package(ctx.package())
                        .execute(&net, &staging, ctx.events())
                        .await
                        .map_err(|e| download_failed(&e))?;

                    lspkg_platform::fs::remove_if_exists(&dest)
                        .await
                        .map_err(|e| download_failed(&e))?;
                    lspkg_platform::fs::rename(&staging, &dest)
                        .await
                        .map_err(|e| download_failed(&e))?;

                    ctx.status(format!("Downloaded {} bytes", result.size));
                    Ok::<(), Error>(())
                }
            },
        )
    }

    fn decompress_binary(source: &PackageSource, url: &str, package_dir: PathBuf) -> InstallStep {
        let file_name = asset_file_name(url);
        let bin = source.option(OPTION_BIN).map(str::to_string);
        let entry_name = source.entry_name.clone();

        InstallStep::new(
            "Decompress Binary",
            StepConfirmation::None,
            move |ctx: InstallContext| {
                let file_name = file_name.clone();
                let bin = bin.clone();
                let entry_name = entry_name.clone();
                let package_dir = package_dir.clone();
                async move {
                    let archive = package_dir.join(&file_name);
                    let unpacked = match ArchiveFormat::detect(&archive) {
                        Some(ArchiveFormat::Gz) => {
                            ctx.status(format!("Decompressing {file_name}"));
                            lspkg_archive::gunzip(&archive).await?;
                            ArchiveFormat::Gz.strip_extension(&file_name)
                        }
                        Some(
                            f @ (ArchiveFormat::Zip | ArchiveFormat::Tar | ArchiveFormat::TarGz),
                        ) => {
                            ctx.status(format!("Extracting {file_name}"));
                            lspkg_archive::extract(&archive, &package_dir).await?;
                            lspkg_platform::fs::remove_if_exists(&archive).await?;
                            f.strip_extension(&file_name)
                        }
                        None => file_name.clone(),
                    };

                    let binary = package_dir.join(bin.unwrap_or(unpacked));
                    link_binary(&binary, &package_dir, &entry_name).await?;
                    ctx.status(format!("Installed {}", binary.display()));
                    Ok::<(), Error>(())
                }
            },
        )
    }

    fn git_clone(repository: String, package_dir: PathBuf, clone_dir: String) -> InstallStep {
        let args = vec![
            "git".to_string(),
            "clone".to_string(),
            repository,
            clone_dir.clone(),
        ];
        InstallStep::new(
            "Clone with Git",
            StepConfirmation::Required(args.join(" ")),
            move |ctx: InstallContext| {
                let args = args.clone();
                let package_dir = package_dir.clone();
                let destination = package_dir.join(&clone_dir);
                async move {
                    if lspkg_platform::fs::exists(&destination).await {
                        return Err(PackageManagerError::installation_failed(format!(
                            "{} already exists",
                            destination.display()
                        ))
                        .into());
                    }
                    ctx.execute_in_directory(&package_dir, &args).await?;
                    Ok::<(), Error>(())
                }
            },
        )
    }

    fn install_from_source(command: String, build_dir: PathBuf) -> InstallStep {
        InstallStep::new(
            "Install From Source",
            StepConfirmation::Required(command.clone()),
            move |ctx: InstallContext| {
                let command = command.clone();
                let build_dir = build_dir.clone();
                async move {
                    let args = ["sh", "-c", command.as_str()];
                    ctx.execute_in_directory(&build_dir, &args)
                        .await
                        .map(drop)
                        .map_err(|e| {
                            let dir = build_dir.display();
                            tracing::warn!(%dir, error = %e, "source build failed");
                            Error::from(PackageManagerError::InstallationFailed {
                                reason: SOURCE_BUILD_FAILED.to_string(),
                                detail: Some(e.to_string()),
                            })
                        })
                }
            },
        )
    }
}

/// Last path segment of a download URL
fn asset_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("download")
        .to_string()
}

/// Mark `binary` executable and expose it as `<package_dir>/bin/<entry_name>`
async fn link_binary(binary: &Path, package_dir: &Path, entry_name: &str) -> Result<(), Error> {
    if !lspkg_platform::fs::exists(binary).await {
        return Err(PackageManagerError::installation_failed(format!(
            "binary {} not found after decompression",
            binary.display()
        ))
        .into());
    }
    lspkg_platform::fs::make_executable(binary).await?;

    let link = package_dir.join("bin").join(entry_name);
    if link == binary {
        return Ok(());
    }
    lspkg_platform::fs::create_dir_all(&package_dir.join("bin")).await?;
    lspkg_platform::fs::replace_symlink(binary, &link).await
}

impl PackageManager for GithubPackageManager {
    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Github
    }

    fn install(&self, method: &InstallationMethod) -> Result<Vec<InstallStep>, Error> {
        match method {
            InstallationMethod::BinaryDownload { source, url } => {
                let package_dir = self.config.package_dir(&source.entry_name);
                Ok(vec![
                    Self::initialize(package_dir.clone(), None),
                    Self::download_binary(
                        self.config.net.clone(),
                        self.config.download_timeout,
                        url.clone(),
                        package_dir.clone(),
                    ),
                    Self::decompress_binary(source, url, package_dir),
                ])
            }
            InstallationMethod::SourceBuild { source, command } => {
                let repository = source.repository_url.clone().ok_or_else(|| {
                    PackageManagerError::invalid_configuration(format!(
                        "{} has no repository URL to build from",
                        source.name
                    ))
                })?;
                let package_dir = self.config.package_dir(&source.entry_name);
                let clone_dir = package_dir.join(&source.pkg_name);
                Ok(vec![
                    Self::initialize(package_dir.clone(), Some(clone_dir.clone())),
                    Self::git_clone(repository, package_dir, source.pkg_name.clone()),
                    Self::install_from_source(command.clone(), clone_dir),
                ])
            }
            InstallationMethod::StandardPackage { .. } | InstallationMethod::Unknown => {
                Err(PackageManagerError::invalid_configuration(
                    "GitHub installs need a binary download or source build",
                )
                .into())
            }
        }
    }

    fn is_installed(&self, method: &InstallationMethod) -> InstallStep {
        match method {
            InstallationMethod::BinaryDownload { .. } => InstallStep::noop(),
            InstallationMethod::SourceBuild { .. } => {
                probe_step("git", "git --version", |output| output.contains("git version"))
            }
            InstallationMethod::StandardPackage { .. } | InstallationMethod::Unknown => {
                InstallStep::failing(
                    "Check Installation Method",
                    PackageManagerError::invalid_configuration(
                        "GitHub installs need a binary download or source build",
                    )
                    .into(),
                )
            }
        }
    }

    fn binary_path(&self, package: &str) -> PathBuf {
        self.config.install_dir.join(package).join("bin").join(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_file_name() {
        assert_eq!(
            asset_file_name("https://github.com/a/b/releases/download/v1/tool-linux.tar.gz"),
            "tool-linux.tar.gz"
        );
        assert_eq!(asset_file_name("https://example.com/dl/tool.gz?raw=1"), "tool.gz");
    }

    #[test]
    fn test_source_build_requires_repository() {
        let net = NetClient::with_defaults().unwrap();
        let github = GithubPackageManager::new(ManagerConfig::new("/opt/servers", net));
        let source = PackageSource::new(PackageManagerType::Github, "zls", "0.13.0", "zls");
        let method = InstallationMethod::SourceBuild {
            source: source.clone(),
            command: "zig build".into(),
        };
        assert!(github.install(&method).is_err());

        let method = InstallationMethod::SourceBuild {
            source: source.with_repository_url("https://github.com/zigtools/zls.git"),
            command: "zig build".into(),
        };
        let steps = github.install(&method).unwrap();
        let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["Initialize Directory Structure", "Clone with Git", "Install From Source"]
        );
        assert_eq!(
            steps[1].confirmation_message(),
            Some("git clone https://github.com/zigtools/zls.git zls")
        );
        assert_eq!(steps[2].confirmation_message(), Some("zig build"));
        assert!(github.is_installed(&method).confirmation_message().is_some());
        assert_eq!(
            github.binary_path("zls"),
            PathBuf::from("/opt/servers/zls/bin/zls")
        );
    }
}
