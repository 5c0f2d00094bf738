//! Package-related type definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Option key: install as a development dependency (`"true"`)
pub const OPTION_DEV: &str = "dev";
/// Option key: comma separated packages installed alongside the main one
pub const OPTION_EXTRA_PACKAGES: &str = "extraPackages";
/// Option key: executable name inside a downloaded release asset
pub const OPTION_BIN: &str = "bin";

/// Toolchain or mechanism used to install a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManagerType {
    Npm,
    Cargo,
    Golang,
    Pip,
    Gem,
    Nuget,
    Opam,
    Composer,
    SourceBuild,
    Github,
}

impl PackageManagerType {
    /// Map a package-URL type to the manager that installs it
    #[must_use]
    pub fn from_purl_type(purl_type: &str) -> Option<Self> {
        let manager = match purl_type {
            "npm" => Self::Npm,
            "cargo" => Self::Cargo,
            "golang" => Self::Golang,
            "pypi" => Self::Pip,
            "gem" => Self::Gem,
            "nuget" => Self::Nuget,
            "opam" => Self::Opam,
            "composer" => Self::Composer,
            "github" => Self::Github,
            _ => return None,
        };
        Some(manager)
    }

    #[must_use]
    pub fn user_description(self) -> &'static str {
        match self {
            Self::Npm => "NPM - Package manager for JavaScript",
            Self::Cargo => "Cargo - Package manager for Rust",
            Self::Golang => "Go - Package manager for Go",
            Self::Pip => "Pip - Package manager for Python",
            Self::Gem => "Gem - Package manager for Ruby",
            Self::Nuget => "Nuget - Package manager for .NET",
            Self::Opam => "Opam - Package manager for OCaml",
            Self::Composer => "Composer - Package manager for PHP",
            Self::SourceBuild => "Build From Source",
            Self::Github => "Download from GitHub",
        }
    }

    /// Executable probed before installing
    #[must_use]
    pub fn tool(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Cargo => "cargo",
            Self::Golang => "go",
            Self::Pip => "python3",
            Self::Gem => "gem",
            Self::Nuget => "dotnet",
            Self::Opam => "opam",
            Self::Composer => "composer",
            Self::SourceBuild | Self::Github => "git",
        }
    }
}

impl fmt::Display for PackageManagerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Npm => "npm",
            Self::Cargo => "cargo",
            Self::Golang => "golang",
            Self::Pip => "pip",
            Self::Gem => "gem",
            Self::Nuget => "nuget",
            Self::Opam => "opam",
            Self::Composer => "composer",
            Self::SourceBuild => "source_build",
            Self::Github => "github",
        };
        f.write_str(name)
    }
}

/// Everything a backend needs to know to install one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSource {
    /// Identifier the underlying tool understands (`@vue/language-server`)
    pub pkg_name: String,
    /// Display name
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub options: HashMap<String, String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    /// Install-directory segment under the install root
    pub entry_name: String,
    /// The registry's original package URL
    pub source_id: String,
    pub manager: PackageManagerType,
}

impl PackageSource {
    pub fn new(
        manager: PackageManagerType,
        pkg_name: impl Into<String>,
        version: impl Into<String>,
        entry_name: impl Into<String>,
    ) -> Self {
        let entry_name = entry_name.into();
        Self {
            pkg_name: pkg_name.into(),
            name: entry_name.clone(),
            version: version.into(),
            options: HashMap::new(),
            repository_url: None,
            entry_name,
            source_id: String::new(),
            manager,
        }
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_repository_url(mut self, url: impl Into<String>) -> Self {
        self.repository_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    #[must_use]
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// `dev` option set to `"true"`
    #[must_use]
    pub fn is_dev(&self) -> bool {
        self.option(OPTION_DEV) == Some("true")
    }

    /// Additional packages from the comma separated `extraPackages` option
    #[must_use]
    pub fn extra_packages(&self) -> Vec<String> {
        self.option(OPTION_EXTRA_PACKAGES)
            .map(|extras| {
                extras
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// How a package gets onto disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallationMethod {
    /// Installed by a language package manager
    StandardPackage { source: PackageSource },
    /// Prebuilt release asset fetched over HTTP
    BinaryDownload { source: PackageSource, url: String },
    /// Repository cloned and built with `command`
    SourceBuild {
        source: PackageSource,
        command: String,
    },
    Unknown,
}

impl InstallationMethod {
    /// Backend responsible for this method, `None` for `Unknown`
    #[must_use]
    pub fn package_manager_type(&self) -> Option<PackageManagerType> {
        match self {
            Self::StandardPackage { source } => Some(source.manager),
            Self::BinaryDownload { .. } | Self::SourceBuild { .. } => {
                Some(PackageManagerType::Github)
            }
            Self::Unknown => None,
        }
    }

    #[must_use]
    pub fn source(&self) -> Option<&PackageSource> {
        match self {
            Self::StandardPackage { source }
            | Self::BinaryDownload { source, .. }
            | Self::SourceBuild { source, .. } => Some(source),
            Self::Unknown => None,
        }
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.source().map(|source| source.version.as_str())
    }
}

/// Record of a successfully installed language server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledLanguageServer {
    pub package_name: String,
    pub is_enabled: bool,
    pub version: String,
}

impl InstalledLanguageServer {
    pub fn new(package_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            is_enabled: true,
            version: version.into(),
        }
    }
}
