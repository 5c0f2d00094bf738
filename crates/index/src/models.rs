//! Registry catalog data models (mason-registry format)

use lspkg_types::package::{OPTION_BIN, OPTION_EXTRA_PACKAGES};
use lspkg_types::{InstallationMethod, PackageManagerType, PackageSource, PackageUrl};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// One entry of the registry catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub licenses: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<BTreeMap<String, String>>,
}

/// Where a catalog entry comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Package URL, e.g. `pkg:npm/pyright@1.1.380`
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<OneOrMany<Asset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<OneOrMany<Build>>,
}

/// Prebuilt release asset for one or more platform targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub target: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,
}

/// Build recipe for source installs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<OneOrMany<String>>,
    pub run: String,
}

/// Registry fields that may hold a single value or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Self::One(value) => std::slice::from_ref(value).iter(),
            Self::Many(values) => values.iter(),
        }
    }

    pub fn first(&self) -> Option<&T> {
        self.iter().next()
    }
}

impl OneOrMany<String> {
    fn matches_any(&self, targets: &[&str]) -> bool {
        self.iter().any(|t| targets.contains(&t.as_str()))
    }
}

static VERSION_TEMPLATE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"\{\{\s*version\s*(?:\|\s*strip_prefix\s*"([^"]*)"\s*)?\}\}"#).ok()
});

/// Expand `{{version}}` and `{{ version | strip_prefix "v" }}` placeholders
#[must_use]
pub fn expand_version(template: &str, version: &str) -> String {
    let Some(re) = VERSION_TEMPLATE.as_ref() else {
        return template.replace("{{version}}", version);
    };
    re.replace_all(template, |caps: &regex::Captures<'_>| match caps.get(1) {
        Some(prefix) => version
            .strip_prefix(prefix.as_str())
            .unwrap_or(version)
            .to_string(),
        None => version.to_string(),
    })
    .into_owned()
}

/// Target identifiers the running platform satisfies, most specific first
#[must_use]
pub fn current_targets() -> Vec<&'static str> {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "x86",
        "arm" => "arm32",
        other => other,
    };

    let mut targets: Vec<&'static str> = Vec::new();
    let specific = match (os, arch) {
        ("darwin", "x64") => vec!["darwin_x64"],
        ("darwin", "arm64") => vec!["darwin_arm64"],
        ("linux", "x64") => vec!["linux_x64_gnu", "linux_x64"],
        ("linux", "arm64") => vec!["linux_arm64_gnu", "linux_arm64"],
        ("linux", "x86") => vec!["linux_x86"],
        ("win", "x64") => vec!["win_x64"],
        ("win", "arm64") => vec!["win_arm64"],
        _ => Vec::new(),
    };
    targets.extend(specific);
    match os {
        "darwin" => targets.extend(["darwin", "unix"]),
        "linux" => targets.extend(["linux", "unix"]),
        "win" => targets.push("win"),
        _ => {}
    }
    targets
}

impl RegistryItem {
    /// Title-cased name with separators replaced by spaces
    #[must_use]
    pub fn sanitized_name(&self) -> String {
        self.name
            .split(['-', '_'])
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Description collapsed onto a single line
    #[must_use]
    pub fn sanitized_description(&self) -> String {
        self.description.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Homepage without scheme, `www.` prefix or trailing slash
    #[must_use]
    pub fn homepage_pretty(&self) -> String {
        let url = self.homepage.trim();
        let url = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url);
        let url = url.strip_prefix("www.").unwrap_or(url);
        url.trim_end_matches('/').to_string()
    }

    /// Package URL of the source, if it parses
    #[must_use]
    pub fn package_url(&self) -> Option<PackageUrl> {
        PackageUrl::parse(&self.source.id).ok()
    }

    /// Version pinned by the source identifier
    #[must_use]
    pub fn version(&self) -> Option<String> {
        self.package_url().and_then(|purl| purl.version)
    }

    /// How to install this item on the running platform
    #[must_use]
    pub fn install_method(&self) -> InstallationMethod {
        self.install_method_for(&current_targets())
    }

    /// How to install this item on a platform satisfying `targets`
    #[must_use]
    pub fn install_method_for(&self, targets: &[&str]) -> InstallationMethod {
        let Ok(purl) = PackageUrl::parse(&self.source.id) else {
            tracing::debug!(package = %self.name, id = %self.source.id, "unparseable source id");
            return InstallationMethod::Unknown;
        };
        let Some(version) = purl.version.clone() else {
            return InstallationMethod::Unknown;
        };
        let Some(manager) = PackageManagerType::from_purl_type(&purl.package_type) else {
            return InstallationMethod::Unknown;
        };

        if manager == PackageManagerType::Github {
            return self.github_method(&purl, &version, targets);
        }

        let pkg_name = match (manager, &purl.subpath) {
            (PackageManagerType::Golang, Some(subpath)) => {
                format!("{}/{subpath}", purl.qualified_name())
            }
            _ => purl.qualified_name(),
        };

        let mut source = self.package_source(manager, pkg_name, &version);
        for (key, value) in &purl.qualifiers {
            if key == "repository_url" {
                source.repository_url = Some(value.clone());
            } else {
                source.options.insert(key.clone(), value.clone());
            }
        }
        if !self.source.extra_packages.is_empty() {
            source.options.insert(
                OPTION_EXTRA_PACKAGES.to_string(),
                self.source.extra_packages.join(","),
            );
        }

        InstallationMethod::StandardPackage { source }
    }

    fn package_source(
        &self,
        manager: PackageManagerType,
        pkg_name: String,
        version: &str,
    ) -> PackageSource {
        let mut source = PackageSource::new(manager, pkg_name, version, self.name.clone())
            .with_source_id(self.source.id.clone());
        source.name = self.sanitized_name();
        source
    }

    fn github_method(
        &self,
        purl: &PackageUrl,
        version: &str,
        targets: &[&str],
    ) -> InstallationMethod {
        let Some(namespace) = purl.namespace.as_deref() else {
            return InstallationMethod::Unknown;
        };
        let repository = format!("{namespace}/{}", purl.name);

        if let Some(build) = self.source.build.as_ref().and_then(|builds| {
            builds
                .iter()
                .find(|b| b.target.as_ref().is_none_or(|t| t.matches_any(targets)))
        }) {
            let source = self
                .package_source(PackageManagerType::Github, purl.name.clone(), version)
                .with_repository_url(format!("https://github.com/{repository}.git"));
            return InstallationMethod::SourceBuild {
                source,
                command: expand_version(&build.run, version),
            };
        }

        let asset = self
            .source
            .asset
            .as_ref()
            .and_then(|assets| assets.iter().find(|a| a.target.matches_any(targets)));
        let Some(asset) = asset else {
            return InstallationMethod::Unknown;
        };
        // `file:dest/` names an extraction directory after the colon
        let Some(file) = asset
            .file
            .as_ref()
            .and_then(OneOrMany::first)
            .and_then(|f| f.split(':').next())
            .filter(|f| !f.is_empty())
        else {
            return InstallationMethod::Unknown;
        };

        let file = expand_version(file, version);
        let url = format!("https://github.com/{repository}/releases/download/{version}/{file}");
        let mut source = self
            .package_source(PackageManagerType::Github, purl.name.clone(), version)
            .with_repository_url(format!("https://github.com/{repository}"));
        if let Some(bin) = &asset.bin {
            source.options.insert(OPTION_BIN.to_string(), expand_version(bin, version));
        }

        InstallationMethod::BinaryDownload { source, url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: &str) -> RegistryItem {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_expand_version() {
        assert_eq!(expand_version("zls-{{version}}.tar.gz", "0.13.0"), "zls-0.13.0.tar.gz");
        assert_eq!(
            expand_version(r#"taplo-{{ version | strip_prefix "v" }}.gz"#, "v0.9.3"),
            "taplo-0.9.3.gz"
        );
    }

    #[test]
    fn test_sanitized_fields() {
        let item = item(
            r#"{"name": "lua-language-server", "description": "A language\n server.",
                "homepage": "https://www.github.com/LuaLS/lua-language-server/",
                "source": {"id": "pkg:github/LuaLS/lua-language-server@3.9.3"}}"#,
        );
        assert_eq!(item.sanitized_name(), "Lua Language Server");
        assert_eq!(item.sanitized_description(), "A language server.");
        assert_eq!(item.homepage_pretty(), "github.com/LuaLS/lua-language-server");
        assert_eq!(item.version().as_deref(), Some("3.9.3"));
    }

    #[test]
    fn test_npm_scoped_with_extras() {
        let item = item(
            r#"{"name": "vue-language-server",
                "source": {"id": "pkg:npm/%40vue/language-server@2.0.28",
                           "extra_packages": ["typescript@5.5.4"]}}"#,
        );
        let InstallationMethod::StandardPackage { source } = item.install_method_for(&["linux_x64"])
        else {
            panic!("expected standard package");
        };
        assert_eq!(source.manager, PackageManagerType::Npm);
        assert_eq!(source.pkg_name, "@vue/language-server");
        assert_eq!(source.version, "2.0.28");
        assert_eq!(source.entry_name, "vue-language-server");
        assert_eq!(source.extra_packages(), vec!["typescript@5.5.4"]);
    }

    #[test]
    fn test_golang_subpath() {
        let item = item(
            r#"{"name": "gopls", "source": {"id": "pkg:golang/golang.org/x/tools@v0.24.0#gopls"}}"#,
        );
        let method = item.install_method_for(&[]);
        assert_eq!(method.package_manager_type(), Some(PackageManagerType::Golang));
        assert_eq!(method.source().unwrap().pkg_name, "golang.org/x/tools/gopls");
    }

    #[test]
    fn test_github_asset_for_platform() {
        let item = item(
            r#"{"name": "rust-analyzer",
                "source": {"id": "pkg:github/rust-lang/rust-analyzer@2024-08-05",
                           "asset": [
                             {"target": "darwin_arm64", "file": "rust-analyzer-aarch64-apple-darwin.gz", "bin": "rust-analyzer-aarch64-apple-darwin"},
                             {"target": ["linux_x64_gnu", "linux_x64"], "file": "rust-analyzer-x86_64-unknown-linux-gnu.gz"}
                           ]}}"#,
        );
        let InstallationMethod::BinaryDownload { source, url } =
            item.install_method_for(&["darwin_arm64", "darwin"])
        else {
            panic!("expected binary download");
        };
        assert_eq!(
            url,
            "https://github.com/rust-lang/rust-analyzer/releases/download/2024-08-05/rust-analyzer-aarch64-apple-darwin.gz"
        );
        assert_eq!(source.option(OPTION_BIN), Some("rust-analyzer-aarch64-apple-darwin"));

        assert!(matches!(
            item.install_method_for(&["linux_x64"]),
            InstallationMethod::BinaryDownload { .. }
        ));
        assert_eq!(item.install_method_for(&["win_x64"]), InstallationMethod::Unknown);
    }

    #[test]
    fn test_github_source_build() {
        let item = item(
            r#"{"name": "zls",
                "source": {"id": "pkg:github/zigtools/zls@0.13.0", "build": {"run": "zig build -Doptimize=ReleaseSafe"}}}"#,
        );
        let InstallationMethod::SourceBuild { source, command } = item.install_method_for(&[])
        else {
            panic!("expected source build");
        };
        assert_eq!(command, "zig build -Doptimize=ReleaseSafe");
        assert_eq!(source.repository_url.as_deref(), Some("https://github.com/zigtools/zls.git"));
    }

    #[test]
    fn test_unknown_methods() {
        let unsupported = item(r#"{"name": "x", "source": {"id": "pkg:luarocks/x@1.0"}}"#);
        assert_eq!(unsupported.install_method_for(&[]), InstallationMethod::Unknown);
        let unversioned = item(r#"{"name": "x", "source": {"id": "pkg:npm/x"}}"#);
        assert_eq!(unversioned.install_method_for(&[]), InstallationMethod::Unknown);
        let garbage = item(r#"{"name": "x", "source": {"id": "not a purl"}}"#);
        assert_eq!(garbage.install_method_for(&[]), InstallationMethod::Unknown);
    }
}
