#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Registry catalog for lspkg
//!
//! This crate handles the catalog of installable language servers. The
//! catalog is downloaded as plain or zipped JSON, cached locally for
//! offline use and searched by name, description and language.

mod cache;
mod models;

pub use cache::RegistryCache;
pub use models::{current_targets, expand_version, Asset, Build, OneOrMany, RegistryItem, Source};

use lspkg_errors::{Error, RegistryError};

/// Entry holding the catalog inside the zipped release asset
pub const CATALOG_ENTRY: &str = "registry.json";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Parsed registry catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    items: Vec<RegistryItem>,
}

impl Catalog {
    #[must_use]
    pub fn new(items: Vec<RegistryItem>) -> Self {
        Self { items }
    }

    /// Parse a catalog from a JSON array or a zip archive containing
    /// `registry.json`
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidCatalog` if the archive or JSON is malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.starts_with(ZIP_MAGIC) {
            let json = lspkg_archive::read_zip_entry(bytes, CATALOG_ENTRY).map_err(|e| {
                RegistryError::InvalidCatalog {
                    message: e.to_string(),
                }
            })?;
            return Self::from_json(&json);
        }
        Self::from_json(bytes)
    }

    fn from_json(json: &[u8]) -> Result<Self, Error> {
        let items: Vec<RegistryItem> =
            serde_json::from_slice(json).map_err(|e| RegistryError::InvalidCatalog {
                message: e.to_string(),
            })?;
        Ok(Self { items })
    }

    /// Serialize as a plain JSON array
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(&self.items)?)
    }

    #[must_use]
    pub fn items(&self) -> &[RegistryItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up an item by exact name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegistryItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Case-insensitive substring search over name, description and languages
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&RegistryItem> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.items.iter().collect();
        }

        let mut results: Vec<&RegistryItem> = self
            .items
            .iter()
            .filter(|item| {
                item.name.to_lowercase().contains(&query)
                    || item.description.to_lowercase().contains(&query)
                    || item
                        .languages
                        .iter()
                        .any(|lang| lang.to_lowercase().contains(&query))
            })
            .collect();

        // Name hits first
        results.sort_by_key(|item| !item.name.to_lowercase().contains(&query));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {"name": "pyright", "description": "Static type checker for Python", "languages": ["Python"],
         "source": {"id": "pkg:npm/pyright@1.1.380"}},
        {"name": "rust-analyzer", "description": "Rust compiler front-end for IDEs", "languages": ["Rust"],
         "source": {"id": "pkg:github/rust-lang/rust-analyzer@2024-08-05"}},
        {"name": "python-lsp-server", "description": "Fork of the python-language-server project", "languages": ["Python"],
         "source": {"id": "pkg:pypi/python-lsp-server@1.12.0"}}
    ]"#;

    #[test]
    fn test_search() {
        let catalog = Catalog::from_bytes(CATALOG.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 3);

        let names: Vec<&str> = catalog.search("PYTHON").iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["python-lsp-server", "pyright"]);

        let rust: Vec<&str> = catalog.search("rust").iter().map(|i| i.name.as_str()).collect();
        assert_eq!(rust, vec!["rust-analyzer"]);

        assert!(catalog.search("haskell").is_empty());
        assert_eq!(catalog.search("  ").len(), 3);
        assert!(catalog.get("pyright").is_some());
        assert!(catalog.get("Pyright").is_none());
    }

    #[test]
    fn test_invalid_catalog() {
        let err = Catalog::from_bytes(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Registry(RegistryError::InvalidCatalog { .. })));

        let err = Catalog::from_bytes(b"PK\x03\x04garbage").unwrap_err();
        assert!(matches!(err, Error::Registry(RegistryError::InvalidCatalog { .. })));
    }
}
