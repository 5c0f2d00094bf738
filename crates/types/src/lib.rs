#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for lspkg
//!
//! Describes what gets installed (`PackageSource`), how
//! (`InstallationMethod`, `PackageManagerType`) and what was installed
//! (`InstalledLanguageServer`), plus package-URL parsing for registry
//! source identifiers.

pub mod package;
pub mod purl;

pub use package::{InstallationMethod, InstalledLanguageServer, PackageManagerType, PackageSource};
pub use purl::PackageUrl;
