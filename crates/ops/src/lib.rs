#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Registry coordination for lspkg
//!
//! This crate sits between the CLI and the specialised crates: it owns the
//! registry catalog (download, retry, disk cache), the single install slot,
//! and the installed-server records in the settings store.

mod builder;
mod manager;
mod slot;

pub use builder::RegistryManagerBuilder;
pub use manager::RegistryManager;
pub use slot::InstallSlot;
