#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Persisted user state for lspkg
//!
//! Tracks installed language servers, their enabled flags and per-language
//! binary overrides.

mod models;
mod store;

pub use models::Settings;
pub use store::{update_settings, JsonSettingsStore, MemorySettingsStore, SettingsStore};
