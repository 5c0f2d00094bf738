//! Integration tests for settings persistence

use lspkg_errors::{Error, StorageError};
use lspkg_state::{update_settings, JsonSettingsStore, MemorySettingsStore, Settings, SettingsStore};
use lspkg_types::InstalledLanguageServer;
use std::path::PathBuf;
use tempfile::tempdir;

#[tokio::test]
async fn test_missing_file_yields_defaults() {
    let temp = tempdir().unwrap();
    let store = JsonSettingsStore::new(temp.path().join("settings.json"));
    assert_eq!(store.load().await.unwrap(), Settings::default());
}

#[tokio::test]
async fn test_json_store_roundtrip() {
    let temp = tempdir().unwrap();
    let store = JsonSettingsStore::new(temp.path().join("nested/settings.json"));

    let mut settings = Settings::default();
    settings.record_installed(InstalledLanguageServer::new("gopls", "v0.24.0"));
    settings
        .lsp_binaries
        .insert("go".into(), PathBuf::from("/usr/local/bin/gopls"));
    store.save(&settings).await.unwrap();

    let reopened = JsonSettingsStore::new(store.path());
    assert_eq!(reopened.load().await.unwrap(), settings);
}

#[tokio::test]
async fn test_corrupt_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("settings.json");
    tokio::fs::write(&path, b"{\"installed_language_servers\": 3").await.unwrap();

    let err = JsonSettingsStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::CorruptedData { .. })));
}

#[tokio::test]
async fn test_update_rereads_before_saving() {
    let store = MemorySettingsStore::default();

    // A write that happens between two updates must survive the second one
    update_settings(&store, |s| {
        s.record_installed(InstalledLanguageServer::new("pyright", "1.1.380"));
    })
    .await
    .unwrap();
    let mut external = store.load().await.unwrap();
    external.lsp_binaries.insert("python".into(), PathBuf::from("/opt/pyright"));
    store.save(&external).await.unwrap();

    let toggled = update_settings(&store, |s| s.set_enabled("pyright", false))
        .await
        .unwrap();
    assert!(toggled);

    let settings = store.load().await.unwrap();
    assert!(!settings.installed("pyright").unwrap().is_enabled);
    assert!(settings.lsp_binaries.contains_key("python"));
}
