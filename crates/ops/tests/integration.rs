//! Integration tests for the registry manager

use async_trait::async_trait;
use httpmock::prelude::*;
use lspkg_config::Config;
use lspkg_errors::{Error, PackageManagerError, RegistryError};
use lspkg_events::{AppEvent, EventReceiver, RegistryEvent};
use lspkg_index::RegistryItem;
use lspkg_install::{InstallOperation, InstallStep, StepConfirmation};
use lspkg_ops::{RegistryManager, RegistryManagerBuilder};
use lspkg_platform::{CommandOutput, LineSink, PlatformCommand, ProcessOperations};
use lspkg_state::{MemorySettingsStore, Settings, SettingsStore};
use lspkg_types::InstalledLanguageServer;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tempfile::tempdir;
use tokio::sync::Notify;

const REGISTRY: &str = r#"[
    {"name": "pyright", "description": "Static type checker for Python",
     "languages": ["Python"], "source": {"id": "pkg:npm/pyright@1.1.380"}},
    {"name": "rubocop", "description": "Ruby static code analyzer",
     "languages": ["Ruby"], "source": {"id": "pkg:gem/rubocop@1.65.0"}},
    {"name": "mystery-ls", "source": {"id": "pkg:luarocks/mystery@1.0.0"}}
]"#;

struct NoShell;

#[async_trait]
impl ProcessOperations for NoShell {
    async fn execute(
        &self,
        cmd: PlatformCommand,
        _on_line: LineSink<'_>,
    ) -> Result<CommandOutput, Error> {
        Err(Error::internal(format!("unexpected command: {cmd}")))
    }
}

struct Fixture {
    manager: RegistryManager,
    settings: Arc<MemorySettingsStore>,
    events: EventReceiver,
    _dir: tempfile::TempDir,
}

fn config(root: &Path, registry_url: &str) -> Config {
    let mut config = Config::default();
    config.paths.install_dir = Some(root.join("servers"));
    config.paths.cache_dir = Some(root.join("cache"));
    config.paths.settings_file = Some(root.join("settings.json"));
    config.registry.url = registry_url.to_string();
    config.network.retries = 3;
    config.network.retry_delay = 1;
    config.network.max_retry_delay = 5;
    config
}

fn fixture_with(configure: impl FnOnce(&Path, &mut Config), registry_url: &str) -> Fixture {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path(), registry_url);
    configure(dir.path(), &mut config);
    let settings = Arc::new(MemorySettingsStore::default());
    let (tx, events) = lspkg_events::channel();
    let manager = RegistryManagerBuilder::new()
        .with_config(config)
        .with_shell(Arc::new(NoShell))
        .with_settings_store(settings.clone())
        .with_event_sender(tx)
        .build()
        .unwrap();
    Fixture {
        manager,
        settings,
        events,
        _dir: dir,
    }
}

fn fixture(registry_url: &str) -> Fixture {
    fixture_with(|_, _| {}, registry_url)
}

fn item(name: &str) -> RegistryItem {
    serde_json::from_str(&format!(
        r#"{{"name": "{name}", "source": {{"id": "pkg:npm/{name}@2.0.0"}}}}"#
    ))
    .unwrap()
}

fn operation(name: &str, steps: Vec<InstallStep>) -> InstallOperation {
    InstallOperation::new(item(name), steps, Arc::new(NoShell))
}

fn registry_events(events: &mut EventReceiver) -> Vec<RegistryEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let AppEvent::Registry(event) = event {
            out.push(event);
        }
    }
    out
}

fn zipped(json: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("registry.json", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(json.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_refresh_replaces_catalog_and_caches_it() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/registry.json.zip");
        then.status(200).body(zipped(REGISTRY));
    });

    let mut fx = fixture(&server.url("/registry.json.zip"));
    assert_eq!(fx.manager.refresh_registry_catalog().await.unwrap(), 3);
    mock.assert();
    assert!(!fx.manager.is_downloading_registry());
    assert_eq!(fx.manager.search("python")[0].name, "pyright");

    let events = registry_events(&mut fx.events);
    assert!(matches!(events.first(), Some(RegistryEvent::RefreshStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(RegistryEvent::RefreshCompleted { packages: 3, .. })
    ));

    // A fresh manager over the same directories picks up the cache
    let cache_dir = fx.manager.config().cache_dir();
    let reloaded = RegistryManagerBuilder::new()
        .with_config(fx.manager.config().clone())
        .with_shell(Arc::new(NoShell))
        .with_settings_store(Arc::new(MemorySettingsStore::default()))
        .build()
        .unwrap();
    assert!(cache_dir.join("registry.json").exists());
    assert_eq!(reloaded.load_cached_catalog().await.unwrap(), 3);
    assert!(reloaded.item("rubocop").is_some());
    assert!(!reloaded.refresh_if_stale().await.unwrap());
}

#[tokio::test]
async fn test_retry_exhaustion_reports_last_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/registry.json.zip");
        then.status(500);
    });

    let mut fx = fixture(&server.url("/registry.json.zip"));
    let err = fx.manager.refresh_registry_catalog().await.unwrap_err();
    mock.assert_hits(3);

    match err {
        Error::Registry(RegistryError::MaxRetriesExceeded { url, last_error }) => {
            assert!(url.ends_with("/registry.json.zip"));
            assert!(last_error.contains("500"), "{last_error}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!fx.manager.is_downloading_registry());
    assert!(fx.manager.catalog().is_empty());

    let events = registry_events(&mut fx.events);
    let attempts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            RegistryEvent::AttemptFailed {
                attempt,
                max_attempts: 3,
                ..
            } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(matches!(events.last(), Some(RegistryEvent::RefreshFailed { .. })));
}

#[tokio::test]
async fn test_cache_failure_keeps_new_catalog() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/registry.json");
        then.status(200).body(REGISTRY);
    });

    let mut fx = fixture_with(
        |root, config| {
            std::fs::write(root.join("blocked"), b"").unwrap();
            config.paths.cache_dir = Some(root.join("blocked").join("cache"));
        },
        &server.url("/registry.json"),
    );

    let err = fx.manager.refresh_registry_catalog().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Registry(RegistryError::FailedToSaveRegistryCache { .. })
    ));
    assert_eq!(fx.manager.registry_items().len(), 3);
    assert!(registry_events(&mut fx.events)
        .iter()
        .any(|e| matches!(e, RegistryEvent::CacheSaveFailed { .. })));
}

#[tokio::test]
async fn test_malformed_catalog_is_not_cached() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/registry.json");
        then.status(200).body("{not json");
    });

    let fx = fixture(&server.url("/registry.json"));
    let err = fx.manager.refresh_registry_catalog().await.unwrap_err();
    assert!(matches!(err, Error::Registry(RegistryError::InvalidCatalog { .. })));
    assert_eq!(fx.manager.load_cached_catalog().await.unwrap(), 0);
}

#[tokio::test]
async fn test_single_install_at_a_time_and_record_on_success() {
    let mut fx = fixture("http://127.0.0.1:9/registry.json");
    let gate = Arc::new(Notify::new());
    let step_gate = gate.clone();
    let first = operation(
        "pyright",
        vec![InstallStep::new("Wait", StepConfirmation::None, move |_ctx| {
            let gate = step_gate.clone();
            async move {
                gate.notified().await;
                Ok::<(), Error>(())
            }
        })],
    );

    let handle = fx.manager.start_installation(first.clone()).unwrap();
    assert!(fx.manager.is_installing());
    assert!(fx.manager.running_install().unwrap().is_same(&first));

    let second = operation("gopls", Vec::new());
    let err = fx.manager.start_installation(second).unwrap_err();
    assert!(matches!(err, Error::Registry(RegistryError::InstallationRunning)));
    let err = fx.manager.install_operation(&item("gopls")).unwrap_err();
    assert!(matches!(err, Error::Registry(RegistryError::InstallationRunning)));

    gate.notify_one();
    handle.await.unwrap().unwrap();

    assert!(!fx.manager.is_installing());
    let installed = fx.manager.installed_language_servers().await.unwrap();
    assert_eq!(installed, vec![InstalledLanguageServer::new("pyright", "2.0.0")]);
    assert!(registry_events(&mut fx.events).iter().any(|e| matches!(
        e,
        RegistryEvent::PackageRecorded { package, version }
            if package == "pyright" && version == "2.0.0"
    )));
}

#[tokio::test]
async fn test_failed_install_is_not_recorded() {
    let fx = fixture("http://127.0.0.1:9/registry.json");
    let op = operation(
        "pyright",
        vec![InstallStep::failing(
            "Install Package Using npm",
            PackageManagerError::installation_failed("npm exited with 1").into(),
        )],
    );

    let err = fx.manager.start_installation(op).unwrap().await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        Error::PackageManager(PackageManagerError::InstallationFailed { .. })
    ));
    assert!(!fx.manager.is_installing());
    assert!(fx.settings.load().await.unwrap().installed_language_servers.is_empty());
}

#[tokio::test]
async fn test_cancel_releases_slot_without_recording() {
    let fx = fixture("http://127.0.0.1:9/registry.json");
    let op = operation(
        "pyright",
        vec![InstallStep::new(
            "Confirm",
            StepConfirmation::Required("Allow?".into()),
            |_ctx| async { Ok::<(), Error>(()) },
        )],
    );

    let mut updates = op.subscribe();
    let handle = fx.manager.start_installation(op.clone()).unwrap();
    updates
        .wait_for(|snapshot| snapshot.waiting_for_confirmation.is_some())
        .await
        .unwrap();

    assert!(fx.manager.cancel_installation());
    assert!(!fx.manager.is_installing());
    assert!(!fx.manager.cancel_installation());

    let err = handle.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(fx.settings.load().await.unwrap().installed_language_servers.is_empty());
}

#[tokio::test]
async fn test_install_operation_plans_probe_then_backend_steps() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/registry.json");
        then.status(200).body(REGISTRY);
    });
    let fx = fixture(&server.url("/registry.json"));
    fx.manager.refresh_registry_catalog().await.unwrap();

    let pyright = fx.manager.item("pyright").unwrap();
    let op = fx.manager.install_operation(&pyright).unwrap();
    let names: Vec<&str> = op.steps().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names.first(), Some(&"Check npm Installation"));
    assert!(names.contains(&"Install Package Using npm"));
    assert!(!fx.manager.is_installing());

    let mystery = fx.manager.item("mystery-ls").unwrap();
    let err = fx.manager.install_operation(&mystery).unwrap_err();
    assert!(matches!(
        err,
        Error::PackageManager(PackageManagerError::InvalidConfiguration { .. })
    ));

    let path = fx.manager.binary_path("pyright").unwrap();
    assert!(path.starts_with(fx.manager.config().install_dir()));
    assert!(matches!(
        fx.manager.binary_path("nope").unwrap_err(),
        Error::Registry(RegistryError::PackageNotFound { .. })
    ));
}

#[tokio::test]
async fn test_remove_and_toggle_installed_servers() {
    let fx = fixture("http://127.0.0.1:9/registry.json");
    let mut settings = Settings::default();
    settings.record_installed(InstalledLanguageServer::new("pyright", "1.1.380"));
    settings.record_installed(InstalledLanguageServer::new("gopls", "0.16.1"));
    fx.settings.save(&settings).await.unwrap();

    let dir = fx.manager.config().install_dir().join("pyright");
    std::fs::create_dir_all(dir.join("node_modules")).unwrap();

    fx.manager.set_package_enabled("gopls", false).await.unwrap();
    let err = fx.manager.set_package_enabled("zls", true).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Registry(RegistryError::PackageNotFound { name }) if name == "zls"
    ));

    fx.manager.remove_language_server("pyright").await.unwrap();
    assert!(!dir.exists());
    // Files already gone is not an error
    fx.manager.remove_language_server("gopls").await.unwrap();

    let settings = fx.settings.load().await.unwrap();
    assert!(settings.installed_language_servers.is_empty());
}

#[tokio::test]
async fn test_binary_overrides_persist() {
    let fx = fixture("http://127.0.0.1:9/registry.json");
    assert_eq!(fx.manager.binary_override("python").await.unwrap(), None);
    fx.manager
        .set_binary_override("python", "/opt/pyright/bin/pyright-langserver".into())
        .await
        .unwrap();
    assert_eq!(
        fx.manager.binary_override("python").await.unwrap(),
        Some("/opt/pyright/bin/pyright-langserver".into())
    );
}

#[tokio::test]
async fn test_remove_rejects_names_outside_install_root() {
    let fx = fixture("http://127.0.0.1:9/registry.json");
    let mut settings = Settings::default();
    settings.record_installed(InstalledLanguageServer::new("pyright", "1.1.380"));
    fx.settings.save(&settings).await.unwrap();

    let install_dir = fx.manager.config().install_dir();
    let pyright = install_dir.join("pyright");
    let sibling = install_dir.parent().unwrap().join("x");
    std::fs::create_dir_all(&pyright).unwrap();
    std::fs::create_dir_all(&sibling).unwrap();

    for name in ["", "../x", ".", "pyright/..", sibling.to_str().unwrap()] {
        let err = fx.manager.remove_language_server(name).await.unwrap_err();
        assert!(
            matches!(err, Error::Registry(RegistryError::PackageNotFound { .. })),
            "{name:?}: {err:?}"
        );
    }

    assert!(pyright.is_dir());
    assert!(sibling.is_dir());
    let installed = fx.manager.installed_language_servers().await.unwrap();
    assert_eq!(installed, vec![InstalledLanguageServer::new("pyright", "1.1.380")]);
}

#[tokio::test]
async fn test_failed_reinstall_drops_previous_record() {
    let fx = fixture("http://127.0.0.1:9/registry.json");
    let mut settings = Settings::default();
    settings.record_installed(InstalledLanguageServer::new("pyright", "1.1.380"));
    settings.record_installed(InstalledLanguageServer::new("gopls", "0.16.1"));
    fx.settings.save(&settings).await.unwrap();

    let op = operation(
        "pyright",
        vec![InstallStep::failing(
            "Install Package Using npm",
            PackageManagerError::installation_failed("npm exited with 1").into(),
        )],
    );
    fx.manager.start_installation(op).unwrap().await.unwrap().unwrap_err();

    let installed = fx.manager.installed_language_servers().await.unwrap();
    assert_eq!(installed, vec![InstalledLanguageServer::new("gopls", "0.16.1")]);
}

#[tokio::test]
async fn test_successful_reinstall_records_new_version() {
    let fx = fixture("http://127.0.0.1:9/registry.json");
    let mut settings = Settings::default();
    let mut previous = InstalledLanguageServer::new("pyright", "1.1.380");
    previous.is_enabled = false;
    settings.record_installed(previous);
    fx.settings.save(&settings).await.unwrap();

    let op = operation("pyright", Vec::new());
    fx.manager.start_installation(op).unwrap().await.unwrap().unwrap();

    let installed = fx.manager.installed_language_servers().await.unwrap();
    assert_eq!(installed, vec![InstalledLanguageServer::new("pyright", "2.0.0")]);
}

#[tokio::test]
async fn test_cancel_during_last_step_is_not_recorded() {
    let fx = fixture("http://127.0.0.1:9/registry.json");
    let this: Arc<OnceLock<InstallOperation>> = Arc::new(OnceLock::new());
    let step_op = this.clone();
    let op = operation(
        "pyright",
        vec![InstallStep::new("Finish", StepConfirmation::None, move |_ctx| {
            let step_op = step_op.clone();
            async move {
                // Cancelled while the last step finishes successfully
                if let Some(op) = step_op.get() {
                    op.cancel();
                }
                Ok::<(), Error>(())
            }
        })],
    );
    this.set(op.clone()).unwrap();

    let err = fx.manager.start_installation(op).unwrap().await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(!fx.manager.is_installing());
    assert!(fx.settings.load().await.unwrap().installed_language_servers.is_empty());
}
