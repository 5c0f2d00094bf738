//! Integration tests for lspkg CLI

use std::path::Path;
use std::process::{Command, Output};

fn write_config(root: &Path) -> std::path::PathBuf {
    let config = format!(
        r#"
[paths]
install_dir = "{root}/servers"
cache_dir = "{root}/cache"
settings_file = "{root}/settings.json"

[registry]
url = "http://127.0.0.1:9/registry.json.zip"

[network]
retries = 1
retry_delay = 1
"#,
        root = root.display()
    );
    let path = root.join("config.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn lspkg(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lspkg"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("LSPKG_INSTALL_DIR")
        .env_remove("LSPKG_REGISTRY_URL")
        .output()
        .expect("Failed to execute lspkg")
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_lspkg"))
        .arg("--version")
        .output()
        .expect("Failed to execute lspkg");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("lspkg"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_lspkg"))
        .arg("--help")
        .output()
        .expect("Failed to execute lspkg");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Installer for language servers"));
    for command in ["sync", "search", "install", "remove", "enable", "disable", "override"] {
        assert!(stdout.contains(command), "missing {command}");
    }
}

#[test]
fn test_cli_invalid_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_lspkg"))
        .arg("invalid-command")
        .output()
        .expect("Failed to execute lspkg");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized subcommand"));
}

#[test]
fn test_install_requires_package() {
    let output = Command::new(env!("CARGO_BIN_EXE_lspkg"))
        .arg("install")
        .output()
        .expect("Failed to execute lspkg");

    assert!(!output.status.success());
}

#[test]
fn test_list_on_fresh_install() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = lspkg(&config, &["list"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No language servers installed."));
    assert!(dir.path().join("servers").is_dir());
}

#[test]
fn test_enable_unknown_package_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = lspkg(&config, &["enable", "pyright"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Package not found: pyright"), "{stderr}");
}

#[test]
fn test_search_without_registry_reports_download_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = lspkg(&config, &["search", "python"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Maximum retries exceeded"), "{stderr}");
}

#[test]
fn test_override_records_binary() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let binary = dir.path().join("pylsp");
    std::fs::write(&binary, "#!/bin/sh\n").unwrap();

    let output = lspkg(&config, &["override", "python", binary.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let settings = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
    assert!(settings.contains("pylsp"));
}

#[test]
fn test_remove_rejects_install_root_and_parent_paths() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let installed = dir.path().join("servers").join("pyright");
    std::fs::create_dir_all(&installed).unwrap();

    for name in ["", "../servers"] {
        let output = lspkg(&config, &["remove", name]);
        assert!(!output.status.success(), "{name:?}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Package not found"), "{stderr}");
    }
    assert!(installed.is_dir());
}
