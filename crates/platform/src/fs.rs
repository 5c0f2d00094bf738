//! Filesystem convenience helpers.
//!
//! Every function maps `io::Error` to `StorageError` with the offending path
//! attached so callers can surface it directly.

use lspkg_errors::{Error, StorageError};
use std::path::Path;
use tokio::fs;

/// Result type for filesystem operations
pub type Result<T> = std::result::Result<T, Error>;

fn storage_err(err: &std::io::Error, path: &Path) -> Error {
    StorageError::from_io_with_path(err, path).into()
}

/// Create a directory with all parent directories
///
/// # Errors
///
/// Returns an error if permission is denied or any I/O operation fails.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| storage_err(&e, path))
}

/// Check if a path exists
pub async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Remove a file, symlink or directory tree. A missing path is not an error.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub async fn remove_if_exists(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(storage_err(&e, path)),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_err(&e, path)),
    }
}

/// Move `src` to `dst`, falling back to copy + delete across filesystems
///
/// # Errors
///
/// Returns an error if neither rename nor copy succeeds.
pub async fn rename(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(18) => {
            // EXDEV: temp dirs often live on another device
            fs::copy(src, dst).await.map_err(|e| storage_err(&e, dst))?;
            fs::remove_file(src).await.map_err(|e| storage_err(&e, src))
        }
        Err(e) => Err(StorageError::AtomicRenameFailed {
            message: format!("{} -> {}: {e}", src.display(), dst.display()),
        }
        .into()),
    }
}

/// Write `contents` to a sibling temp file, then rename it over `path`
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or either the
/// write or the rename fails.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)
        .await
        .map_err(|e| storage_err(&e, &tmp))?;
    fs::rename(&tmp, path).await.map_err(|e| {
        Error::from(StorageError::AtomicRenameFailed {
            message: format!("{}: {e}", path.display()),
        })
    })
}

/// Add execute permission for everyone who can read the file
///
/// # Errors
///
/// Returns an error if the file's metadata cannot be read or updated.
#[cfg(unix)]
pub async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .await
        .map_err(|e| storage_err(&e, path))?;
    let mut permissions = metadata.permissions();
    let mode = permissions.mode();
    permissions.set_mode(mode | ((mode & 0o444) >> 2) | 0o100);
    fs::set_permissions(path, permissions)
        .await
        .map_err(|e| storage_err(&e, path))
}

/// Executable bits do not exist on this platform
///
/// # Errors
///
/// Never fails.
#[cfg(not(unix))]
pub async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Point `link` at `target`, replacing whatever is at `link`
///
/// # Errors
///
/// Returns an error if the parent cannot be created, an existing entry cannot
/// be removed or the link cannot be created.
#[cfg(unix)]
pub async fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        create_dir_all(parent).await?;
    }
    remove_if_exists(link).await?;
    fs::symlink(target, link)
        .await
        .map_err(|e| storage_err(&e, link))
}

/// Copies instead of linking where symlinks are unavailable
///
/// # Errors
///
/// Returns an error if the copy fails.
#[cfg(not(unix))]
pub async fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        create_dir_all(parent).await?;
    }
    remove_if_exists(link).await?;
    fs::copy(target, link)
        .await
        .map(|_| ())
        .map_err(|e| storage_err(&e, link))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remove_if_exists_tolerates_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        remove_if_exists(&dir.path().join("missing")).await.unwrap();

        let nested = dir.path().join("a/b");
        create_dir_all(&nested).await.unwrap();
        fs::write(nested.join("f"), b"x").await.unwrap();
        remove_if_exists(&dir.path().join("a")).await.unwrap();
        assert!(!exists(&dir.path().join("a")).await);
    }

    #[tokio::test]
    async fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        write_atomic(&path, b"{}").await.unwrap();
        write_atomic(&path, b"{\"a\":1}").await.unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"{\"a\":1}");
        assert!(!exists(&path.with_extension("tmp")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn make_executable_and_link() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("tool");
        fs::write(&bin, b"#!/bin/sh\n").await.unwrap();
        fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o644))
            .await
            .unwrap();

        make_executable(&bin).await.unwrap();
        let mode = fs::metadata(&bin).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);

        let link = dir.path().join("bin/tool");
        replace_symlink(&bin, &link).await.unwrap();
        replace_symlink(&bin, &link).await.unwrap();
        assert_eq!(fs::read_link(&link).await.unwrap(), bin);
    }
}
