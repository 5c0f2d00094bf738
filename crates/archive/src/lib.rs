#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Archive extraction for downloaded release assets
//!
//! Supports zip, tar, gzip-compressed tar and single-file gzip. Extraction
//! runs on the blocking pool and refuses entries that would land outside
//! the destination directory.

use lspkg_errors::{ArchiveError, Error};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};

/// Archive formats recognised by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    /// A single gzip-compressed file
    Gz,
}

impl ArchiveFormat {
    /// Detect the format from the file name; `None` means "not an archive"
    #[must_use]
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") || name.ends_with(".vsix") {
            Some(Self::Zip)
        } else if name.ends_with(".gz") {
            Some(Self::Gz)
        } else {
            None
        }
    }

    /// File name with this format's extension removed
    #[must_use]
    pub fn strip_extension(self, file_name: &str) -> String {
        let lower = file_name.to_ascii_lowercase();
        let suffix_len = match self {
            Self::TarGz if lower.ends_with(".tar.gz") => ".tar.gz".len(),
            Self::TarGz => ".tgz".len(),
            Self::Tar => ".tar".len(),
            Self::Zip if lower.ends_with(".vsix") => ".vsix".len(),
            Self::Zip => ".zip".len(),
            Self::Gz => ".gz".len(),
        };
        file_name[..file_name.len().saturating_sub(suffix_len)].to_string()
    }
}

/// Extract `archive` into `dest`, returning the number of files written.
///
/// # Errors
///
/// Returns `UnsupportedFormat` for unrecognised names or single-file gzip
/// (use [`gunzip`]), `UnreadableArchive` when the container cannot be
/// parsed, `InvalidEntryPath` for entries escaping `dest`, `InvalidChecksum`
/// for corrupt zip entries and `ExtractionFailed` for other I/O failures.
pub async fn extract(archive: &Path, dest: &Path) -> Result<usize, Error> {
    let format = match ArchiveFormat::detect(archive) {
        Some(format @ (ArchiveFormat::Zip | ArchiveFormat::Tar | ArchiveFormat::TarGz)) => format,
        _ => {
            return Err(ArchiveError::UnsupportedFormat {
                path: archive.display().to_string(),
            }
            .into())
        }
    };

    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&dest).map_err(|e| extraction_failed(&dest, &e))?;
        let file = File::open(&archive).map_err(|e| Error::io_with_path(&e, &archive))?;
        let count = match format {
            ArchiveFormat::Zip => extract_zip(file, &archive, &dest)?,
            ArchiveFormat::Tar => extract_tar(file, &archive, &dest)?,
            ArchiveFormat::TarGz => {
                extract_tar(flate2::read::GzDecoder::new(file), &archive, &dest)?
            }
            ArchiveFormat::Gz => 0,
        };
        tracing::debug!(
            archive = %archive.display(),
            dest = %dest.display(),
            count,
            "extracted archive"
        );
        Ok::<usize, Error>(count)
    })
    .await
    .map_err(|e| Error::internal(format!("extract task failed: {e}")))?
}

/// Decompress a single-file gzip next to itself without the `.gz` suffix,
/// removing the compressed file. Returns the decompressed path.
///
/// # Errors
///
/// Returns `UnsupportedFormat` when the name does not end in `.gz` and
/// `UnreadableArchive` when the data is not valid gzip.
pub async fn gunzip(file: &Path) -> Result<PathBuf, Error> {
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| n.to_ascii_lowercase().ends_with(".gz"))
        .ok_or_else(|| ArchiveError::UnsupportedFormat {
            path: file.display().to_string(),
        })?;
    let output = file.with_file_name(ArchiveFormat::Gz.strip_extension(file_name));
    let input = file.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let compressed = File::open(&input).map_err(|e| Error::io_with_path(&e, &input))?;
        let mut decoder = flate2::read::GzDecoder::new(compressed);
        let mut out = File::create(&output).map_err(|e| Error::io_with_path(&e, &output))?;
        if let Err(e) = std::io::copy(&mut decoder, &mut out) {
            let _ = std::fs::remove_file(&output);
            return Err(ArchiveError::UnreadableArchive {
                path: format!("{}: {e}", input.display()),
            }
            .into());
        }
        std::fs::remove_file(&input).map_err(|e| Error::io_with_path(&e, &input))?;
        Ok::<PathBuf, Error>(output)
    })
    .await
    .map_err(|e| Error::internal(format!("gunzip task failed: {e}")))?
}

/// Read a single named entry out of an in-memory zip archive
///
/// # Errors
///
/// Returns `UnreadableArchive` when the bytes are not a zip or the entry is
/// missing, and `InvalidChecksum` when the entry is corrupt.
pub fn read_zip_entry(bytes: &[u8], name: &str) -> Result<Vec<u8>, Error> {
    let unreadable = |detail: String| ArchiveError::UnreadableArchive { path: detail };

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| unreadable(format!("in-memory archive: {e}")))?;
    let mut entry = archive
        .by_name(name)
        .map_err(|e| unreadable(format!("{name}: {e}")))?;

    let mut contents = Vec::new();
    entry.read_to_end(&mut contents).map_err(|e| {
        if e.to_string().to_ascii_lowercase().contains("checksum") {
            Error::from(ArchiveError::InvalidChecksum {
                path: name.to_string(),
            })
        } else {
            Error::from(unreadable(format!("{name}: {e}")))
        }
    })?;
    Ok(contents)
}

fn extraction_failed(path: &Path, err: &std::io::Error) -> Error {
    ArchiveError::ExtractionFailed {
        message: format!("{}: {err}", path.display()),
    }
    .into()
}

/// Reject absolute paths and `..` components
fn ensure_enclosed(entry: &Path) -> Result<(), Error> {
    let escapes = entry
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(ArchiveError::InvalidEntryPath {
            entry: entry.display().to_string(),
        }
        .into());
    }
    Ok(())
}

fn extract_zip<R: Read + Seek>(
    reader: R,
    archive_path: &Path,
    dest: &Path,
) -> Result<usize, Error> {
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| ArchiveError::UnreadableArchive {
            path: format!("{}: {e}", archive_path.display()),
        })?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| ArchiveError::UnreadableArchive {
            path: format!("{}: entry {i}: {e}", archive_path.display()),
        })?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(ArchiveError::InvalidEntryPath {
                entry: entry.name().to_string(),
            }
            .into());
        };

        // Skip macOS metadata
        if relative.starts_with("__MACOSX") {
            continue;
        }

        let outpath = dest.join(&relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(|e| extraction_failed(&outpath, &e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| extraction_failed(parent, &e))?;
        }
        let mut outfile = File::create(&outpath).map_err(|e| extraction_failed(&outpath, &e))?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| {
            if e.to_string().to_ascii_lowercase().contains("checksum") {
                Error::from(ArchiveError::InvalidChecksum {
                    path: relative.display().to_string(),
                })
            } else {
                extraction_failed(&outpath, &e)
            }
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                    .map_err(|e| extraction_failed(&outpath, &e))?;
            }
        }
        count += 1;
    }

    Ok(count)
}

fn extract_tar<R: Read>(reader: R, archive_path: &Path, dest: &Path) -> Result<usize, Error> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_unpack_xattrs(false);

    let unreadable = |e: std::io::Error| ArchiveError::UnreadableArchive {
        path: format!("{}: {e}", archive_path.display()),
    };

    let mut count = 0;
    for entry in archive.entries().map_err(unreadable)? {
        let mut entry = entry.map_err(unreadable)?;
        let path = entry.path().map_err(unreadable)?.into_owned();
        ensure_enclosed(&path)?;

        let is_file = entry.header().entry_type().is_file();
        entry
            .unpack_in(dest)
            .map_err(|e| extraction_failed(&dest.join(&path), &e))?;
        if is_file {
            count += 1;
        }
    }

    Ok(count)
}
