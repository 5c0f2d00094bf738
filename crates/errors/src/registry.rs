//! Registry coordinator error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegistryError {
    #[error("a package is already being installed")]
    InstallationRunning,

    #[error("invalid response received: {status}")]
    InvalidResponse { status: u16 },

    #[error("failed to download {url}: {cause}")]
    DownloadFailed { url: String, cause: String },

    #[error("maximum retries exceeded for {url}: {last_error}")]
    MaxRetriesExceeded { url: String, last_error: String },

    #[error("failed to write to file: {message}")]
    WriteFailed { message: String },

    #[error("failed to write to registry cache: {message}")]
    FailedToSaveRegistryCache { message: String },

    #[error("package not found: {name}")]
    PackageNotFound { name: String },

    #[error("invalid registry catalog: {message}")]
    InvalidCatalog { message: String },
}

impl UserFacingError for RegistryError {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Self::InstallationRunning => Cow::Borrowed("A package is already being installed."),
            Self::InvalidResponse { status } => {
                Cow::Owned(format!("Invalid response received: {status}"))
            }
            Self::DownloadFailed { url, .. } => Cow::Owned(format!("Download failed: {url}")),
            Self::MaxRetriesExceeded { url, .. } => {
                Cow::Owned(format!("Maximum retries exceeded for {url}"))
            }
            Self::WriteFailed { .. } => Cow::Borrowed("Failed to write to file."),
            Self::FailedToSaveRegistryCache { .. } => {
                Cow::Borrowed("Failed to write to registry cache.")
            }
            Self::PackageNotFound { name } => Cow::Owned(format!("Package not found: {name}")),
            Self::InvalidCatalog { .. } => Cow::Borrowed("The registry catalog is invalid."),
        }
    }

    fn failure_reason(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::InstallationRunning
            | Self::InvalidResponse { .. }
            | Self::PackageNotFound { .. } => None,
            Self::DownloadFailed { cause, .. } => Some(Cow::Borrowed(cause.as_str())),
            Self::MaxRetriesExceeded { last_error, .. } => Some(Cow::Borrowed(last_error.as_str())),
            Self::WriteFailed { message }
            | Self::FailedToSaveRegistryCache { message }
            | Self::InvalidCatalog { message } => Some(Cow::Borrowed(message.as_str())),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InstallationRunning => {
                Some("Wait for the running installation to finish or cancel it.")
            }
            Self::DownloadFailed { .. } | Self::MaxRetriesExceeded { .. } => {
                Some("Check your network connection and the registry URL, then retry.")
            }
            Self::PackageNotFound { .. } => Some("Run `lspkg search` to find available packages."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InstallationRunning
                | Self::DownloadFailed { .. }
                | Self::MaxRetriesExceeded { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InstallationRunning => "registry.installation_running",
            Self::InvalidResponse { .. } => "registry.invalid_response",
            Self::DownloadFailed { .. } => "registry.download_failed",
            Self::MaxRetriesExceeded { .. } => "registry.max_retries_exceeded",
            Self::WriteFailed { .. } => "registry.write_failed",
            Self::FailedToSaveRegistryCache { .. } => "registry.cache_write_failed",
            Self::PackageNotFound { .. } => "registry.package_not_found",
            Self::InvalidCatalog { .. } => "registry.invalid_catalog",
        };
        Some(code)
    }
}
