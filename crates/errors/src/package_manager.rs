//! Package manager backend error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PackageManagerError {
    #[error("unknown error occurred")]
    Unknown,

    #[error("the required package manager is not installed: {manager}")]
    NotInstalled { manager: String },

    #[error("installation directory initialization failed: {reason}")]
    InitializationFailed { reason: String },

    /// `reason` is what the user sees; `detail` keeps the underlying cause
    /// for logs when the reason is a fixed message.
    #[error("package installation failed: {reason}")]
    InstallationFailed {
        reason: String,
        detail: Option<String>,
    },

    #[error("the package registry contained an invalid installation configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl PackageManagerError {
    /// Installation failure without a separate diagnostic cause
    pub fn installation_failed(reason: impl Into<String>) -> Self {
        Self::InstallationFailed {
            reason: reason.into(),
            detail: None,
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Underlying cause recorded alongside a user-facing reason, if any
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::InstallationFailed { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

impl UserFacingError for PackageManagerError {
    fn user_message(&self) -> Cow<'_, str> {
        let msg = match self {
            Self::Unknown => "Unknown error occurred.",
            Self::NotInstalled { .. } => "The required package manager is not installed.",
            Self::InitializationFailed { .. } => "Installation directory initialization failed.",
            Self::InstallationFailed { .. } => "Package installation failed.",
            Self::InvalidConfiguration { .. } => {
                "The package registry contained an invalid installation configuration."
            }
        };
        Cow::Borrowed(msg)
    }

    fn failure_reason(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Unknown => None,
            Self::NotInstalled { manager } => Some(Cow::Owned(format!("{manager} was not found"))),
            Self::InitializationFailed { reason } | Self::InstallationFailed { reason, .. } => {
                Some(Cow::Borrowed(reason.as_str()))
            }
            Self::InvalidConfiguration { message } => Some(Cow::Borrowed(message.as_str())),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotInstalled { .. } => {
                Some("Install the package manager and make sure it is on your PATH.")
            }
            Self::InvalidConfiguration { .. } => Some(
                "Refresh the registry with `lspkg sync`; \
                 the package may not support this platform.",
            ),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::InstallationFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Unknown => "package_manager.unknown",
            Self::NotInstalled { .. } => "package_manager.not_installed",
            Self::InitializationFailed { .. } => "package_manager.initialization_failed",
            Self::InstallationFailed { .. } => "package_manager.installation_failed",
            Self::InvalidConfiguration { .. } => "package_manager.invalid_configuration",
        };
        Some(code)
    }
}
