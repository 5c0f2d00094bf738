use serde::{Deserialize, Serialize};

use crate::{EventLevel, EventMeta, EventSource};
use lspkg_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable dotted error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Underlying cause that distinguishes similar messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self {
            code: error.user_code().map(Into::into),
            message: error.user_message().into_owned(),
            reason: error.failure_reason().map(std::borrow::Cow::into_owned),
            hint: error.user_hint().map(Into::into),
            retryable: error.is_retryable(),
        }
    }
}

pub mod download;
pub mod install;
pub mod registry;

pub use download::*;
pub use install::*;
pub use registry::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// Catalog refresh and installed-server bookkeeping
    Registry(RegistryEvent),

    /// Installation operation progress
    Install(InstallEvent),

    /// File transfers
    Download(DownloadEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::Registry(_) => EventSource::REGISTRY,
            Self::Install(_) => EventSource::INSTALL,
            Self::Download(_) => EventSource::DOWNLOAD,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::Registry(RegistryEvent::RefreshFailed { .. })
            | Self::Install(InstallEvent::OperationFailed { .. })
            | Self::Download(DownloadEvent::Failed { .. }) => Level::ERROR,

            Self::Registry(
                RegistryEvent::AttemptFailed { .. } | RegistryEvent::CacheSaveFailed { .. },
            )
            | Self::Install(InstallEvent::OperationCancelled { .. }) => Level::WARN,

            Self::Install(InstallEvent::OutputLine { .. } | InstallEvent::Progress { .. }) => {
                Level::DEBUG
            }

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::Registry(_) => "lspkg::events::registry",
            Self::Install(_) => "lspkg::events::install",
            Self::Download(_) => "lspkg::events::download",
        }
    }

    /// Metadata describing this event at the moment it is observed
    #[must_use]
    pub fn meta(&self) -> EventMeta {
        let meta = EventMeta::new(EventLevel::from(self.log_level()), self.event_source())
            .with_label("target", self.log_target());
        match self.package() {
            Some(package) => meta.with_correlation_id(package),
            None => meta,
        }
    }

    /// Package the event concerns, when it concerns one
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        match self {
            Self::Install(
                InstallEvent::OperationStarted { package, .. }
                | InstallEvent::StepStarted { package, .. }
                | InstallEvent::ConfirmationRequired { package, .. }
                | InstallEvent::ConfirmationReceived { package, .. }
                | InstallEvent::OutputLine { package, .. }
                | InstallEvent::Progress { package, .. }
                | InstallEvent::StepCompleted { package, .. }
                | InstallEvent::OperationCompleted { package, .. }
                | InstallEvent::OperationFailed { package, .. }
                | InstallEvent::OperationCancelled { package },
            )
            | Self::Registry(
                RegistryEvent::PackageRecorded { package, .. }
                | RegistryEvent::PackageRemoved { package }
                | RegistryEvent::PackageToggled { package, .. },
            ) => Some(package),
            Self::Download(
                DownloadEvent::Started { package, .. }
                | DownloadEvent::Completed { package, .. }
                | DownloadEvent::Failed { package, .. },
            ) => package.as_deref(),
            _ => None,
        }
    }
}
