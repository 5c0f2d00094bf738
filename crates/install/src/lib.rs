#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package installation for lspkg
//!
//! A backend ([`PackageManager`]) turns an `InstallationMethod` into an
//! ordered list of [`InstallStep`]s; an [`InstallOperation`] runs them one
//! at a time, pausing at confirmation gates, streaming output and
//! supporting cancellation at any point.

mod context;
pub mod managers;
mod operation;
mod step;

pub use context::InstallContext;
pub use managers::{is_valid_entry_name, manager_for, ManagerConfig, PackageManager};
pub use operation::{InstallOperation, OperationSnapshot, OutputLine, RunningState};
pub use step::{InstallStep, StepConfirmation, StepFuture, StepHandler};

use lspkg_errors::{Error, PackageManagerError};
use lspkg_types::InstallationMethod;

/// Prerequisite probe (when it does anything) followed by the backend's steps
///
/// # Errors
///
/// Returns the backend's configuration error for unsupported methods, and
/// `InvalidConfiguration` when the package's directory name would not stay
/// inside the install root.
pub fn installation_steps(
    manager: &dyn PackageManager,
    method: &InstallationMethod,
) -> Result<Vec<InstallStep>, Error> {
    if let Some(source) = method.source() {
        if !is_valid_entry_name(&source.entry_name) {
            return Err(PackageManagerError::invalid_configuration(format!(
                "invalid install directory name: {:?}",
                source.entry_name
            ))
            .into());
        }
    }

    let mut steps = Vec::new();
    let probe = manager.is_installed(method);
    if !probe.is_noop() {
        steps.push(probe);
    }
    steps.extend(manager.install(method)?);
    Ok(steps)
}
