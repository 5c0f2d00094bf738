//! Handle given to step handlers

use crate::operation::Shared;
use lspkg_errors::Error;
use lspkg_events::EventSender;
use lspkg_platform::{CommandOutput, PlatformCommand, ProcessOperations};
use std::path::Path;
use std::sync::Arc;

/// What a step handler may do to its operation: append output, run
/// commands whose output is streamed into the operation, report progress
/// and create directories.
#[derive(Clone)]
pub struct InstallContext {
    shared: Arc<Shared>,
}

impl InstallContext {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Registry name of the package being installed
    #[must_use]
    pub fn package(&self) -> &str {
        &self.shared.package.name
    }

    /// Append a human readable status line
    pub fn status(&self, line: impl Into<String>) {
        self.shared.push_output(line.into(), false);
    }

    /// Set the progress fraction, clamped to `0.0..=1.0`
    pub fn set_progress(&self, fraction: f64) {
        self.shared.set_progress(fraction);
    }

    #[must_use]
    pub fn events(&self) -> Option<&EventSender> {
        self.shared.events.as_ref()
    }

    #[must_use]
    pub fn shell(&self) -> &Arc<dyn ProcessOperations> {
        &self.shared.shell
    }

    /// Run a command, streaming every output line into the operation
    ///
    /// # Errors
    ///
    /// Returns the shell's error when the command cannot be spawned or exits
    /// non-zero.
    pub async fn execute(&self, cmd: PlatformCommand) -> Result<CommandOutput, Error> {
        tracing::debug!(package = %self.package(), command = %cmd, "running command");
        let shared = Arc::clone(&self.shared);
        let on_line = move |line: &str| shared.push_output(line.to_string(), false);
        self.shared.shell.execute(cmd, &on_line).await
    }

    /// Run a shell command line and return its output lines
    ///
    /// # Errors
    ///
    /// See [`Self::execute`].
    pub async fn run_command(&self, line: &str) -> Result<Vec<String>, Error> {
        Ok(self.execute(PlatformCommand::shell(line)).await?.lines)
    }

    /// Run `args` (program first) inside `dir` and return its output lines
    ///
    /// # Errors
    ///
    /// Returns `Internal` for an empty argument list, otherwise see
    /// [`Self::execute`].
    pub async fn execute_in_directory<S: AsRef<str>>(
        &self,
        dir: &Path,
        args: &[S],
    ) -> Result<Vec<String>, Error> {
        let mut cmd = PlatformCommand::from_argv(args)
            .ok_or_else(|| Error::internal("cannot execute an empty command"))?;
        cmd.current_dir(dir);
        Ok(self.execute(cmd).await?.lines)
    }

    /// Create `path` and all missing parents
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directories cannot be created.
    pub async fn create_directory_structure(&self, path: &Path) -> Result<(), Error> {
        lspkg_platform::fs::create_dir_all(path).await
    }
}
