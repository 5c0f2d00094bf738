//! The install operation: runs a step list to completion
//!
//! State machine: `NotStarted -> Running -> Complete`. A failing step stores
//! its error and leaves the operation `Running`; cancellation aborts from any
//! point and is reported to the caller without being stored.

use crate::{InstallContext, InstallStep, StepConfirmation};
use lspkg_errors::Error;
use lspkg_events::{AppEvent, EventEmitter, EventSender, FailureContext, InstallEvent};
use lspkg_index::RegistryItem;
use lspkg_platform::ProcessOperations;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Lifecycle of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunningState {
    #[default]
    NotStarted,
    Running,
    Complete,
}

/// One line of accumulated output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub content: String,
    /// First line of a step, shown as a separator
    pub is_step_divider: bool,
}

/// Observable state of an operation
#[derive(Debug, Clone, Default)]
pub struct OperationSnapshot {
    pub running_state: RunningState,
    /// Index of the step being executed; equals the step count once complete
    pub current_step: usize,
    pub output: Vec<OutputLine>,
    pub error: Option<Error>,
    /// Pending confirmation message; set exactly while suspended at the gate
    pub waiting_for_confirmation: Option<String>,
    pub progress: f64,
}

pub(crate) struct Shared {
    pub(crate) package: RegistryItem,
    pub(crate) steps: Vec<InstallStep>,
    pub(crate) state: watch::Sender<OperationSnapshot>,
    pub(crate) shell: Arc<dyn ProcessOperations>,
    pub(crate) events: Option<EventSender>,
    cancel: CancellationToken,
    pending_confirmation: Mutex<Option<oneshot::Sender<()>>>,
}

impl EventEmitter for Shared {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl Shared {
    pub(crate) fn push_output(&self, content: String, is_step_divider: bool) {
        self.emit(AppEvent::Install(InstallEvent::OutputLine {
            package: self.package.name.clone(),
            line: content.clone(),
            is_step_divider,
        }));
        self.state.send_modify(|s| {
            s.output.push(OutputLine {
                content,
                is_step_divider,
            });
        });
    }

    pub(crate) fn set_progress(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.state.send_modify(|s| s.progress = fraction);
        self.emit(AppEvent::Install(InstallEvent::Progress {
            package: self.package.name.clone(),
            fraction,
        }));
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<()>>> {
        self.pending_confirmation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A running instance of an installation plan
///
/// Cheap to clone; clones observe and control the same operation.
#[derive(Clone)]
pub struct InstallOperation {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for InstallOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallOperation")
            .field("package", &self.shared.package.name)
            .field("steps", &self.shared.steps)
            .field("running_state", &self.running_state())
            .finish_non_exhaustive()
    }
}

impl InstallOperation {
    #[must_use]
    pub fn new(
        package: RegistryItem,
        steps: Vec<InstallStep>,
        shell: Arc<dyn ProcessOperations>,
    ) -> Self {
        Self::with_event_sender(package, steps, shell, None)
    }

    #[must_use]
    pub fn with_event_sender(
        package: RegistryItem,
        steps: Vec<InstallStep>,
        shell: Arc<dyn ProcessOperations>,
        events: Option<EventSender>,
    ) -> Self {
        let (state, _) = watch::channel(OperationSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                package,
                steps,
                state,
                shell,
                events,
                cancel: CancellationToken::new(),
                pending_confirmation: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn package(&self) -> &RegistryItem {
        &self.shared.package
    }

    #[must_use]
    pub fn steps(&self) -> &[InstallStep] {
        &self.shared.steps
    }

    /// Version recorded when the operation completes
    #[must_use]
    pub fn version(&self) -> String {
        self.shared.package.version().unwrap_or_default()
    }

    /// Same operation, `ptr_eq` style
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    #[must_use]
    pub fn snapshot(&self) -> OperationSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Receive a fresh snapshot after every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OperationSnapshot> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn running_state(&self) -> RunningState {
        self.shared.state.borrow().running_state
    }

    #[must_use]
    pub fn error(&self) -> Option<Error> {
        self.shared.state.borrow().error.clone()
    }

    #[must_use]
    pub fn waiting_for_confirmation(&self) -> Option<String> {
        self.shared.state.borrow().waiting_for_confirmation.clone()
    }

    #[must_use]
    pub fn accumulated_output(&self) -> Vec<OutputLine> {
        self.shared.state.borrow().output.clone()
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        self.shared.state.borrow().progress
    }

    #[must_use]
    pub fn current_step_index(&self) -> usize {
        self.shared.state.borrow().current_step
    }

    /// The step being executed, `None` before start and after completion
    #[must_use]
    pub fn current_step(&self) -> Option<&InstallStep> {
        if self.running_state() == RunningState::NotStarted {
            return None;
        }
        self.shared.steps.get(self.current_step_index())
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Resume a step suspended at its confirmation gate
    ///
    /// # Errors
    ///
    /// Returns `Internal` when no confirmation is pending.
    pub fn confirm(&self) -> Result<(), Error> {
        let sender = self
            .shared
            .pending()
            .take()
            .ok_or_else(|| Error::internal("no confirmation is pending"))?;
        sender
            .send(())
            .map_err(|()| Error::internal("operation is no longer waiting for confirmation"))
    }

    /// Abort the operation from any point; the running step is dropped
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
        self.shared.pending().take();
    }

    /// Drive every step in order.
    ///
    /// # Errors
    ///
    /// Returns the first step error (also stored in [`Self::error`]),
    /// `Error::Cancelled` after [`Self::cancel`], or `Internal` when the
    /// operation was already started.
    pub async fn run(&self) -> Result<(), Error> {
        let shared = &self.shared;
        let started = shared.state.send_if_modified(|s| {
            if s.running_state == RunningState::NotStarted {
                s.running_state = RunningState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(Error::internal("installation operation was already started"));
        }

        let package = shared.package.name.clone();
        let total = shared.steps.len();
        tracing::info!(package = %package, steps = total, "starting installation");
        shared.emit(AppEvent::Install(InstallEvent::OperationStarted {
            package: package.clone(),
            steps: total,
        }));

        for (index, step) in shared.steps.iter().enumerate() {
            if shared.cancel.is_cancelled() {
                return Err(self.cancelled());
            }

            shared.state.send_modify(|s| s.current_step = index);
            shared.emit(AppEvent::Install(InstallEvent::StepStarted {
                package: package.clone(),
                step: step.name.clone(),
                index,
                total,
            }));
            shared.push_output(step.name.clone(), true);

            if let StepConfirmation::Required(message) = &step.confirmation {
                self.wait_for_confirmation(step, message).await?;
            }

            let ctx = InstallContext::new(Arc::clone(shared));
            let result = tokio::select! {
                biased;
                () = shared.cancel.cancelled() => return Err(self.cancelled()),
                result = step.invoke(ctx) => result,
            };

            match result {
                Ok(()) => {
                    #[allow(clippy::cast_precision_loss)]
                    let fraction = (index + 1) as f64 / total as f64;
                    shared.set_progress(fraction);
                    shared.emit(AppEvent::Install(InstallEvent::StepCompleted {
                        package: package.clone(),
                        step: step.name.clone(),
                        index,
                    }));
                }
                Err(Error::Cancelled) => return Err(self.cancelled()),
                Err(error) => {
                    self.fail(step, &error);
                    return Err(error);
                }
            }
        }

        shared.state.send_modify(|s| {
            s.current_step = total;
            s.running_state = RunningState::Complete;
        });
        let version = self.version();
        tracing::info!(package = %package, version = %version, "installation complete");
        shared.emit(AppEvent::Install(InstallEvent::OperationCompleted { package, version }));
        Ok(())
    }

    async fn wait_for_confirmation(&self, step: &InstallStep, message: &str) -> Result<(), Error> {
        let shared = &self.shared;
        let (tx, rx) = oneshot::channel();
        *shared.pending() = Some(tx);
        shared
            .state
            .send_modify(|s| s.waiting_for_confirmation = Some(message.to_string()));
        shared.emit(AppEvent::Install(InstallEvent::ConfirmationRequired {
            package: shared.package.name.clone(),
            step: step.name.clone(),
            message: message.to_string(),
        }));

        let confirmed = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => false,
            received = rx => received.is_ok(),
        };
        if !confirmed {
            return Err(self.cancelled());
        }

        shared.state.send_modify(|s| s.waiting_for_confirmation = None);
        shared.emit(AppEvent::Install(InstallEvent::ConfirmationReceived {
            package: shared.package.name.clone(),
            step: step.name.clone(),
        }));
        Ok(())
    }

    fn fail(&self, step: &InstallStep, error: &Error) {
        let shared = &self.shared;
        let details = match error {
            Error::PackageManager(pm) => pm.detail().map(str::to_string),
            _ => None,
        };
        tracing::warn!(
            package = %shared.package.name,
            step = %step.name,
            error = %error,
            details = details.as_deref().unwrap_or_default(),
            "installation step failed"
        );
        shared.state.send_modify(|s| s.error = Some(error.clone()));
        shared.emit(AppEvent::Install(InstallEvent::OperationFailed {
            package: shared.package.name.clone(),
            step: step.name.clone(),
            failure: FailureContext::from_error(error),
            details,
        }));
    }

    fn cancelled(&self) -> Error {
        let shared = &self.shared;
        shared.pending().take();
        shared.state.send_modify(|s| s.waiting_for_confirmation = None);
        tracing::info!(package = %shared.package.name, "installation cancelled");
        shared.emit(AppEvent::Install(InstallEvent::OperationCancelled {
            package: shared.package.name.clone(),
        }));
        Error::Cancelled
    }
}
