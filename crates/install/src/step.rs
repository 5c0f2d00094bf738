//! Install steps: named, optionally confirmed async actions

use crate::InstallContext;
use futures::future::BoxFuture;
use lspkg_errors::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a step handler
pub type StepFuture = BoxFuture<'static, Result<(), Error>>;

/// Shared, re-invocable step action
pub type StepHandler = Arc<dyn Fn(InstallContext) -> StepFuture + Send + Sync>;

/// Whether the user must approve a step before it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepConfirmation {
    None,
    /// Suspend with this message until confirmed or cancelled
    Required(String),
}

/// One unit of an installation plan
#[derive(Clone)]
pub struct InstallStep {
    pub name: String,
    pub confirmation: StepConfirmation,
    handler: StepHandler,
    noop: bool,
}

impl InstallStep {
    pub fn new<F, Fut>(name: impl Into<String>, confirmation: StepConfirmation, handler: F) -> Self
    where
        F: Fn(InstallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Self {
            name: name.into(),
            confirmation,
            handler: Arc::new(move |ctx| Box::pin(handler(ctx))),
            noop: false,
        }
    }

    /// A step that does nothing; used where no prerequisite exists
    #[must_use]
    pub fn noop() -> Self {
        let mut step = Self::new(String::new(), StepConfirmation::None, |_ctx| async { Ok(()) });
        step.noop = true;
        step
    }

    /// A step whose handler fails with `error`
    #[must_use]
    pub fn failing(name: impl Into<String>, error: Error) -> Self {
        Self::new(name, StepConfirmation::None, move |_ctx| {
            let error = error.clone();
            async move { Err(error) }
        })
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.noop
    }

    /// Confirmation message, if the step needs one
    #[must_use]
    pub fn confirmation_message(&self) -> Option<&str> {
        match &self.confirmation {
            StepConfirmation::Required(message) => Some(message),
            StepConfirmation::None => None,
        }
    }

    pub(crate) fn invoke(&self, ctx: InstallContext) -> StepFuture {
        (self.handler)(ctx)
    }
}

impl fmt::Debug for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallStep")
            .field("name", &self.name)
            .field("confirmation", &self.confirmation)
            .finish_non_exhaustive()
    }
}
