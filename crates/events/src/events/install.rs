use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Step-by-step progress of a single installation operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    OperationStarted {
        package: String,
        steps: usize,
    },

    StepStarted {
        package: String,
        step: String,
        index: usize,
        total: usize,
    },

    /// The engine is suspended until the user confirms or cancels
    ConfirmationRequired {
        package: String,
        step: String,
        message: String,
    },

    ConfirmationReceived {
        package: String,
        step: String,
    },

    /// A line of tool output or a status message
    OutputLine {
        package: String,
        line: String,
        is_step_divider: bool,
    },

    Progress {
        package: String,
        fraction: f64,
    },

    StepCompleted {
        package: String,
        step: String,
        index: usize,
    },

    OperationCompleted {
        package: String,
        version: String,
    },

    /// `details` carries diagnostics the user-facing message hides
    OperationFailed {
        package: String,
        step: String,
        failure: FailureContext,
        details: Option<String>,
    },

    OperationCancelled {
        package: String,
    },
}
