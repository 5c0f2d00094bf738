use serde::{Deserialize, Serialize};

use super::FailureContext;

/// File transfer events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    Started {
        url: String,
        package: Option<String>,
        total_size: Option<u64>,
    },

    Completed {
        url: String,
        package: Option<String>,
        final_size: u64,
    },

    Failed {
        url: String,
        package: Option<String>,
        failure: FailureContext,
    },
}
