#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for lspkg
//!
//! Fetching the registry catalog, streaming release assets to disk with a
//! per-attempt timeout, and exponential backoff for callers that retry.

mod client;
mod download;
mod retry;
mod validation;

pub use client::{NetClient, NetConfig};
pub use download::{fetch_bytes, Download, DownloadResult};
pub use retry::{calculate_backoff_delay, with_retry, RetryConfig};
pub use validation::validate_url;
