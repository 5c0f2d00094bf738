#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Platform abstraction for running external tools and touching the filesystem.
//!
//! - Process execution with line-by-line output streaming and cooperative
//!   cancellation (children die when their future is dropped)
//! - Filesystem helpers returning `lspkg_errors::Error`
//!
//! Install steps depend on [`ProcessOperations`] as a trait object so tests
//! can script tool behaviour without npm or git being present.

pub mod fs;
pub mod implementations;
pub mod process;

pub use implementations::TokioProcessOperations;
pub use process::{CommandOutput, LineSink, PlatformCommand, ProcessOperations};
