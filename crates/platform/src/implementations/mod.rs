//! Concrete `ProcessOperations` backends

mod process;

pub use process::TokioProcessOperations;
