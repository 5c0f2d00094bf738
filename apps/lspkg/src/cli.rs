//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lspkg - Installer for language servers and developer tooling
#[derive(Parser)]
#[command(name = "lspkg")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Installer for language servers and developer tooling")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Enable debug logging to the lspkg data directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Accept every confirmation without prompting
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Download the registry catalog
    Sync,

    /// Search the registry catalog by name, description or language
    #[command(alias = "find")]
    Search {
        /// Search query
        query: String,
    },

    /// List installed language servers
    #[command(alias = "ls")]
    List,

    /// Show information about a registry package
    Info {
        /// Package name
        package: String,
    },

    /// Install a package from the registry
    #[command(alias = "i")]
    Install {
        /// Package name
        package: String,
    },

    /// Remove an installed package
    #[command(alias = "rm")]
    Remove {
        /// Package name
        package: String,
    },

    /// Enable an installed package
    Enable {
        /// Package name
        package: String,
    },

    /// Disable an installed package without removing it
    Disable {
        /// Package name
        package: String,
    },

    /// Use a specific language server binary for a language
    Override {
        /// Language identifier, e.g. `python`
        language: String,

        /// Path to the server executable
        path: PathBuf,
    },
}

impl Commands {
    /// Commands that need the registry catalog in memory
    #[must_use]
    pub fn needs_catalog(&self) -> bool {
        matches!(
            self,
            Self::Search { .. } | Self::Info { .. } | Self::Install { .. }
        )
    }
}
