//! lspkg - Installer for language servers and developer tooling
//!
//! This is the CLI application that drives the registry manager in the ops
//! crate and renders its events on the terminal.

mod cli;
mod display;
mod error;
mod events;
mod logging;
mod setup;

use crate::cli::{Cli, Commands};
use crate::display::{CommandResult, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use crate::setup::{ensure_catalog, SystemSetup};
use clap::Parser;
use lspkg_config::Config;
use lspkg_errors::{Error, RegistryError};
use lspkg_events::EventReceiver;
use lspkg_install::InstallOperation;
use lspkg_ops::RegistryManager;
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    // Defaults, then the config file, then the environment, then flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global);

    if let Some(log_file) = logging::init_tracing(&config, cli.global.debug) {
        eprintln!("Debug logging enabled: {}", log_file.display());
    }
    info!("Starting lspkg v{}", env!("CARGO_PKG_VERSION"));

    let (event_sender, event_receiver) = lspkg_events::channel();
    let manager = SystemSetup::new(config.clone())
        .initialize(event_sender)
        .await?;

    let colors_enabled = console::Term::stdout().features().colors_supported();
    let renderer = OutputRenderer::new(colors_enabled);
    let mut event_handler = EventHandler::new(colors_enabled, cli.global.debug);

    let result = execute_command_with_events(
        cli.command,
        &manager,
        config.general.assume_yes,
        event_receiver,
        &mut event_handler,
    )
    .await?;

    renderer.render_result(&result);
    info!("Command completed successfully");
    Ok(())
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    manager: &RegistryManager,
    assume_yes: bool,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<CommandResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, manager, assume_yes));

    loop {
        select! {
            result = &mut command_future => {
                // Drain any remaining events
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                if let Some(event) = event {
                    event_handler.handle_event(event);
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    manager: &RegistryManager,
    assume_yes: bool,
) -> Result<CommandResult, CliError> {
    if command.needs_catalog() {
        ensure_catalog(manager).await?;
    }

    match command {
        Commands::Sync => {
            let packages = manager.refresh_registry_catalog().await?;
            Ok(CommandResult::Success(format!(
                "Registry synchronized: {packages} packages"
            )))
        }

        Commands::Search { query } => Ok(CommandResult::SearchResults(manager.search(&query))),

        Commands::List => Ok(CommandResult::InstalledList(
            manager.installed_language_servers().await?,
        )),

        Commands::Info { package } => {
            let item = find_item(manager, &package)?;
            let installed = manager
                .installed_language_servers()
                .await?
                .into_iter()
                .find(|server| server.package_name == item.name);
            Ok(CommandResult::PackageInfo {
                item: Box::new(item),
                installed,
            })
        }

        Commands::Install { package } => {
            let item = find_item(manager, &package)?;
            let operation = manager.install_operation(&item)?;
            run_installation(manager, operation, assume_yes).await?;
            Ok(CommandResult::Success(format!(
                "{} is ready to use",
                item.sanitized_name()
            )))
        }

        Commands::Remove { package } => {
            manager.remove_language_server(&package).await?;
            Ok(CommandResult::Success(format!("Removed {package}")))
        }

        Commands::Enable { package } => {
            manager.set_package_enabled(&package, true).await?;
            Ok(CommandResult::Success(format!("Enabled {package}")))
        }

        Commands::Disable { package } => {
            manager.set_package_enabled(&package, false).await?;
            Ok(CommandResult::Success(format!("Disabled {package}")))
        }

        Commands::Override { language, path } => {
            if !path.is_file() {
                return Err(CliError::InvalidArguments(format!(
                    "{} is not a file",
                    path.display()
                )));
            }
            let message = format!("Using {} for {language}", path.display());
            manager.set_binary_override(&language, path).await?;
            Ok(CommandResult::Success(message))
        }
    }
}

fn find_item(
    manager: &RegistryManager,
    name: &str,
) -> Result<lspkg_index::RegistryItem, CliError> {
    manager.item(name).ok_or_else(|| {
        Error::from(RegistryError::PackageNotFound {
            name: name.to_string(),
        })
        .into()
    })
}

/// Start `operation` and drive it to the end, answering confirmation gates
/// and turning Ctrl-C into cancellation
async fn run_installation(
    manager: &RegistryManager,
    operation: InstallOperation,
    assume_yes: bool,
) -> Result<(), CliError> {
    let mut updates = operation.subscribe();
    let mut handle = manager.start_installation(operation.clone())?;
    let mut answered: Option<usize> = None;

    loop {
        select! {
            joined = &mut handle => {
                let outcome = joined
                    .map_err(|e| Error::internal(format!("installation task failed: {e}")))?;
                return outcome.map_err(CliError::from);
            }

            changed = updates.changed() => {
                if changed.is_err() {
                    continue;
                }
                let (waiting, step) = {
                    let snapshot = updates.borrow_and_update();
                    (snapshot.waiting_for_confirmation.clone(), snapshot.current_step)
                };
                let Some(message) = waiting else { continue };
                if answered == Some(step) {
                    continue;
                }
                answered = Some(step);

                if assume_yes || confirm(message).await? {
                    operation.confirm()?;
                } else {
                    manager.cancel_installation();
                }
            }

            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                manager.cancel_installation();
            }
        }
    }
}

/// Ask the user on the terminal; an interrupted prompt counts as "no"
async fn confirm(message: String) -> Result<bool, CliError> {
    let answer = tokio::task::spawn_blocking(move || {
        dialoguer::Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact_opt()
    })
    .await
    .map_err(|e| Error::internal(format!("prompt task failed: {e}")))?;

    Ok(answer?.unwrap_or(false))
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs) {
    if global.yes {
        config.general.assume_yes = true;
    }
}
