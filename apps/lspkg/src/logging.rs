//! Structured logging integration for events
//!
//! Every event the CLI renders is also written to the tracing subscriber with
//! its metadata, so a `--debug` log file holds the full install transcript.

use lspkg_config::Config;
use lspkg_events::{AppEvent, DownloadEvent, InstallEvent, RegistryEvent};
use std::path::PathBuf;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Default filter for the debug log file
const DEBUG_FILTER: &str = "info,lspkg=debug,lspkg_ops=debug,lspkg_install=debug";

/// Default filter for stderr
const QUIET_FILTER: &str = "warn";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber.
///
/// With `--debug` (or `RUST_LOG` set) logs go as JSON to a timestamped file
/// under the data directory; otherwise only warnings reach stderr. Returns
/// the log file when one was opened.
pub fn init_tracing(config: &Config, debug_flag: bool) -> Option<PathBuf> {
    let debug_enabled = debug_flag || std::env::var("RUST_LOG").is_ok();
    if !debug_enabled {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter(QUIET_FILTER))
            .init();
        return None;
    }

    let log_dir = config.log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {e}");
    }
    let log_file = log_dir.join(format!(
        "lspkg-{}.log",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));

    match std::fs::File::create(&log_file) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .json()
                .with_writer(file)
                .with_env_filter(env_filter(DEBUG_FILTER))
                .init();
            Some(log_file)
        }
        Err(e) => {
            eprintln!("Warning: Failed to create log file: {e}");
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter(DEBUG_FILTER))
                .init();
            None
        }
    }
}

/// Log an event with structured fields at the level it maps to
pub fn log_event_with_tracing(event: &AppEvent) {
    let meta = event.meta();
    let source = meta.source.as_str();
    let correlation = meta.correlation_id.as_deref().unwrap_or("-");

    match event {
        AppEvent::Install(InstallEvent::OperationFailed {
            package,
            step,
            failure,
            details,
        }) => {
            error!(
                source,
                event_id = %meta.event_id,
                package = %package,
                step = %step,
                code = ?failure.code,
                reason = ?failure.reason,
                details = ?details,
                "{}",
                failure.message
            );
        }
        AppEvent::Install(InstallEvent::OutputLine { package, line, .. }) => {
            debug!(source, package = %package, "{line}");
        }
        AppEvent::Registry(RegistryEvent::RefreshFailed { url, failure }) => {
            error!(
                source,
                event_id = %meta.event_id,
                url = %url,
                code = ?failure.code,
                reason = ?failure.reason,
                retryable = failure.retryable,
                "{}",
                failure.message
            );
        }
        AppEvent::Download(DownloadEvent::Failed {
            url,
            package,
            failure,
        }) => {
            error!(
                source,
                event_id = %meta.event_id,
                url = %url,
                package = ?package,
                reason = ?failure.reason,
                "{}",
                failure.message
            );
        }
        other => {
            let level = meta.tracing_level();
            if level == Level::ERROR {
                error!(source, correlation, event = ?other, "event");
            } else if level == Level::WARN {
                warn!(source, correlation, event = ?other, "event");
            } else if level == Level::INFO {
                info!(source, correlation, event = ?other, "event");
            } else {
                debug!(source, correlation, event = ?other, "event");
            }
        }
    }
}
